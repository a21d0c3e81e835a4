//! Join of two independent completions gating one action
//!
//! Each side reports once. The continuation fires when the second side
//! arrives, whichever that is, and never more than once. A failure on either
//! side short-circuits the join: nothing fires afterwards.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    Waiting,
    Fired,
    Failed,
}

#[derive(Debug)]
pub struct Join<A, B> {
    left: Option<A>,
    right: Option<B>,
    state: JoinState,
}

impl<A, B> Default for Join<A, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, B> Join<A, B> {
    pub fn new() -> Self {
        Self {
            left: None,
            right: None,
            state: JoinState::Waiting,
        }
    }

    pub fn state(&self) -> JoinState {
        self.state
    }

    pub fn left_done(&self) -> bool {
        self.left.is_some()
    }

    pub fn right_done(&self) -> bool {
        self.right.is_some()
    }

    /// Record the left completion. Returns both values if this completes the join.
    pub fn complete_left(&mut self, value: A) -> Option<(A, B)> {
        if self.state != JoinState::Waiting || self.left.is_some() {
            return None;
        }
        self.left = Some(value);
        self.try_fire()
    }

    /// Record the right completion. Returns both values if this completes the join.
    pub fn complete_right(&mut self, value: B) -> Option<(A, B)> {
        if self.state != JoinState::Waiting || self.right.is_some() {
            return None;
        }
        self.right = Some(value);
        self.try_fire()
    }

    /// Abort the join. Returns false if it had already fired or failed.
    pub fn fail(&mut self) -> bool {
        if self.state != JoinState::Waiting {
            return false;
        }
        self.state = JoinState::Failed;
        self.left = None;
        self.right = None;
        true
    }

    fn try_fire(&mut self) -> Option<(A, B)> {
        if self.left.is_none() || self.right.is_none() {
            return None;
        }
        self.state = JoinState::Fired;
        self.left.take().zip(self.right.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_then_right_fires_on_right() {
        let mut join: Join<(), &str> = Join::new();
        assert_eq!(join.complete_left(()), None);
        assert!(join.left_done());
        assert_eq!(join.complete_right("plan"), Some(((), "plan")));
        assert_eq!(join.state(), JoinState::Fired);
    }

    #[test]
    fn test_right_then_left_fires_on_left() {
        let mut join: Join<(), &str> = Join::new();
        assert_eq!(join.complete_right("plan"), None);
        assert_eq!(join.complete_left(()), Some(((), "plan")));
    }

    #[test]
    fn test_fires_exactly_once() {
        let mut join: Join<u8, u8> = Join::new();
        join.complete_left(1);
        assert!(join.complete_right(2).is_some());
        assert!(join.complete_right(3).is_none());
        assert!(join.complete_left(4).is_none());
        assert!(!join.fail());
        assert_eq!(join.state(), JoinState::Fired);
    }

    #[test]
    fn test_duplicate_side_is_ignored() {
        let mut join: Join<u8, u8> = Join::new();
        join.complete_left(1);
        assert!(join.complete_left(9).is_none());
        assert_eq!(join.complete_right(2), Some((1, 2)));
    }

    #[test]
    fn test_failure_short_circuits() {
        let mut join: Join<(), &str> = Join::new();
        assert!(join.fail());
        assert_eq!(join.complete_left(()), None);
        assert_eq!(join.complete_right("late"), None);
        assert_eq!(join.state(), JoinState::Failed);
        assert!(!join.fail());
    }

    #[test]
    fn test_failure_after_one_side() {
        let mut join: Join<(), &str> = Join::new();
        join.complete_left(());
        assert!(join.fail());
        assert!(!join.left_done());
        assert_eq!(join.complete_right("late"), None);
    }
}
