//! Machine list: read, inline edit, delete, and the exercise generation trigger

use std::collections::HashMap;

use tracing::{error, info, warn};

use super::{ClipPlayer, Notices, PlanState, Route};
use crate::client::{ClientError, FunctionsApi};
use crate::config::Clip;
use crate::db::{Machine, MachineStore, MachineUpdate};
use crate::exercises::{ExercisePlan, GenerateRequest};
use crate::join::Join;
use crate::muscles::{join_muscles, parse_muscle_list};

/// Inline edit form, one row at a time
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditForm {
    pub name: String,
    /// Comma separated
    pub muscles: String,
    pub notes: String,
}

impl EditForm {
    pub fn from_machine(machine: &Machine) -> Self {
        Self {
            name: machine.name.clone(),
            muscles: join_muscles(&machine.muscles),
            notes: machine.notes.clone().unwrap_or_default(),
        }
    }

    /// Exactly the three editable fields
    pub fn to_update(&self) -> MachineUpdate {
        let notes = self.notes.trim();
        MachineUpdate {
            name: self.name.trim().to_string(),
            muscles: parse_muscle_list(&self.muscles),
            notes: (!notes.is_empty()).then(|| notes.to_string()),
        }
    }
}

/// An in-flight generation: transition clip and request joined
#[derive(Debug)]
struct Generation {
    request: GenerateRequest,
    join: Join<(), ExercisePlan>,
    overlay_visible: bool,
}

#[derive(Debug, Default)]
pub struct MachineList {
    pub machines: Vec<Machine>,
    editing: Option<(i64, EditForm)>,
    goals: HashMap<i64, String>,
    generation: Option<Generation>,
    pub notices: Notices,
}

impl MachineList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch all rows, newest first
    pub fn load<S: MachineStore>(&mut self, store: &S) {
        match store.list_machines() {
            Ok(machines) => self.machines = machines,
            Err(e) => {
                error!("cannot load machines: {:#}", e);
                self.machines.clear();
                self.notices.error("Failed to load machines");
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn machine(&self, id: i64) -> Option<&Machine> {
        self.machines.iter().find(|m| m.id == id)
    }

    // Editing

    /// Open the inline form seeded from the current row
    pub fn begin_edit(&mut self, id: i64) -> bool {
        let Some(machine) = self.machine(id) else {
            return false;
        };
        self.editing = Some((id, EditForm::from_machine(machine)));
        true
    }

    pub fn editing_id(&self) -> Option<i64> {
        self.editing.as_ref().map(|(id, _)| *id)
    }

    pub fn edit_form(&self) -> Option<&EditForm> {
        self.editing.as_ref().map(|(_, form)| form)
    }

    pub fn edit_form_mut(&mut self) -> Option<&mut EditForm> {
        self.editing.as_mut().map(|(_, form)| form)
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Write the form and re-fetch. The form stays open on failure.
    pub fn save<S: MachineStore>(&mut self, store: &S) -> bool {
        let Some((id, form)) = &self.editing else {
            return false;
        };
        match store.update_machine(*id, &form.to_update()) {
            Ok(()) => {
                info!("machine {} updated", id);
                self.notices.success("Machine updated!");
                self.editing = None;
                self.load(store);
                true
            }
            Err(e) => {
                error!("cannot update machine {}: {:#}", id, e);
                self.notices.error("Failed to update machine");
                false
            }
        }
    }

    pub fn delete<S: MachineStore>(&mut self, id: i64, store: &S) -> bool {
        match store.delete_machine(id) {
            Ok(()) => {
                info!("machine {} deleted", id);
                self.notices.success("Machine deleted");
                if self.editing_id() == Some(id) {
                    self.editing = None;
                }
                self.goals.remove(&id);
                self.load(store);
                true
            }
            Err(e) => {
                error!("cannot delete machine {}: {:#}", id, e);
                self.notices.error("Failed to delete machine");
                false
            }
        }
    }

    // Workout goals

    pub fn set_goal(&mut self, id: i64, goal: impl Into<String>) {
        self.goals.insert(id, goal.into());
    }

    pub fn goal(&self, id: i64) -> &str {
        self.goals.get(&id).map(String::as_str).unwrap_or_default()
    }

    // Generation

    pub fn is_loading(&self) -> bool {
        self.generation.is_some()
    }

    pub fn overlay_visible(&self) -> bool {
        self.generation.as_ref().is_some_and(|g| g.overlay_visible)
    }

    /// Validate the goal and open the join. Returns the request to send, or
    /// `None` if nothing should be sent.
    pub fn start_generation(&mut self, id: i64) -> Option<GenerateRequest> {
        if self.is_loading() {
            warn!("generation already running, ignoring trigger for {}", id);
            return None;
        }
        let goal = self.goal(id).trim().to_string();
        if goal.is_empty() {
            self.notices.error("Please enter a workout goal");
            return None;
        }
        let machine = self.machine(id)?;
        let request = GenerateRequest {
            machine_name: machine.name.clone(),
            muscles: machine.muscles.clone(),
            workout_goal: goal,
        };

        info!("generating exercises for {} ({})", request.machine_name, request.workout_goal);
        self.generation = Some(Generation {
            request: request.clone(),
            join: Join::new(),
            overlay_visible: true,
        });
        Some(request)
    }

    /// Transition clip finished
    pub fn on_video_ended(&mut self) -> Option<Route> {
        let generation = self.generation.as_mut()?;
        let (_, plan) = generation.join.complete_left(())?;
        self.finish(plan)
    }

    /// Generation call finished. A failure closes the overlay right away.
    pub fn on_plan(&mut self, result: Result<ExercisePlan, ClientError>) -> Option<Route> {
        let generation = self.generation.as_mut()?;
        match result {
            Ok(plan) => {
                let (_, plan) = generation.join.complete_right(plan)?;
                self.finish(plan)
            }
            Err(e) => {
                error!("exercise generation failed: {}", e);
                generation.join.fail();
                self.generation = None;
                let message = match e {
                    ClientError::Endpoint { message, .. } => message,
                    _ => "Failed to generate exercises".to_string(),
                };
                self.notices.error(message);
                None
            }
        }
    }

    fn finish(&mut self, plan: ExercisePlan) -> Option<Route> {
        let generation = self.generation.take()?;
        Some(Route::Exercises(PlanState {
            machine_name: generation.request.machine_name,
            workout_goal: generation.request.workout_goal,
            exercises: plan.exercises,
        }))
    }

    /// Play the transition clip and request the plan concurrently; the route
    /// comes back once both are done, or `None` on failure.
    pub async fn generate<F, P>(&mut self, id: i64, api: &F, player: &P, clip: &Clip) -> Option<Route>
    where
        F: FunctionsApi,
        P: ClipPlayer,
    {
        let request = self.start_generation(id)?;

        let video = player.play(clip);
        let plan = api.generate_exercises(&request);
        tokio::pin!(video);
        tokio::pin!(plan);

        let mut video_done = false;
        let mut plan_done = false;
        loop {
            tokio::select! {
                _ = &mut video, if !video_done => {
                    video_done = true;
                    if let Some(route) = self.on_video_ended() {
                        return Some(route);
                    }
                }
                result = &mut plan, if !plan_done => {
                    plan_done = true;
                    if let Some(route) = self.on_plan(result) {
                        return Some(route);
                    }
                    if !self.is_loading() {
                        return None;
                    }
                }
                else => return None,
            }
        }
    }
}
