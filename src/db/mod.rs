//! Database module - SQLite storage for gym machines

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

/// Gym machine record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: i64,
    pub name: String,
    pub muscles: Vec<String>,
    pub notes: Option<String>,
    pub image_url: Option<String>, // data URL of the uploaded photo
    pub created_at: DateTime<Utc>,
}

/// Insert payload produced by the analyze flow
#[derive(Debug, Clone)]
pub struct NewMachine {
    pub name: String,
    pub muscles: Vec<String>,
    pub image_url: Option<String>,
}

/// The fields the inline edit form is allowed to change
#[derive(Debug, Clone, PartialEq)]
pub struct MachineUpdate {
    pub name: String,
    pub muscles: Vec<String>,
    pub notes: Option<String>,
}

/// Row store for machines
pub trait MachineStore {
    /// All machines, newest first
    fn list_machines(&self) -> Result<Vec<Machine>>;
    fn insert_machine(&self, machine: &NewMachine) -> Result<Machine>;
    /// Fails if no row has this id
    fn update_machine(&self, id: i64, update: &MachineUpdate) -> Result<()>;
    /// Fails if no row has this id
    fn delete_machine(&self, id: i64) -> Result<()>;
}

/// Database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Throwaway database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS machines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                muscles TEXT NOT NULL DEFAULT '[]',
                notes TEXT,
                image_url TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn machine_from_row(row: &Row<'_>) -> rusqlite::Result<Machine> {
        let muscles_json: String = row.get(2)?;
        let created_str: String = row.get(5)?;
        Ok(Machine {
            id: row.get(0)?,
            name: row.get(1)?,
            muscles: serde_json::from_str(&muscles_json).unwrap_or_default(),
            notes: row.get(3)?,
            image_url: row.get(4)?,
            created_at: DateTime::parse_from_rfc3339(&created_str)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    /// Get a single machine
    pub fn get_machine(&self, id: i64) -> Result<Option<Machine>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, muscles, notes, image_url, created_at FROM machines WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::machine_from_row)?;
        let machine = rows.next().transpose()?;
        Ok(machine)
    }
}

impl MachineStore for Database {
    fn list_machines(&self) -> Result<Vec<Machine>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, muscles, notes, image_url, created_at FROM machines ORDER BY created_at DESC, id DESC",
        )?;

        let machines = stmt
            .query_map([], Self::machine_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(machines)
    }

    fn insert_machine(&self, machine: &NewMachine) -> Result<Machine> {
        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO machines (name, muscles, image_url, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                machine.name,
                serde_json::to_string(&machine.muscles)?,
                machine.image_url,
                created_at.to_rfc3339(),
            ],
        )?;

        Ok(Machine {
            id: self.conn.last_insert_rowid(),
            name: machine.name.clone(),
            muscles: machine.muscles.clone(),
            notes: None,
            image_url: machine.image_url.clone(),
            created_at,
        })
    }

    fn update_machine(&self, id: i64, update: &MachineUpdate) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE machines SET name = ?1, muscles = ?2, notes = ?3 WHERE id = ?4",
            params![
                update.name,
                serde_json::to_string(&update.muscles)?,
                update.notes,
                id,
            ],
        )?;
        if changed == 0 {
            bail!("machine {} not found", id);
        }
        Ok(())
    }

    fn delete_machine(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM machines WHERE id = ?1", params![id])?;
        if changed == 0 {
            bail!("machine {} not found", id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_machine(name: &str) -> NewMachine {
        NewMachine {
            name: name.to_string(),
            muscles: vec!["chest".into(), "triceps".into()],
            image_url: Some("data:image/png;base64,AAAA".into()),
        }
    }

    #[test]
    fn test_insert_and_list_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let first = db.insert_machine(&new_machine("Chest Press")).unwrap();
        let second = db.insert_machine(&new_machine("Pec Deck")).unwrap();

        let machines = db.list_machines().unwrap();
        assert_eq!(machines.len(), 2);
        assert_eq!(machines[0].id, second.id);
        assert_eq!(machines[1].id, first.id);
        assert_eq!(machines[1].muscles, vec!["chest", "triceps"]);
        assert_eq!(machines[1].notes, None);
    }

    #[test]
    fn test_update_touches_only_editable_fields() {
        let db = Database::open_in_memory().unwrap();
        let machine = db.insert_machine(&new_machine("Chest Press")).unwrap();

        let update = MachineUpdate {
            name: "Incline Press".into(),
            muscles: vec!["upper chest".into()],
            notes: Some("seat at 4".into()),
        };
        db.update_machine(machine.id, &update).unwrap();

        let stored = db.get_machine(machine.id).unwrap().unwrap();
        assert_eq!(stored.name, "Incline Press");
        assert_eq!(stored.muscles, vec!["upper chest"]);
        assert_eq!(stored.notes.as_deref(), Some("seat at 4"));
        assert_eq!(stored.image_url, machine.image_url);
        assert_eq!(stored.id, machine.id);
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gymlens.db");
        let path = path.to_str().unwrap();

        let id = {
            let db = Database::open(path).unwrap();
            db.insert_machine(&new_machine("Hack Squat")).unwrap().id
        };

        let db = Database::open(path).unwrap();
        let machines = db.list_machines().unwrap();
        assert_eq!(machines.len(), 1);
        assert_eq!(machines[0].id, id);
        assert_eq!(machines[0].notes, None);
    }

    #[test]
    fn test_update_unknown_id_fails() {
        let db = Database::open_in_memory().unwrap();
        let update = MachineUpdate {
            name: "Ghost".into(),
            muscles: vec![],
            notes: None,
        };
        assert!(db.update_machine(42, &update).is_err());
    }

    #[test]
    fn test_delete_twice_fails_second_time() {
        let db = Database::open_in_memory().unwrap();
        let machine = db.insert_machine(&new_machine("Leg Press")).unwrap();

        db.delete_machine(machine.id).unwrap();
        assert!(db.list_machines().unwrap().is_empty());
        assert!(db.delete_machine(machine.id).is_err());
    }
}
