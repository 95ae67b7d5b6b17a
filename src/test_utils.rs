/// # Test Utilities Module
///
/// Fixtures shared by the unit tests: a sample-data session, temporary
/// clusters, scripted cursors and controllable clocks.

use crate::core::db::{Cursor, DatabaseCluster, Session, Value};
use crate::core::Result;
use crate::tenant::Clock;
use chrono::{Duration, NaiveDateTime};
use std::cell::Cell;
use std::collections::VecDeque;
use tempfile::TempDir;

/// In-memory session with a `users` table holding three rows.
///
/// Usernames sort in id order, so index and table scans agree on row order.
pub fn sample_session() -> Session {
    let session = Session::open_in_memory().unwrap();
    session
        .connection()
        .execute_batch(
            "
            CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT,
                active BOOLEAN DEFAULT 0,
                score REAL
            );
            INSERT INTO users (username, email, active, score) VALUES ('alice', 'alice@example.com', 1, 12.5);
            INSERT INTO users (username, email, active, score) VALUES ('bob', 'bob@example.com', 0, 3.0);
            INSERT INTO users (username, email, active, score) VALUES ('carol', NULL, 1, NULL);
        ",
        )
        .unwrap();
    session
}

/// Cluster rooted in a fresh temporary directory. Keep the `TempDir` alive.
pub fn temp_cluster() -> (TempDir, DatabaseCluster) {
    let dir = TempDir::new().unwrap();
    let cluster = DatabaseCluster::open(dir.path()).unwrap();
    (dir, cluster)
}

/// Parses `YYYY-MM-DD HH:MM:SS`.
pub fn at(timestamp: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Clock that advances one second per reading.
pub struct StepClock {
    next: Cell<NaiveDateTime>,
}

impl StepClock {
    pub fn starting_at(timestamp: &str) -> Self {
        StepClock {
            next: Cell::new(at(timestamp)),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> NaiveDateTime {
        let now = self.next.get();
        self.next.set(now + Duration::seconds(1));
        now
    }
}

/// Cursor replaying a fixed sequence of rows and errors.
pub struct ScriptedCursor {
    columns: Vec<String>,
    steps: VecDeque<Result<Vec<Value>>>,
}

impl ScriptedCursor {
    pub fn new(columns: &[&str], steps: Vec<Result<Vec<Value>>>) -> Self {
        ScriptedCursor {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            steps: steps.into(),
        }
    }
}

impl Cursor for ScriptedCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn advance(&mut self) -> Result<Option<Vec<Value>>> {
        self.steps.pop_front().transpose()
    }
}
