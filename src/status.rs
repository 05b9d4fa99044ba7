use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::evaluator::ScheduleState;

/// Snapshot of the governor published after every evaluation and every
/// power transition. `running: false` marks the final snapshot before
/// the worker exits.
#[derive(Debug, Clone, Serialize)]
pub struct GovernorStatus {
    pub running: bool,
    pub schedule: ScheduleState,
    pub online_cpus: usize,
    pub last_load: u32,
    pub low_load_streak: u32,
    pub high_load_streak: u32,
}

impl GovernorStatus {
    pub fn idle(online_cpus: usize) -> Self {
        Self {
            running: false,
            schedule: ScheduleState::Idle,
            online_cpus,
            last_load: 0,
            low_load_streak: 0,
            high_load_streak: 0,
        }
    }
}

fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(content)?;
    file.flush()?;
    fs::rename(&temp_path, path)
}

pub fn write_status_file(path: &Path, status: &GovernorStatus) -> io::Result<()> {
    let mut json = serde_json::to_vec_pretty(status)?;
    json.push(b'\n');
    write_atomic(path, &json)
}

/// Plain-text companion to the JSON status, one integer percentage.
pub fn write_load_file(path: &Path, load: u32) -> io::Result<()> {
    write_atomic(path, format!("{load}\n").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_file_is_valid_json() {
        let path = std::env::temp_dir().join(format!("novathor-status-{}", std::process::id()));
        let status = GovernorStatus {
            running: true,
            schedule: ScheduleState::Scheduled,
            online_cpus: 2,
            last_load: 37,
            low_load_streak: 4,
            high_load_streak: 0,
        };
        write_status_file(&path, &status).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["running"], true);
        assert_eq!(parsed["schedule"], "scheduled");
        assert_eq!(parsed["online_cpus"], 2);
        assert_eq!(parsed["last_load"], 37);
    }

    #[test]
    fn load_file_holds_one_integer() {
        let path = std::env::temp_dir().join(format!("novathor-load-{}", std::process::id()));
        write_load_file(&path, 88).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "88\n");
    }
}
