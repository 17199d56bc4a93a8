use std::{
    fmt::Display,
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pass::PassCapture;
use crate::publish::FanoutReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Completed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    pub stage: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
}

/// What happened to one pass, written next to the other run logs as YAML.
#[derive(Debug, Clone, Serialize)]
pub struct RunLog {
    pub filename_base: String,
    pub satellite: String,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageResult>,
    pub note: Option<String>,
    pub publish: Option<FanoutReport>,
}

impl RunLog {
    pub fn new(pass: &PassCapture) -> Self {
        Self {
            filename_base: pass.filename_base.clone(),
            satellite: pass.satellite.clone(),
            state: RunState::Running,
            started_at: Utc::now(),
            completed_at: None,
            stages: Vec::new(),
            note: None,
            publish: None,
        }
    }

    /// Runs `f` as the named stage and records its timing and result.
    pub fn stage<T, E: Display>(
        &mut self,
        stage: &str,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let started_at = Utc::now();
        let result = f();
        self.stages.push(StageResult {
            stage: stage.to_string(),
            started_at,
            completed_at: Utc::now(),
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
        });
        result
    }

    pub fn finish(&mut self, state: RunState, note: Option<String>) {
        self.state = state;
        self.note = note;
        self.completed_at = Some(Utc::now());
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.yaml", self.filename_base))
    }

    pub fn save(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = self.path_in(dir);
        fs::write(
            &path,
            serde_yaml::to_string(self)
                .map_err(|e| io::Error::other(format!("Failed to serialize run log: {}", e)))?,
        )?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::sample_pass;

    #[test]
    fn test_stage_records_success_and_error() {
        let mut log = RunLog::new(&sample_pass("base"));

        let ok: Result<u32, String> = log.stage("capture", || Ok(3));
        assert_eq!(ok, Ok(3));
        let err: Result<(), String> = log.stage("record", || Err("disk full".to_string()));
        assert!(err.is_err());

        assert_eq!(log.stages.len(), 2);
        assert!(log.stages[0].success);
        assert_eq!(log.stages[1].error.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_save_writes_yaml_named_after_base() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::new(&sample_pass("20210205-192623"));
        log.finish(RunState::Skipped, Some("no images".into()));

        let path = log.save(&dir.path().join("runs")).unwrap();
        assert!(path.ends_with("runs/20210205-192623.yaml"));

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("state: skipped"));
        assert!(content.contains("note: no images"));
        assert!(content.contains("satellite: METEOR-M2 3"));
    }
}
