//! Scenario execution engine.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::error::{HarnessError, HarnessResult};
use crate::scenarios::{self, Scenario};
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

/// Outcome of one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub section: String,
    pub passed: bool,
    /// Failure description, if any.
    pub detail: Option<String>,
    pub duration_us: u64,
}

/// Runs scenarios, each in a fresh subdirectory of a work directory.
pub struct ScenarioRunner {
    /// Name of the run; becomes the trace-id prefix in logs.
    pub campaign: String,
    /// Substring filter on scenario names.
    pub filter: Option<String>,
    set: &'static [Scenario],
}

impl ScenarioRunner {
    /// A runner over the built-in scenario set.
    #[must_use]
    pub fn new(campaign: impl Into<String>) -> Self {
        Self {
            campaign: campaign.into(),
            filter: None,
            set: scenarios::all(),
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Replace the built-in scenarios with `set`.
    #[must_use]
    pub fn with_scenarios(mut self, set: &'static [Scenario]) -> Self {
        self.set = set;
        self
    }

    fn selected(&self) -> impl Iterator<Item = &'static Scenario> + '_ {
        self.set
            .iter()
            .filter(|s| self.filter.as_deref().is_none_or(|f| s.name.contains(f)))
    }

    /// Run every selected scenario under `workdir`.
    pub fn run(&self, workdir: &Path) -> HarnessResult<Vec<ScenarioResult>> {
        self.selected()
            .map(|s| run_one(s, workdir).map(|(result, _)| result))
            .collect()
    }

    /// Like [`run`](Self::run), emitting one JSONL entry per scenario plus a
    /// summary entry. Failures caused by a library error carry its kind and
    /// errno.
    pub fn run_logged(
        &self,
        workdir: &Path,
        emitter: &mut LogEmitter,
    ) -> HarnessResult<Vec<ScenarioResult>> {
        let mut results = Vec::new();
        for scenario in self.selected() {
            let (result, failure) = run_one(scenario, workdir)?;
            let mut entry = LogEntry::new(
                "",
                if result.passed { LogLevel::Info } else { LogLevel::Error },
                "scenario",
            )
            .with_scenario(scenario.name)
            .with_outcome(if result.passed { Outcome::Pass } else { Outcome::Fail })
            .with_duration_us(result.duration_us);
            if let Some(HarnessError::Bufopen(e)) = &failure {
                entry = entry.with_error(e);
            }
            if let Some(detail) = &result.detail {
                entry = entry.with_details(serde_json::json!({ "detail": detail }));
            }
            emitter.emit_entry(entry)?;
            results.push(result);
        }

        let failed = results.iter().filter(|r| !r.passed).count();
        emitter.emit_entry(
            LogEntry::new("", LogLevel::Info, "summary")
                .with_outcome(if failed == 0 { Outcome::Pass } else { Outcome::Fail })
                .with_details(serde_json::json!({
                    "campaign": self.campaign,
                    "total": results.len(),
                    "failed": failed,
                })),
        )?;
        emitter.flush()?;
        Ok(results)
    }

    /// Run a single scenario by exact name.
    pub fn run_named(&self, name: &str, workdir: &Path) -> HarnessResult<ScenarioResult> {
        let scenario = self
            .set
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| HarnessError::UnknownScenario(name.to_string()))?;
        run_one(scenario, workdir).map(|(result, _)| result)
    }
}

/// Setup failures (the scenario directory) are errors; anything the scenario
/// itself reports is a failed result, returned alongside the error it raised.
fn run_one(
    scenario: &Scenario,
    workdir: &Path,
) -> HarnessResult<(ScenarioResult, Option<HarnessError>)> {
    let dir = workdir.join(scenario.name);
    std::fs::create_dir_all(&dir)?;

    let start = Instant::now();
    let outcome = scenario.run(&dir);
    let duration_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);

    match &outcome {
        Ok(()) => tracing::info!(scenario = scenario.name, duration_us, "scenario passed"),
        Err(e) => tracing::error!(scenario = scenario.name, error = %e, "scenario failed"),
    }

    let failure = outcome.err();
    let result = ScenarioResult {
        name: scenario.name.to_string(),
        section: scenario.section.to_string(),
        passed: failure.is_none(),
        detail: failure.as_ref().map(ToString::to_string),
        duration_us,
    };
    Ok((result, failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured_log::validate_log_file;
    use bufopen::{BufferedFile, OpenFlags};

    fn open_missing(dir: &Path) -> HarnessResult<()> {
        BufferedFile::open(dir.join("absent.txt"), OpenFlags::read_only())?;
        Ok(())
    }

    fn wrong_content(_dir: &Path) -> HarnessResult<()> {
        Err(HarnessError::mismatch("content", "a", "b"))
    }

    static FAILING: &[Scenario] = &[
        Scenario::new("open_missing", "open: failure surfaces", open_missing),
        Scenario::new("wrong_content", "mismatch without a library error", wrong_content),
    ];

    #[test]
    fn test_filter_selects_subset() {
        let runner = ScenarioRunner::new("unit").with_filter("prepend");
        let names: Vec<_> = runner.selected().map(|s| s.name).collect();
        assert!(!names.is_empty());
        assert!(names.iter().all(|n| n.contains("prepend")));
    }

    #[test]
    fn test_unknown_scenario_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScenarioRunner::new("unit")
            .run_named("does_not_exist", dir.path())
            .unwrap_err();
        assert!(matches!(err, HarnessError::UnknownScenario(_)));
    }

    #[test]
    fn test_run_named_uses_own_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = ScenarioRunner::new("unit")
            .run_named("prepend_hello_world", dir.path())
            .unwrap();
        assert!(result.passed, "{:?}", result.detail);
        assert!(dir.path().join("prepend_hello_world").join("greeting.txt").exists());
    }

    #[test]
    fn test_failed_scenario_logs_library_error_kind() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("run.jsonl");
        let mut emitter = LogEmitter::to_file(&log_path, "failing").unwrap();

        let results = ScenarioRunner::new("failing")
            .with_scenarios(FAILING)
            .run_logged(dir.path(), &mut emitter)
            .unwrap();
        drop(emitter);
        assert!(results.iter().all(|r| !r.passed));

        let (valid, errors) = validate_log_file(&log_path).unwrap();
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(valid, 3);

        let text = std::fs::read_to_string(&log_path).unwrap();
        let entries: Vec<LogEntry> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        let open = &entries[0];
        assert_eq!(open.scenario.as_deref(), Some("open_missing"));
        assert_eq!(open.outcome, Some(Outcome::Fail));
        assert_eq!(open.error_kind.as_deref(), Some("OpenFailure"));
        // ENOENT
        assert_eq!(open.errno, Some(2));

        let mismatch = &entries[1];
        assert_eq!(mismatch.outcome, Some(Outcome::Fail));
        assert_eq!(mismatch.error_kind, None);
        assert_eq!(mismatch.errno, None);
    }
}
