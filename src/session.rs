//! Lifetime of the coverage data inside one measured process.
//!
//! A [`Session`] owns the live [`ProjectData`] that instrumented code writes
//! into. Opening a session loads whatever the data file already holds;
//! saving adds the hits recorded since the last load or save back into the
//! file. The shutdown save happens at most once, however many times it is
//! triggered.
//!
//! Instrumented code should be handed an `Arc<Session>`. Producers that
//! cannot carry a handle may use [`global`], which lazily creates one
//! process-wide session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::config::Config;
use crate::coverage::{self, ProjectData};
use crate::db::{self, SaveStats, WriteMode};
use crate::error::Result;

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Live; started from an existing snapshot or from nothing.
    Loaded { from_snapshot: bool },
    /// The shutdown save has run (successfully or not).
    Saved,
}

pub struct Session {
    config: Config,
    project: ProjectData,
    from_snapshot: bool,
    save_lock: Mutex<()>,
    shut_down: AtomicBool,
}

impl Session {
    /// Start a session, loading the configured data file if it exists.
    /// A missing or unreadable file yields an empty project.
    pub fn open(config: Config) -> Self {
        let path = &config.data_file;
        let (project, from_snapshot) = match db::load_project(path) {
            Ok(Some(project)) => {
                log::debug!("Loaded coverage data from {}", path.display());
                (project, true)
            }
            Ok(None) => {
                log::info!(
                    "Coverage data file {} does not exist. Starting with empty coverage data.",
                    path.display()
                );
                (ProjectData::new(), false)
            }
            Err(e) => {
                log::warn!(
                    "Coverage data file {} is not readable ({}). Starting with empty coverage data.",
                    path.display(),
                    e
                );
                (ProjectData::new(), false)
            }
        };
        Self::with_project(config, project, from_snapshot)
    }

    fn with_project(config: Config, project: ProjectData, from_snapshot: bool) -> Self {
        Self {
            config,
            project,
            from_snapshot,
            save_lock: Mutex::new(()),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn project(&self) -> &ProjectData {
        &self.project
    }

    pub fn state(&self) -> SessionState {
        if self.shut_down.load(Ordering::Acquire) {
            SessionState::Saved
        } else {
            SessionState::Loaded {
                from_snapshot: self.from_snapshot,
            }
        }
    }

    #[inline]
    pub fn record_hit(&self, class_name: &str, line: u32) {
        coverage::record_hit(&self.project, class_name, line);
    }

    #[inline]
    pub fn record_branch_hit(&self, class_name: &str, line: u32, condition: usize, outcome: usize) {
        coverage::record_branch_hit(&self.project, class_name, line, condition, outcome);
    }

    /// Merge everything recorded since the last load or save into the data
    /// file.
    ///
    /// Only the save lock is held, so hits keep flowing while the file is
    /// written; hits that land after the snapshot is taken are picked up by
    /// the next save.
    pub fn save(&self) -> Result<SaveStats> {
        let _guard = self.save_lock.lock();
        let snapshot = self.project.snapshot();

        let mut conn = db::open(&self.config.data_file)?;
        db::init_schema(&conn)?;
        let stats = db::save_snapshot(&mut conn, &snapshot, WriteMode::Delta)?;
        self.project.mark_saved(&snapshot);

        log::debug!(
            "Saved coverage data to {} ({} classes, {} new hits)",
            self.config.data_file.display(),
            stats.classes,
            stats.added_hits
        );
        Ok(stats)
    }

    /// Run the shutdown save. Returns `None` when it already ran.
    pub fn shutdown(&self) -> Option<Result<SaveStats>> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return None;
        }
        let result = self.save();
        if let Err(e) = &result {
            log::error!(
                "Could not save coverage data to {}: {}",
                self.config.data_file.display(),
                e
            );
        }
        Some(result)
    }

    /// A guard that runs [`Session::shutdown`] when dropped. Keep it alive
    /// in `main` (or the test harness) of the measured program.
    pub fn shutdown_guard(self: &Arc<Self>) -> ShutdownGuard {
        ShutdownGuard {
            session: Arc::clone(self),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("data_file", &self.config.data_file)
            .field("state", &self.state())
            .field("classes", &self.project.number_of_classes())
            .finish()
    }
}

/// Saves its session once when dropped.
#[must_use = "the session is saved when the guard is dropped"]
pub struct ShutdownGuard {
    session: Arc<Session>,
}

impl ShutdownGuard {
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        // failures are already logged by shutdown()
        let _ = self.session.shutdown();
    }
}

static GLOBAL: OnceLock<Arc<Session>> = OnceLock::new();

/// The process-wide session, created from [`Config::from_env`] on first
/// use.
pub fn global() -> Arc<Session> {
    global_with(Config::from_env)
}

/// The process-wide session, created from `config` if it does not exist
/// yet. Later calls ignore their config.
pub fn global_with(config: impl FnOnce() -> Config) -> Arc<Session> {
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(Session::open(config()))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(dir: &tempfile::TempDir) -> Config {
        Config::with_data_file(dir.path().join("covtrack.db"))
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(temp_config(&dir));
        assert!(session.project().is_empty());
        assert_eq!(session.state(), SessionState::Loaded { from_snapshot: false });
    }

    #[test]
    fn test_open_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);
        std::fs::write(&config.data_file, b"definitely not sqlite").unwrap();
        let session = Session::open(config);
        assert!(session.project().is_empty());
    }

    #[test]
    fn test_shutdown_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(temp_config(&dir));
        session.record_hit("a.A", 1);
        assert!(session.shutdown().unwrap().is_ok());
        assert!(session.shutdown().is_none());
        assert_eq!(session.state(), SessionState::Saved);
    }

    #[test]
    fn test_guard_drop_saves() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);
        {
            let session = Arc::new(Session::open(config.clone()));
            let _guard = session.shutdown_guard();
            session.record_hit("a.A", 1);
        }
        let reopened = Session::open(config);
        assert_eq!(reopened.state(), SessionState::Loaded { from_snapshot: true });
        let class = reopened.project().class("a.A").unwrap();
        assert_eq!(class.line(1).unwrap().hits(), 1);
    }
}
