//! Staged execution engine.
//!
//! Work is declared as named stages. A leaf stage runs a single action, a
//! complex stage hands its action a child [`Stage`] used to declare nested
//! stages. Every declared stage produces one `Started` event and exactly one
//! terminal event (finished, failed or skipped) on the observer. Execution is
//! strictly sequential: an error returned from a stage propagates to the
//! caller, which short-circuits the remaining siblings with `?`.

mod event;
mod observer;
mod tree;

pub use event::{StageEvent, StageEventKind};
pub use observer::{CompositeStageObserver, LoggingStageObserver, StageObserver};
pub use tree::{BoxFuture, StageAction, StageNode};

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{DeployError, Result};

/// Handle used to declare and run stages.
///
/// A `Stage` is cheap to clone; clones report to the same observer and share
/// the same position in the stage tree.
#[derive(Clone)]
pub struct Stage {
    /// Receives start and terminal notifications.
    observer: Arc<dyn StageObserver>,
    /// Names of the enclosing complex stages, outermost first.
    path: Vec<String>,
}

impl Stage {
    /// Creates a root stage reporting to `observer`.
    #[must_use]
    pub fn new(observer: Arc<dyn StageObserver>) -> Self {
        Self {
            observer,
            path: Vec::new(),
        }
    }

    /// Names of the enclosing complex stages, outermost first.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Runs `action` as a leaf stage named `name`.
    ///
    /// An action returning [`DeployError::SkipStage`] is reported as skipped
    /// and yields `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns the action's error unchanged.
    pub async fn perform<F, Fut>(&self, name: &str, action: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let path = self.child_path(name);
        self.notify(&path, false, StageEventKind::Started);

        let started = Instant::now();
        let result = action().await;
        self.finish(&path, false, started, result)
    }

    /// Runs `action` as a complex stage named `name`.
    ///
    /// The action receives a child stage on which nested stages are declared.
    ///
    /// # Errors
    ///
    /// Returns the action's error unchanged, which is typically the error of
    /// the first nested stage that failed.
    pub async fn perform_complex<F, Fut>(&self, name: &str, action: F) -> Result<()>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let path = self.child_path(name);
        self.notify(&path, true, StageEventKind::Started);

        let child = Self {
            observer: Arc::clone(&self.observer),
            path: path.clone(),
        };

        let started = Instant::now();
        let result = action(child).await;
        self.finish(&path, true, started, result)
    }

    fn child_path(&self, name: &str) -> Vec<String> {
        let mut path = self.path.clone();
        path.push(name.to_string());
        path
    }

    fn notify(&self, path: &[String], complex: bool, kind: StageEventKind) {
        self.observer.on_event(&StageEvent {
            path: path.to_vec(),
            complex,
            kind,
        });
    }

    fn finish(
        &self,
        path: &[String],
        complex: bool,
        started: Instant,
        result: Result<()>,
    ) -> Result<()> {
        let elapsed = started.elapsed();

        match result {
            Ok(()) => {
                self.notify(path, complex, StageEventKind::Finished { elapsed });
                Ok(())
            }
            Err(DeployError::SkipStage { reason, source }) => {
                self.notify(
                    path,
                    complex,
                    StageEventKind::Skipped {
                        reason,
                        cause: source.map(|cause| cause.to_string()),
                        elapsed,
                    },
                );
                Ok(())
            }
            Err(err) => {
                self.notify(
                    path,
                    complex,
                    StageEventKind::Failed {
                        message: err.to_string(),
                        elapsed,
                    },
                );
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingObserver;

    #[tokio::test]
    async fn test_leaf_success_reports_start_then_finish() {
        let observer = RecordingObserver::new();
        let stage = Stage::new(observer.clone());

        stage
            .perform("Downloading release 'cpi'", || async { Ok(()) })
            .await
            .expect("stage should succeed");

        assert_eq!(
            observer.lines(),
            vec![
                "start Downloading release 'cpi'",
                "finish Downloading release 'cpi'",
            ]
        );
    }

    #[tokio::test]
    async fn test_leaf_failure_returns_error_unchanged() {
        let observer = RecordingObserver::new();
        let stage = Stage::new(observer.clone());

        let err = stage
            .perform("Deleting VM 'vm-1'", || async {
                Err(DeployError::internal("cloud down"))
            })
            .await
            .expect_err("stage should fail");

        assert_eq!(err.to_string(), "Internal error: cloud down");
        assert_eq!(
            observer.lines(),
            vec!["start Deleting VM 'vm-1'", "fail Deleting VM 'vm-1'"]
        );
    }

    #[tokio::test]
    async fn test_skip_is_reported_and_swallowed() {
        let observer = RecordingObserver::new();
        let stage = Stage::new(observer.clone());

        stage
            .perform("Deleting disk 'disk-1'", || async {
                Err(DeployError::skip(
                    "Disk not found",
                    DeployError::internal("404"),
                ))
            })
            .await
            .expect("skip is not a failure");

        assert_eq!(
            observer.lines(),
            vec!["start Deleting disk 'disk-1'", "skip Deleting disk 'disk-1'"]
        );
    }

    #[tokio::test]
    async fn test_nested_failure_short_circuits_siblings() {
        let observer = RecordingObserver::new();
        let stage = Stage::new(observer.clone());

        let result = stage
            .perform_complex("parent", |parent| async move {
                parent.perform("first", || async { Ok(()) }).await?;
                parent
                    .perform("second", || async {
                        Err(DeployError::internal("second failed"))
                    })
                    .await?;
                parent.perform("third", || async { Ok(()) }).await?;
                Ok(())
            })
            .await;

        let err = result.expect_err("parent should fail");
        assert_eq!(err.to_string(), "Internal error: second failed");
        assert_eq!(
            observer.lines(),
            vec![
                "start parent",
                "start parent > first",
                "finish parent > first",
                "start parent > second",
                "fail parent > second",
                "fail parent",
            ]
        );
    }

    #[tokio::test]
    async fn test_complex_stage_exposes_child_path() {
        let observer = RecordingObserver::new();
        let stage = Stage::new(observer);

        let mut seen = Vec::new();
        let slot = &mut seen;
        stage
            .perform_complex("installing CPI", move |child| async move {
                slot.extend(child.path().iter().cloned());
                Ok(())
            })
            .await
            .expect("stage should succeed");

        assert_eq!(seen, vec![String::from("installing CPI")]);
    }
}
