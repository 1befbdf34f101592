//! Stage descriptor trees.
//!
//! A [`StageNode`] describes a stage hierarchy up front. Running the root
//! walks the tree depth-first; the first failing node stops its siblings and
//! every ancestor reports the failure.

use std::future::Future;
use std::pin::Pin;

use super::Stage;
use crate::error::Result;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Deferred work of a leaf stage.
pub type StageAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// A stage descriptor.
pub enum StageNode {
    /// Runs a single action.
    Leaf {
        /// Stage name.
        name: String,
        /// Work to perform.
        action: StageAction,
    },
    /// Runs its children in order.
    Complex {
        /// Stage name.
        name: String,
        /// Nested stages.
        children: Vec<StageNode>,
    },
}

impl StageNode {
    /// Creates a leaf node.
    #[must_use]
    pub fn leaf<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::Leaf {
            name: name.into(),
            action: Box::new(move || Box::pin(action())),
        }
    }

    /// Creates a complex node.
    #[must_use]
    pub fn complex(name: impl Into<String>, children: Vec<Self>) -> Self {
        Self::Complex {
            name: name.into(),
            children,
        }
    }

    /// Name of this node.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Leaf { name, .. } | Self::Complex { name, .. } => name,
        }
    }

    /// Runs this node and its descendants under `stage`.
    ///
    /// # Errors
    ///
    /// Returns the error of the first node that failed.
    pub fn run(self, stage: &Stage) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            match self {
                Self::Leaf { name, action } => stage.perform(&name, action).await,
                Self::Complex { name, children } => {
                    stage
                        .perform_complex(&name, |child| async move {
                            for node in children {
                                node.run(&child).await?;
                            }
                            Ok(())
                        })
                        .await
                }
            }
        })
    }
}

impl std::fmt::Debug for StageNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Leaf { name, .. } => f.debug_struct("Leaf").field("name", name).finish(),
            Self::Complex { name, children } => f
                .debug_struct("Complex")
                .field("name", name)
                .field("children", children)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployError;
    use crate::testing::RecordingObserver;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_leaf(name: &str, counter: &Arc<AtomicUsize>, fail: bool) -> StageNode {
        let counter = Arc::clone(counter);
        StageNode::leaf(name, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            if fail {
                Err(DeployError::internal("leaf failed"))
            } else {
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_second_child_failure_skips_third() {
        let observer = RecordingObserver::new();
        let stage = Stage::new(observer.clone());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let third = Arc::new(AtomicUsize::new(0));

        let tree = StageNode::complex(
            "root",
            vec![
                counting_leaf("one", &first, false),
                counting_leaf("two", &second, true),
                counting_leaf("three", &third, false),
            ],
        );

        let err = tree.run(&stage).await.expect_err("tree should fail");

        assert_eq!(err.to_string(), "Internal error: leaf failed");
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(third.load(Ordering::SeqCst), 0);
        assert_eq!(
            observer.lines(),
            vec![
                "start root",
                "start root > one",
                "finish root > one",
                "start root > two",
                "fail root > two",
                "fail root",
            ]
        );
    }

    #[tokio::test]
    async fn test_nested_tree_runs_depth_first() {
        let observer = RecordingObserver::new();
        let stage = Stage::new(observer.clone());
        let counter = Arc::new(AtomicUsize::new(0));

        let tree = StageNode::complex(
            "outer",
            vec![
                StageNode::complex("inner", vec![counting_leaf("a", &counter, false)]),
                counting_leaf("b", &counter, false),
            ],
        );
        assert_eq!(tree.name(), "outer");

        tree.run(&stage).await.expect("tree should succeed");

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(
            observer.lines(),
            vec![
                "start outer",
                "start outer > inner",
                "start outer > inner > a",
                "finish outer > inner > a",
                "finish outer > inner",
                "start outer > b",
                "finish outer > b",
                "finish outer",
            ]
        );
    }
}
