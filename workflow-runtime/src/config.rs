use std::path::{Path, PathBuf};
use std::time::Duration;

/// What a resume does when one of the placeholders fails to rehydrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumePolicy {
    /// The first failure cancels every other rehydration and fails the resume.
    #[default]
    AbortOnFailure,
    /// Failures are collected per resource; the resume succeeds with whatever
    /// could be rebuilt.
    TolerateFailures,
}

/// Options for rehydrating an execution's placeholders.
#[derive(Debug, Clone, Default)]
pub struct ResumeOptions {
    pub policy: ResumePolicy,
    /// Upper bound on the whole rehydration. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl ResumeOptions {
    #[must_use]
    pub fn with_policy(mut self, policy: ResumePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Configuration of an [`ExecutionStore`](crate::ExecutionStore).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use workflow_runtime::{ResumePolicy, RuntimeConfig};
///
/// let config = RuntimeConfig::default()
///     .with_root_dir("/var/lib/flows")
///     .with_resume_policy(ResumePolicy::TolerateFailures)
///     .with_resume_timeout(Some(Duration::from_secs(30)));
/// assert_eq!(config.view_prefix, "job");
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Directory under which every execution gets its storage root.
    pub root_dir: PathBuf,
    /// First segment of routing paths, repeated before every job folder.
    pub view_prefix: String,
    pub resume: ResumeOptions,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(".workflow"),
            view_prefix: "job".to_string(),
            resume: ResumeOptions::default(),
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn with_root_dir(mut self, root_dir: impl AsRef<Path>) -> Self {
        self.root_dir = root_dir.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub fn with_view_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.view_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_resume_policy(mut self, policy: ResumePolicy) -> Self {
        self.resume.policy = policy;
        self
    }

    #[must_use]
    pub fn with_resume_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.resume.timeout = timeout;
        self
    }
}
