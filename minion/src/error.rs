//! Error taxonomy for a reconciliation cycle.
//!
//! Every variant is recoverable: the poll loop logs it and retries on the next
//! interval. Startup failures are reported separately through `anyhow` and
//! [`crate::exit_codes`].

use std::time::Duration;

use thiserror::Error;

use crate::core::launch::ConfigDecodeError;

/// A managed container that did not accept its stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopFailure {
    pub container: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Metadata service or control plane unreachable, or its reply unreadable.
    #[error("transport error: {0}")]
    Transport(String),

    /// Descriptor claims a deployment but does not describe exactly one target.
    #[error("ambiguous deployment: {0}")]
    AmbiguousDeployment(String),

    #[error("registry auth failed for {registry}: {reason}")]
    Auth { registry: String, reason: String },

    #[error("pull failed for {image}: {reason}")]
    Pull { image: String, reason: String },

    #[error(transparent)]
    ConfigDecode(#[from] ConfigDecodeError),

    #[error("container runtime {op} failed: {reason}")]
    Runtime { op: &'static str, reason: String },

    #[error(
        "{} of {attempted} managed containers failed to stop: {}",
        .failures.len(),
        describe_failures(.failures)
    )]
    PartialStop {
        attempted: usize,
        failures: Vec<StopFailure>,
    },

    #[error("containers still present after {waited:?}: {}", .remaining.join(", "))]
    StopTimeout {
        remaining: Vec<String>,
        waited: Duration,
    },
}

impl ReconcileError {
    /// Short stable label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::AmbiguousDeployment(_) => "ambiguous_deployment",
            Self::Auth { .. } => "auth",
            Self::Pull { .. } => "pull",
            Self::ConfigDecode(_) => "config_decode",
            Self::Runtime { .. } => "runtime",
            Self::PartialStop { .. } => "partial_stop",
            Self::StopTimeout { .. } => "stop_timeout",
        }
    }

    /// Wrap an adapter failure from the container runtime.
    pub fn runtime(op: &'static str, err: anyhow::Error) -> Self {
        Self::Runtime {
            op,
            reason: format!("{err:#}"),
        }
    }
}

fn describe_failures(failures: &[StopFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.container, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}
