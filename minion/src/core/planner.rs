//! Convergence decision: from desired target plus observed local state to the
//! action for this cycle.
//!
//! Pure and deterministic. Execution lives in [`crate::engine`].

use std::fmt;

use crate::core::image_ref::ImageRef;
use crate::core::launch::{ConfigDecodeError, LaunchConfig};
use crate::core::types::Observed;

/// What a cycle does to the container runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing to change.
    NoOp,
    /// Fetch the image but do not touch containers (the start is blocked).
    PullOnly(ImageRef),
    /// Stop every managed container and start one from `image`, pulling first
    /// when the image is not present.
    ReplaceAndStart {
        image: ImageRef,
        config: LaunchConfig,
        pull: bool,
    },
}

/// A runtime-visible step, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Pull(ImageRef),
    Start(ImageRef, LaunchConfig),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Pull(image) => write!(f, "pull {image}"),
            Step::Start(image, _) => write!(f, "start {image}"),
        }
    }
}

impl Action {
    pub fn steps(&self) -> Vec<Step> {
        match self {
            Action::NoOp => Vec::new(),
            Action::PullOnly(image) => vec![Step::Pull(image.clone())],
            Action::ReplaceAndStart {
                image,
                config,
                pull,
            } => {
                let mut steps = Vec::with_capacity(2);
                if *pull {
                    steps.push(Step::Pull(image.clone()));
                }
                steps.push(Step::Start(image.clone(), config.clone()));
                steps
            }
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Action::NoOp)
    }
}

/// The decided action plus, when the start is blocked, the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub action: Action,
    pub blocked: Option<ConfigDecodeError>,
}

/// Decide the action for `target`.
///
/// - Already running: no-op, whatever the other inputs say.
/// - Config undecodable: never stop or start; still pull a missing image.
/// - Otherwise: replace and start, pulling first if the image is missing.
pub fn plan(
    target: &ImageRef,
    observed: Observed,
    config: Result<LaunchConfig, ConfigDecodeError>,
) -> Plan {
    if observed.is_running {
        return Plan {
            action: Action::NoOp,
            blocked: None,
        };
    }
    match config {
        Err(err) => Plan {
            action: if observed.has_image {
                Action::NoOp
            } else {
                Action::PullOnly(target.clone())
            },
            blocked: Some(err),
        },
        Ok(config) => Plan {
            action: Action::ReplaceAndStart {
                image: target.clone(),
                config,
                pull: !observed.has_image,
            },
            blocked: None,
        },
    }
}
