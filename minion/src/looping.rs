//! Poll loop driving reconciliation cycles for `minion run` and `minion once`.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::core::types::NodeIdentity;
use crate::engine::{CycleOutcome, Reconciler};
use crate::error::ReconcileError;
use crate::io::overlord::DesiredStateClient;
use crate::io::registry_auth::TokenSource;
use crate::io::runtime::ContainerRuntime;
use crate::io::sleep::Sleeper;

/// Summary of a loop invocation. Only returned when a cycle limit is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub cycles: u32,
    pub failures: u32,
    /// Error of the last cycle, if it failed.
    pub last_error: Option<ReconcileError>,
}

/// Run reconciliation cycles `interval` apart.
///
/// A failed cycle is logged and the loop carries on after the normal sleep.
/// With `max_cycles` unset the loop never returns; otherwise it stops after
/// that many cycles without sleeping after the last one.
pub fn run_loop<O, R, T, S, F>(
    reconciler: &Reconciler<O, R, T, S>,
    node: &NodeIdentity,
    interval: Duration,
    max_cycles: Option<u32>,
    mut on_cycle: F,
) -> LoopOutcome
where
    O: DesiredStateClient,
    R: ContainerRuntime,
    T: TokenSource,
    S: Sleeper,
    F: FnMut(&Result<CycleOutcome, ReconcileError>),
{
    let mut outcome = LoopOutcome {
        cycles: 0,
        failures: 0,
        last_error: None,
    };
    loop {
        let result = reconciler.run_cycle(node);
        log_cycle(node, &result);
        outcome.cycles += 1;
        on_cycle(&result);
        match result {
            Ok(_) => outcome.last_error = None,
            Err(err) => {
                outcome.failures += 1;
                outcome.last_error = Some(err);
            }
        }

        if max_cycles.is_some_and(|max| outcome.cycles >= max) {
            return outcome;
        }
        reconciler.sleeper().sleep(interval);
    }
}

fn log_cycle(node: &NodeIdentity, result: &Result<CycleOutcome, ReconcileError>) {
    let node = node.instance_id.as_str();
    match result {
        Ok(CycleOutcome::NotDeployed) => info!(node, "nothing deployed to this node"),
        Ok(CycleOutcome::AlreadyRunning { image }) => {
            info!(node, image = %image, "target already running");
        }
        Ok(CycleOutcome::Applied { image, steps }) => {
            let steps: Vec<String> = steps.iter().map(ToString::to_string).collect();
            info!(node, image = %image, steps = ?steps, "converged");
        }
        Err(err @ ReconcileError::AmbiguousDeployment(_)) => {
            warn!(node, kind = err.kind(), error = %err, "skipping cycle");
        }
        Err(err) => error!(node, kind = err.kind(), error = %err, "cycle failed"),
    }
}
