//! Orchestration for a single reconciliation cycle.
//!
//! A cycle fetches the desired state, resolves local image and container state,
//! plans with [`crate::core::planner::plan`], then executes the plan in a fixed
//! order: authenticate, pull, stop, wait, start. The engine owns its adapters
//! and is scoped to one host runtime.

use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::core::image_ref::ImageRef;
use crate::core::launch::{LaunchConfig, RunSpec};
use crate::core::matching::{RunningState, image_present, managed, running_state};
use crate::core::planner::{Action, Plan, Step, plan};
use crate::core::types::{DeploymentTarget, Desired, NodeIdentity, Observed};
use crate::core::wait::WaitPolicy;
use crate::error::{ReconcileError, StopFailure};
use crate::io::overlord::DesiredStateClient;
use crate::io::registry_auth::{Session, TokenSource, authenticate};
use crate::io::runtime::ContainerRuntime;
use crate::io::sleep::Sleeper;

/// Engine knobs taken from the agent config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Reserved name of the single managed container.
    pub managed_name: String,
    /// Grace period handed to the runtime's stop call.
    pub stop_timeout: Duration,
    pub stop_wait: WaitPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            managed_name: "app".to_string(),
            stop_timeout: Duration::from_secs(10),
            stop_wait: WaitPolicy::default(),
        }
    }
}

/// Desired state plus the plan computed against local state. No side effects
/// have happened yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CyclePlan {
    NotDeployed,
    Target {
        target: DeploymentTarget,
        observed: Observed,
        plan: Plan,
    },
}

/// Result of a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The control plane has nothing for this node.
    NotDeployed,
    /// The target already runs; nothing was touched.
    AlreadyRunning { image: ImageRef },
    /// The listed steps were executed.
    Applied { image: ImageRef, steps: Vec<Step> },
}

pub struct Reconciler<O, R, T, S> {
    overlord: O,
    runtime: R,
    tokens: T,
    sleeper: S,
    settings: EngineSettings,
}

impl<O, R, T, S> Reconciler<O, R, T, S>
where
    O: DesiredStateClient,
    R: ContainerRuntime,
    T: TokenSource,
    S: Sleeper,
{
    pub fn new(overlord: O, runtime: R, tokens: T, sleeper: S, settings: EngineSettings) -> Self {
        Self {
            overlord,
            runtime,
            tokens,
            sleeper,
            settings,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn overlord(&self) -> &O {
        &self.overlord
    }

    pub fn tokens(&self) -> &T {
        &self.tokens
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Whether the exact `image` tag exists locally. A missing repository is `false`.
    pub fn has_image(&self, image: &ImageRef) -> Result<bool, ReconcileError> {
        let images = self
            .runtime
            .list_images(image.repository_uri())
            .map_err(|err| ReconcileError::runtime("list images", err))?;
        Ok(image_present(&images, &image.canonical()))
    }

    /// Whether exactly one managed container runs `image`.
    ///
    /// More than one running managed container breaks the single-container
    /// invariant: it is logged and reported as not running so the converge
    /// path replaces all of them.
    pub fn is_running(&self, image: &ImageRef) -> Result<bool, ReconcileError> {
        let name = &self.settings.managed_name;
        let containers = self
            .runtime
            .list_containers(name, false)
            .map_err(|err| ReconcileError::runtime("list containers", err))?;
        let state = running_state(&containers, name, &image.canonical());
        if let RunningState::Duplicated { count, any_current } = state {
            error!(
                managed_name = %name,
                count,
                any_current,
                "multiple managed containers running; replacing all of them"
            );
        }
        Ok(state.is_running())
    }

    /// Fetch the desired state and plan against local state. Read-only.
    #[instrument(skip_all, fields(node = %node.instance_id))]
    pub fn plan_cycle(&self, node: &NodeIdentity) -> Result<CyclePlan, ReconcileError> {
        let target = match self.overlord.fetch(node)? {
            Desired::NotDeployed => return Ok(CyclePlan::NotDeployed),
            Desired::Deployed(target) => target,
        };
        let observed = Observed {
            has_image: self.has_image(&target.image)?,
            is_running: self.is_running(&target.image)?,
        };
        debug!(
            image = %target.image,
            has_image = observed.has_image,
            is_running = observed.is_running,
            "resolved local state"
        );
        let config = LaunchConfig::decode(target.config.as_deref());
        let plan = plan(&target.image, observed, config);
        Ok(CyclePlan::Target {
            target,
            observed,
            plan,
        })
    }

    /// One full reconciliation cycle.
    ///
    /// A blocked start still performs the planned pull, then reports the
    /// config decode error.
    #[instrument(skip_all, fields(node = %node.instance_id))]
    pub fn run_cycle(&self, node: &NodeIdentity) -> Result<CycleOutcome, ReconcileError> {
        let (target, plan) = match self.plan_cycle(node)? {
            CyclePlan::NotDeployed => return Ok(CycleOutcome::NotDeployed),
            CyclePlan::Target { target, plan, .. } => (target, plan),
        };
        if plan.action.is_noop() && plan.blocked.is_none() {
            return Ok(CycleOutcome::AlreadyRunning {
                image: target.image,
            });
        }

        self.apply(&target, &plan.action)?;
        if let Some(err) = plan.blocked {
            return Err(err.into());
        }
        Ok(CycleOutcome::Applied {
            steps: plan.action.steps(),
            image: target.image,
        })
    }

    /// Execute `action` against the runtime.
    pub fn apply(&self, target: &DeploymentTarget, action: &Action) -> Result<(), ReconcileError> {
        match action {
            Action::NoOp => Ok(()),
            Action::PullOnly(image) => {
                self.login(target)?;
                self.pull(image)
            }
            Action::ReplaceAndStart {
                image,
                config,
                pull,
            } => {
                self.login(target)?;
                if *pull {
                    self.pull(image)?;
                }
                self.stop_managed()?;
                self.clear_leftovers()?;
                self.start(image, config)
            }
        }
    }

    fn login(&self, target: &DeploymentTarget) -> Result<Session, ReconcileError> {
        authenticate(
            &self.tokens,
            &self.runtime,
            &target.registry_id,
            target.image.registry_host(),
        )
    }

    #[instrument(skip_all, fields(image = %image))]
    fn pull(&self, image: &ImageRef) -> Result<(), ReconcileError> {
        let pull_error = |reason: String| ReconcileError::Pull {
            image: image.canonical(),
            reason,
        };
        match self.runtime.pull(image) {
            Ok(true) => {
                info!("pulled image");
                Ok(())
            }
            Ok(false) => Err(pull_error("runtime reported a failed pull".to_string())),
            Err(err) => Err(pull_error(format!("{err:#}"))),
        }
    }

    /// Stop every running managed container, then wait for the stopped ones
    /// to disappear.
    ///
    /// A failed stop does not prevent stopping the others. Failures are
    /// reported as [`ReconcileError::PartialStop`] after the wait.
    #[instrument(skip_all)]
    pub fn stop_managed(&self) -> Result<(), ReconcileError> {
        let name = &self.settings.managed_name;
        let containers = self
            .runtime
            .list_containers(name, false)
            .map_err(|err| ReconcileError::runtime("list containers", err))?;
        let running = managed(&containers, name);
        if running.is_empty() {
            debug!("no managed container running");
            return Ok(());
        }

        let mut stopped = Vec::with_capacity(running.len());
        let mut failures = Vec::new();
        for container in &running {
            match self.runtime.stop(container, self.settings.stop_timeout) {
                Ok(()) => {
                    info!(container = %container.id, "stop requested");
                    stopped.push(container.id.clone());
                }
                Err(err) => {
                    let reason = format!("{err:#}");
                    warn!(container = %container.id, error = %reason, "stop failed");
                    failures.push(StopFailure {
                        container: container.id.clone(),
                        reason,
                    });
                }
            }
        }

        self.wait_for_absence(&stopped)?;
        if !failures.is_empty() {
            return Err(ReconcileError::PartialStop {
                attempted: running.len(),
                failures,
            });
        }
        Ok(())
    }

    /// Poll until none of `ids` runs, following the configured wait policy.
    pub fn wait_for_absence(&self, ids: &[String]) -> Result<(), ReconcileError> {
        if ids.is_empty() {
            return Ok(());
        }
        let name = &self.settings.managed_name;
        let policy = self.settings.stop_wait;
        let mut remaining = ids.to_vec();
        for (poll, delay) in policy.delays().enumerate() {
            self.sleeper.sleep(delay);
            let containers = self
                .runtime
                .list_containers(name, false)
                .map_err(|err| ReconcileError::runtime("list containers", err))?;
            remaining.retain(|id| containers.iter().any(|c| c.running && &c.id == id));
            if remaining.is_empty() {
                debug!(polls = poll + 1, "stopped containers are gone");
                return Ok(());
            }
            debug!(poll = poll + 1, remaining = remaining.len(), "waiting for containers to exit");
        }
        Err(ReconcileError::StopTimeout {
            remaining,
            waited: policy.budget(),
        })
    }

    /// Remove exited containers holding the managed name; `run --name` would
    /// refuse to start otherwise.
    fn clear_leftovers(&self) -> Result<(), ReconcileError> {
        let name = &self.settings.managed_name;
        let containers = self
            .runtime
            .list_containers(name, true)
            .map_err(|err| ReconcileError::runtime("list containers", err))?;
        for container in containers.iter().filter(|c| !c.running) {
            self.runtime
                .remove(container)
                .map_err(|err| ReconcileError::runtime("remove container", err))?;
            info!(container = %container.id, "removed exited container");
        }
        Ok(())
    }

    #[instrument(skip_all, fields(image = %image))]
    fn start(&self, image: &ImageRef, config: &LaunchConfig) -> Result<(), ReconcileError> {
        if !config.overridden.is_empty() {
            warn!(
                options = ?config.overridden,
                "config options overridden by mandatory run flags"
            );
        }
        let spec = RunSpec::new(image.clone(), config.clone(), &self.settings.managed_name);
        let id = self
            .runtime
            .run(&spec)
            .map_err(|err| ReconcileError::runtime("run container", err))?;
        info!(container = %id, name = %spec.name, "started container");
        Ok(())
    }
}
