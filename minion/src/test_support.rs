//! In-memory fakes of every adapter trait, plus descriptor builders.
//!
//! Fakes use `RefCell` and record each call as a short string such as
//! `"stop c1"` or `"pull repo:tag"`, so tests assert on the exact sequence.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde_json::json;

use crate::core::image_ref::ImageRef;
use crate::core::launch::RunSpec;
use crate::core::types::{Container, DeploymentTarget, Desired, LocalImage, NodeIdentity};
use crate::error::ReconcileError;
use crate::io::overlord::DesiredStateClient;
use crate::io::registry_auth::{Credentials, TokenSource};
use crate::io::runtime::ContainerRuntime;
use crate::io::sleep::Sleeper;

pub const REPOSITORY: &str = "acct.dkr.ecr.region.amazonaws.com/app";
pub const REGISTRY_ID: &str = "111";
pub const REGISTRY_HOST: &str = "acct.dkr.ecr.region.amazonaws.com";
pub const MANAGED_NAME: &str = "app";

/// `REPOSITORY:tag`.
pub fn image_tag(tag: &str) -> String {
    format!("{REPOSITORY}:{tag}")
}

pub fn node() -> NodeIdentity {
    NodeIdentity {
        instance_id: "i-0123456789abcdef0".to_string(),
        region: "region".to_string(),
    }
}

pub fn target(tag: &str, config: Option<&str>) -> DeploymentTarget {
    DeploymentTarget {
        image: ImageRef::new(REPOSITORY, tag).expect("image ref"),
        registry_id: REGISTRY_ID.to_string(),
        config: config.map(str::to_string),
    }
}

pub fn deployed(tag: &str, config: Option<&str>) -> Desired {
    Desired::Deployed(target(tag, config))
}

/// A control-plane reply in wire form: boolean `deployed` first, then the
/// deployed object under the same key.
pub fn descriptor_body(tag: &str, config: Option<&str>) -> String {
    let deployed = json!({ "image_tag": tag, "config": config }).to_string();
    let details = json!([{ "repositoryUri": REPOSITORY, "registryId": REGISTRY_ID }]).to_string();
    format!(r#"{{"deployed": true, "details": {details}, "deployed": {deployed}}}"#)
}

/// A running container named `name` started from `REPOSITORY:tag`.
pub fn running_container(id: &str, name: &str, tag: &str) -> Container {
    Container {
        id: id.to_string(),
        name: name.to_string(),
        image_tags: vec![image_tag(tag)],
        running: true,
    }
}

#[derive(Debug, Default)]
struct RuntimeState {
    images: Vec<LocalImage>,
    containers: Vec<Container>,
    calls: Vec<String>,
    started: Vec<Vec<String>>,
    next_id: u32,
}

/// Scripted container runtime.
///
/// Containers are started with `--rm`, so a successful stop removes them.
/// `run` refuses a name already in use, like the real daemon.
#[derive(Debug, Default)]
pub struct FakeRuntime {
    state: RefCell<RuntimeState>,
    refuse_login: bool,
    fail_pull: bool,
    fail_listing: bool,
    failing_stops: Vec<String>,
    stuck: Vec<String>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(self, tag: &str) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let id = format!("sha256:{}", state.images.len() + 1);
            state.images.push(LocalImage {
                id,
                tags: vec![image_tag(tag)],
            });
        }
        self
    }

    pub fn with_container(self, container: Container) -> Self {
        self.state.borrow_mut().containers.push(container);
        self
    }

    pub fn refuse_login(mut self) -> Self {
        self.refuse_login = true;
        self
    }

    pub fn fail_pull(mut self) -> Self {
        self.fail_pull = true;
        self
    }

    pub fn fail_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// `stop` on this container returns an error.
    pub fn fail_stop(mut self, id: &str) -> Self {
        self.failing_stops.push(id.to_string());
        self
    }

    /// `stop` on this container succeeds but it keeps running.
    pub fn stuck(mut self, id: &str) -> Self {
        self.stuck.push(id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    /// Calls that change runtime state (everything except listings and pings).
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| !call.starts_with("list_") && call != "ping")
            .collect()
    }

    /// `docker run` arguments of every start, in order.
    pub fn started(&self) -> Vec<Vec<String>> {
        self.state.borrow().started.clone()
    }

    pub fn containers(&self) -> Vec<Container> {
        self.state.borrow().containers.clone()
    }

    pub fn running(&self) -> Vec<Container> {
        self.containers().into_iter().filter(|c| c.running).collect()
    }

    fn record(&self, call: String) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl ContainerRuntime for FakeRuntime {
    fn ping(&self) -> Result<String> {
        self.record("ping".to_string());
        Ok("27.0.1".to_string())
    }

    fn list_images(&self, repository: &str) -> Result<Vec<LocalImage>> {
        self.record(format!("list_images {repository}"));
        if self.fail_listing {
            return Err(anyhow!("image listing failed"));
        }
        let prefix = format!("{repository}:");
        Ok(self
            .state
            .borrow()
            .images
            .iter()
            .filter(|image| image.tags.iter().any(|tag| tag.starts_with(&prefix)))
            .cloned()
            .collect())
    }

    fn list_containers(&self, name: &str, all: bool) -> Result<Vec<Container>> {
        self.record(format!("list_containers {name}"));
        if self.fail_listing {
            return Err(anyhow!("container listing failed"));
        }
        Ok(self
            .state
            .borrow()
            .containers
            .iter()
            .filter(|c| c.name == name && (all || c.running))
            .cloned()
            .collect())
    }

    fn pull(&self, image: &ImageRef) -> Result<bool> {
        self.record(format!("pull {image}"));
        if self.fail_pull {
            return Ok(false);
        }
        let mut state = self.state.borrow_mut();
        let id = format!("sha256:{}", state.images.len() + 1);
        state.images.push(LocalImage {
            id,
            tags: vec![image.canonical()],
        });
        Ok(true)
    }

    fn run(&self, spec: &RunSpec) -> Result<String> {
        self.record(format!("run {}", spec.image));
        let mut state = self.state.borrow_mut();
        if state.containers.iter().any(|c| c.name == spec.name) {
            return Err(anyhow!("container name {:?} is already in use", spec.name));
        }
        state.started.push(spec.docker_args());
        state.next_id += 1;
        let id = format!("new{}", state.next_id);
        state.containers.push(Container {
            id: id.clone(),
            name: spec.name.clone(),
            image_tags: vec![spec.image.canonical()],
            running: true,
        });
        Ok(id)
    }

    fn stop(&self, container: &Container, _timeout: Duration) -> Result<()> {
        self.record(format!("stop {}", container.id));
        if self.failing_stops.contains(&container.id) {
            return Err(anyhow!("cannot stop container {}", container.id));
        }
        if !self.stuck.contains(&container.id) {
            self.state
                .borrow_mut()
                .containers
                .retain(|c| c.id != container.id);
        }
        Ok(())
    }

    fn remove(&self, container: &Container) -> Result<()> {
        self.record(format!("remove {}", container.id));
        self.state
            .borrow_mut()
            .containers
            .retain(|c| c.id != container.id);
        Ok(())
    }

    fn login(&self, credentials: &Credentials, registry: &str) -> Result<bool> {
        self.record(format!("login {}@{registry}", credentials.username));
        Ok(!self.refuse_login)
    }
}

/// Token source returning a fixed token, or always failing.
#[derive(Debug, Default)]
pub struct StaticTokens {
    token: Option<String>,
    requests: RefCell<Vec<String>>,
}

impl StaticTokens {
    pub fn new(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Token for `AWS:secret`.
    pub fn valid() -> Self {
        Self::new("QVdTOnNlY3JldA==")
    }

    pub fn failing() -> Self {
        Self::default()
    }

    /// Registry ids asked for, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl TokenSource for StaticTokens {
    fn authorization_token(&self, registry_id: &str) -> Result<String> {
        self.requests.borrow_mut().push(registry_id.to_string());
        self.token
            .clone()
            .ok_or_else(|| anyhow!("AccessDeniedException: not authorized"))
    }
}

/// Control plane replaying scripted replies. The last reply repeats.
#[derive(Debug)]
pub struct ScriptedOverlord {
    replies: RefCell<VecDeque<Result<Desired, ReconcileError>>>,
    fetches: RefCell<u32>,
}

impl ScriptedOverlord {
    pub fn new(replies: Vec<Result<Desired, ReconcileError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            fetches: RefCell::new(0),
        }
    }

    pub fn always(desired: Desired) -> Self {
        Self::new(vec![Ok(desired)])
    }

    pub fn fetches(&self) -> u32 {
        *self.fetches.borrow()
    }
}

impl DesiredStateClient for ScriptedOverlord {
    fn fetch(&self, _node: &NodeIdentity) -> Result<Desired, ReconcileError> {
        *self.fetches.borrow_mut() += 1;
        let mut replies = self.replies.borrow_mut();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        reply.unwrap_or_else(|| Err(ReconcileError::Transport("no scripted reply".to_string())))
    }
}

/// Sleeper that returns immediately and remembers each requested duration.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}
