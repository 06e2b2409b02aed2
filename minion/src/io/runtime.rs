//! Container runtime abstraction.
//!
//! The [`ContainerRuntime`] trait decouples the reconciliation engine from the
//! actual runtime backend (the `docker` CLI in production). Tests use a
//! scripted in-memory runtime that records every call.

use std::time::Duration;

use anyhow::Result;

use crate::core::image_ref::ImageRef;
use crate::core::launch::RunSpec;
use crate::core::types::{Container, LocalImage};
use crate::io::registry_auth::Credentials;

pub trait ContainerRuntime {
    /// Check that the runtime daemon answers. Returns its version string.
    fn ping(&self) -> Result<String>;

    /// Images belonging to `repository`. Empty when the repository is absent.
    fn list_images(&self, repository: &str) -> Result<Vec<LocalImage>>;

    /// Containers named exactly `name`; stopped ones only when `all` is set.
    fn list_containers(&self, name: &str, all: bool) -> Result<Vec<Container>>;

    /// Pull an image. `Ok(false)` means the runtime reported a failed pull.
    fn pull(&self, image: &ImageRef) -> Result<bool>;

    /// Start a container and return its id.
    fn run(&self, spec: &RunSpec) -> Result<String>;

    /// Ask a container to stop, escalating to a kill after `timeout`.
    fn stop(&self, container: &Container, timeout: Duration) -> Result<()>;

    fn remove(&self, container: &Container) -> Result<()>;

    /// Log in to `registry`. `Ok(false)` means the registry refused.
    fn login(&self, credentials: &Credentials, registry: &str) -> Result<bool>;
}
