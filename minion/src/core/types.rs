//! Shared deterministic types for reconciliation logic.
//!
//! These values are rebuilt every cycle from the control plane and the local
//! container runtime. Only [`NodeIdentity`] lives for the whole process.

use crate::core::image_ref::ImageRef;

/// Identity of the host this agent manages, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub instance_id: String,
    /// Region derived from the availability zone; scopes registry token requests.
    pub region: String,
}

/// What the control plane wants running on this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Desired {
    /// Nothing has been assigned to the node yet. Not an error.
    NotDeployed,
    Deployed(DeploymentTarget),
}

/// A single deployment assignment from the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    pub image: ImageRef,
    pub registry_id: String,
    /// Raw launch config blob (YAML). `None` and empty strings mean "no options".
    pub config: Option<String>,
}

/// An image present on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    pub id: String,
    /// `repository:tag` strings pointing at this image.
    pub tags: Vec<String>,
}

/// A container known to the local runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub name: String,
    /// Tags of the image the container was started from.
    pub image_tags: Vec<String>,
    pub running: bool,
}

/// Resolved local state for one target image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observed {
    pub has_image: bool,
    pub is_running: bool,
}
