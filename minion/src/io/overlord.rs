//! Desired-state client for the overlord control plane.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use tracing::{debug, instrument};

use crate::core::descriptor::parse_descriptor;
use crate::core::types::{Desired, NodeIdentity};
use crate::error::ReconcileError;

/// Source of the deployment descriptor for a node.
pub trait DesiredStateClient {
    fn fetch(&self, node: &NodeIdentity) -> Result<Desired, ReconcileError>;
}

/// `GET <url>?id=<instance_id>` against the overlord.
#[derive(Debug, Clone)]
pub struct HttpOverlordClient {
    client: Client,
    url: String,
}

impl HttpOverlordClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build overlord http client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl DesiredStateClient for HttpOverlordClient {
    #[instrument(skip_all, fields(node = %node.instance_id))]
    fn fetch(&self, node: &NodeIdentity) -> Result<Desired, ReconcileError> {
        let transport = |what: &str, err: reqwest::Error| {
            ReconcileError::Transport(format!("overlord {what}: {err}"))
        };
        let response = self
            .client
            .get(&self.url)
            .query(&[("id", node.instance_id.as_str())])
            .send()
            .map_err(|err| transport("request", err))?
            .error_for_status()
            .map_err(|err| transport("status", err))?;
        let body = response.text().map_err(|err| transport("body", err))?;
        debug!(bytes = body.len(), "received descriptor");
        parse_descriptor(&body)
    }
}
