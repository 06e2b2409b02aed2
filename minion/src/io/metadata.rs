//! Node identity from the EC2 instance metadata service.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use tracing::{info, instrument};

use crate::core::types::NodeIdentity;

pub const INSTANCE_ID_PATH: &str = "/latest/meta-data/instance-id";
pub const AVAILABILITY_ZONE_PATH: &str = "/latest/meta-data/placement/availability-zone";

/// Plain-text lookups of this host's cloud identity.
pub trait MetadataProvider {
    fn instance_id(&self) -> Result<String>;
    fn availability_zone(&self) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct Ec2Metadata {
    client: Client,
    base_url: String,
}

impl Ec2Metadata {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build metadata http client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn get_text(&self, path: &str) -> Result<String> {
        let url = format!("{}{path}", self.base_url);
        let text = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?
            .text()
            .with_context(|| format!("read {url}"))?;
        Ok(text.trim().to_string())
    }
}

impl MetadataProvider for Ec2Metadata {
    fn instance_id(&self) -> Result<String> {
        self.get_text(INSTANCE_ID_PATH)
    }

    fn availability_zone(&self) -> Result<String> {
        self.get_text(AVAILABILITY_ZONE_PATH)
    }
}

/// Region of an availability zone: the zone minus its trailing letter
/// (`us-east-1a` -> `us-east-1`).
pub fn region_from_zone(zone: &str) -> Result<String> {
    let zone = zone.trim();
    match zone.chars().last() {
        Some(letter) if letter.is_ascii_lowercase() && zone.len() > 1 => {
            Ok(zone[..zone.len() - 1].to_string())
        }
        _ => Err(anyhow!("unrecognized availability zone {zone:?}")),
    }
}

/// Values pinned in configuration instead of asked from the metadata service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityOverrides {
    pub instance_id: Option<String>,
    pub region: Option<String>,
}

/// Resolve the node identity once at startup. Overrides skip the lookup.
#[instrument(skip_all)]
pub fn resolve_identity<M: MetadataProvider>(
    provider: &M,
    overrides: &IdentityOverrides,
) -> Result<NodeIdentity> {
    let instance_id = match &overrides.instance_id {
        Some(id) => id.clone(),
        None => provider.instance_id().context("look up instance id")?,
    };
    if instance_id.is_empty() {
        return Err(anyhow!("instance id is empty"));
    }
    let region = match &overrides.region {
        Some(region) => region.clone(),
        None => {
            let zone = provider
                .availability_zone()
                .context("look up availability zone")?;
            region_from_zone(&zone)?
        }
    };
    info!(instance_id = %instance_id, region = %region, "resolved node identity");
    Ok(NodeIdentity {
        instance_id,
        region,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FakeMetadata {
        instance_id: &'static str,
        zone: &'static str,
        calls: Cell<u32>,
    }

    impl MetadataProvider for FakeMetadata {
        fn instance_id(&self) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.instance_id.to_string())
        }

        fn availability_zone(&self) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.zone.to_string())
        }
    }

    fn fake(instance_id: &'static str, zone: &'static str) -> FakeMetadata {
        FakeMetadata {
            instance_id,
            zone,
            calls: Cell::new(0),
        }
    }

    #[test]
    fn region_strips_zone_letter() {
        assert_eq!(region_from_zone("us-east-1a").expect("region"), "us-east-1");
        assert_eq!(region_from_zone("eu-west-2c\n").expect("region"), "eu-west-2");
    }

    #[test]
    fn region_rejects_unexpected_zones() {
        assert!(region_from_zone("").is_err());
        assert!(region_from_zone("us-east-1").is_err());
        assert!(region_from_zone("a").is_err());
    }

    #[test]
    fn resolves_from_metadata() {
        let provider = fake("i-0abc", "us-west-2b");
        let node = resolve_identity(&provider, &IdentityOverrides::default()).expect("identity");
        assert_eq!(
            node,
            NodeIdentity {
                instance_id: "i-0abc".to_string(),
                region: "us-west-2".to_string()
            }
        );
        assert_eq!(provider.calls.get(), 2);
    }

    #[test]
    fn overrides_skip_lookups() {
        let provider = fake("i-0abc", "us-west-2b");
        let node = resolve_identity(
            &provider,
            &IdentityOverrides {
                instance_id: Some("i-pinned".to_string()),
                region: Some("ap-south-1".to_string()),
            },
        )
        .expect("identity");
        assert_eq!(node.instance_id, "i-pinned");
        assert_eq!(node.region, "ap-south-1");
        assert_eq!(provider.calls.get(), 0);
    }

    #[test]
    fn empty_instance_id_is_rejected() {
        let provider = fake("", "us-west-2b");
        assert!(resolve_identity(&provider, &IdentityOverrides::default()).is_err());
    }
}
