//! Parsing of the control plane's deployment descriptor.
//!
//! Wire shape (the `deployed` key may appear twice; the last one wins):
//!
//! ```json
//! {
//!   "deployed": true,
//!   "details": [{"repositoryUri": "acct.dkr.ecr.region.amazonaws.com/app", "registryId": "111"}],
//!   "deployed": {"image_tag": "v2", "config": "environment:\n  MODE: prod\n"}
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::core::image_ref::ImageRef;
use crate::core::types::{DeploymentTarget, Desired};
use crate::error::ReconcileError;

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    deployed: Value,
    #[serde(default)]
    details: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawDetail {
    #[serde(rename = "repositoryUri")]
    repository_uri: String,
    #[serde(rename = "registryId")]
    registry_id: String,
}

#[derive(Debug, Deserialize)]
struct RawDeployed {
    image_tag: String,
    #[serde(default)]
    config: Option<String>,
}

/// Parse a descriptor body into the desired state for this node.
///
/// A body that is not JSON is a transport problem. A body that is JSON but
/// does not name exactly one deployment target is [`ReconcileError::AmbiguousDeployment`].
pub fn parse_descriptor(body: &str) -> Result<Desired, ReconcileError> {
    // Parse into a map first so a repeated `deployed` key resolves to its last value.
    let value: Value = serde_json::from_str(body)
        .map_err(|err| ReconcileError::Transport(format!("parse descriptor json: {err}")))?;
    if !value.is_object() {
        return Err(ReconcileError::AmbiguousDeployment(
            "descriptor is not a json object".to_string(),
        ));
    }
    let raw: RawDescriptor = serde_json::from_value(value)
        .map_err(|err| ReconcileError::AmbiguousDeployment(format!("descriptor shape: {err}")))?;

    if !is_truthy(&raw.deployed) {
        return Ok(Desired::NotDeployed);
    }

    if raw.details.len() != 1 {
        return Err(ReconcileError::AmbiguousDeployment(format!(
            "expected exactly one repository detail, got {}",
            raw.details.len()
        )));
    }
    let detail: RawDetail = serde_json::from_value(raw.details[0].clone())
        .map_err(|err| ReconcileError::AmbiguousDeployment(format!("repository detail: {err}")))?;

    if !raw.deployed.is_object() {
        return Err(ReconcileError::AmbiguousDeployment(
            "deployed block is missing image_tag".to_string(),
        ));
    }
    let deployed: RawDeployed = serde_json::from_value(raw.deployed)
        .map_err(|err| ReconcileError::AmbiguousDeployment(format!("deployed block: {err}")))?;

    let image = ImageRef::new(detail.repository_uri, deployed.image_tag)
        .map_err(|err| ReconcileError::AmbiguousDeployment(err.to_string()))?;
    if detail.registry_id.trim().is_empty() {
        return Err(ReconcileError::AmbiguousDeployment(
            "registryId is empty".to_string(),
        ));
    }

    Ok(Desired::Deployed(DeploymentTarget {
        image,
        registry_id: detail.registry_id,
        config: deployed.config,
    }))
}

/// Truthiness the control plane relies on: `null`, `false`, `0`, `""`, `[]`
/// and `{}` all mean "nothing deployed".
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPO: &str = "acct.dkr.ecr.region.amazonaws.com/app";

    fn deployed_body(details: &str, deployed: &str) -> String {
        format!(r#"{{"deployed": true, "details": {details}, "deployed": {deployed}}}"#)
    }

    #[test]
    fn missing_or_false_deployed_is_not_deployed() {
        for body in [
            r#"{}"#,
            r#"{"deployed": false, "details": []}"#,
            r#"{"deployed": null}"#,
            r#"{"deployed": {}}"#,
        ] {
            assert_eq!(parse_descriptor(body), Ok(Desired::NotDeployed), "{body}");
        }
    }

    #[test]
    fn last_deployed_key_wins() {
        let body = deployed_body(
            &format!(r#"[{{"repositoryUri": "{REPO}", "registryId": "111"}}]"#),
            r#"{"image_tag": "v2", "config": ""}"#,
        );
        let Desired::Deployed(target) = parse_descriptor(&body).expect("parse") else {
            panic!("expected deployment");
        };
        assert_eq!(target.image.canonical(), format!("{REPO}:v2"));
        assert_eq!(target.registry_id, "111");
        assert_eq!(target.config.as_deref(), Some(""));
    }

    #[test]
    fn config_may_be_absent_or_null() {
        let details = format!(r#"[{{"repositoryUri": "{REPO}", "registryId": "111"}}]"#);
        for deployed in [r#"{"image_tag": "v2"}"#, r#"{"image_tag": "v2", "config": null}"#] {
            let Desired::Deployed(target) =
                parse_descriptor(&deployed_body(&details, deployed)).expect("parse")
            else {
                panic!("expected deployment");
            };
            assert_eq!(target.config, None);
        }
    }

    #[test]
    fn zero_or_many_details_is_ambiguous() {
        let one = format!(r#"{{"repositoryUri": "{REPO}", "registryId": "111"}}"#);
        for details in ["[]".to_string(), format!("[{one}, {one}]")] {
            let err = parse_descriptor(&deployed_body(&details, r#"{"image_tag": "v2"}"#))
                .unwrap_err();
            assert_eq!(err.kind(), "ambiguous_deployment", "{details}");
        }
    }

    #[test]
    fn deployed_true_without_block_is_ambiguous() {
        let body = format!(
            r#"{{"deployed": true, "details": [{{"repositoryUri": "{REPO}", "registryId": "111"}}]}}"#
        );
        let err = parse_descriptor(&body).unwrap_err();
        assert!(err.to_string().contains("missing image_tag"));
    }

    #[test]
    fn incomplete_detail_is_ambiguous() {
        let body = deployed_body(
            &format!(r#"[{{"repositoryUri": "{REPO}"}}]"#),
            r#"{"image_tag": "v2"}"#,
        );
        let err = parse_descriptor(&body).unwrap_err();
        assert_eq!(err.kind(), "ambiguous_deployment");
    }

    #[test]
    fn malformed_tag_is_ambiguous() {
        let body = deployed_body(
            &format!(r#"[{{"repositoryUri": "{REPO}", "registryId": "111"}}]"#),
            r#"{"image_tag": "v2 "}"#,
        );
        let err = parse_descriptor(&body).unwrap_err();
        assert_eq!(err.kind(), "ambiguous_deployment");
    }

    #[test]
    fn non_json_is_transport() {
        let err = parse_descriptor("<html>bad gateway</html>").unwrap_err();
        assert_eq!(err.kind(), "transport");
    }
}
