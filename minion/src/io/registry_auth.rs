//! Registry auth bridge: token exchange plus runtime login.
//!
//! ECR hands out a base64 `username:password` token per registry id. The
//! production [`TokenSource`] shells out to the `aws` CLI, which already knows
//! how to find instance-role credentials.

use std::fmt;
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::error::ReconcileError;
use crate::io::process::{CommandLimits, run_command_with_timeout};
use crate::io::runtime::ContainerRuntime;

/// Exchanges a registry id for an authorization token.
pub trait TokenSource {
    /// Base64 encoded `username:password`.
    fn authorization_token(&self, registry_id: &str) -> Result<String>;
}

/// Registry login credentials. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Proof that the runtime is logged in to `registry` for this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub registry: String,
    pub username: String,
}

/// Decode a base64 `username:password` token. The password may contain `:`.
pub fn decode_token(token: &str) -> Result<Credentials> {
    let bytes = STANDARD
        .decode(token.trim())
        .context("decode authorization token base64")?;
    let text = String::from_utf8(bytes).context("authorization token is not utf-8")?;
    let (username, password) = text
        .split_once(':')
        .ok_or_else(|| anyhow!("authorization token is not username:password"))?;
    if username.is_empty() {
        return Err(anyhow!("authorization token has an empty username"));
    }
    Ok(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Exchange `registry_id` for credentials and log the runtime in to `registry_host`.
#[instrument(skip_all, fields(registry_id = %registry_id, registry_host = %registry_host))]
pub fn authenticate<T: TokenSource, R: ContainerRuntime>(
    tokens: &T,
    runtime: &R,
    registry_id: &str,
    registry_host: &str,
) -> Result<Session, ReconcileError> {
    let auth_error = |reason: String| ReconcileError::Auth {
        registry: registry_host.to_string(),
        reason,
    };

    let token = tokens
        .authorization_token(registry_id)
        .map_err(|err| auth_error(format!("token exchange: {err:#}")))?;
    let credentials = decode_token(&token).map_err(|err| auth_error(format!("{err:#}")))?;
    let accepted = runtime
        .login(&credentials, registry_host)
        .map_err(|err| auth_error(format!("login: {err:#}")))?;
    if !accepted {
        return Err(auth_error("registry rejected login".to_string()));
    }

    info!(registry = registry_host, "logged in to registry");
    Ok(Session {
        registry: registry_host.to_string(),
        username: credentials.username,
    })
}

/// [`TokenSource`] running `aws ecr get-authorization-token`.
#[derive(Debug, Clone)]
pub struct EcrCliTokenSource {
    bin: String,
    region: String,
    limits: CommandLimits,
}

impl EcrCliTokenSource {
    pub fn new(bin: impl Into<String>, region: impl Into<String>, limits: CommandLimits) -> Self {
        Self {
            bin: bin.into(),
            region: region.into(),
            limits,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthorizationResponse {
    #[serde(rename = "authorizationData")]
    authorization_data: Vec<AuthorizationData>,
}

#[derive(Debug, Deserialize)]
struct AuthorizationData {
    #[serde(rename = "authorizationToken")]
    authorization_token: String,
}

fn parse_authorization_response(stdout: &str) -> Result<String> {
    let response: AuthorizationResponse =
        serde_json::from_str(stdout).context("parse get-authorization-token output")?;
    response
        .authorization_data
        .into_iter()
        .next()
        .map(|data| data.authorization_token)
        .ok_or_else(|| anyhow!("get-authorization-token returned no authorization data"))
}

impl TokenSource for EcrCliTokenSource {
    #[instrument(skip_all, fields(registry_id = %registry_id, region = %self.region))]
    fn authorization_token(&self, registry_id: &str) -> Result<String> {
        let mut cmd = Command::new(&self.bin);
        cmd.args([
            "ecr",
            "get-authorization-token",
            "--registry-ids",
            registry_id,
            "--region",
            self.region.as_str(),
            "--output",
            "json",
        ]);
        let output = run_command_with_timeout(cmd, None, self.limits)
            .context("run aws ecr get-authorization-token")?;
        output.check("aws ecr get-authorization-token")?;
        debug!("received authorization token");
        parse_authorization_response(&output.stdout_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRuntime, StaticTokens};

    fn encode(text: &str) -> String {
        STANDARD.encode(text)
    }

    #[test]
    fn decode_splits_on_first_colon() {
        let creds = decode_token(&encode("AWS:pa:ss")).expect("decode");
        assert_eq!(creds.username, "AWS");
        assert_eq!(creds.password, "pa:ss");
    }

    #[test]
    fn decode_rejects_bad_tokens() {
        assert!(decode_token("%%%not-base64").is_err());
        assert!(decode_token(&encode("no-separator")).is_err());
        assert!(decode_token(&encode(":password")).is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials {
            username: "AWS".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn parses_cli_response() {
        let stdout = r#"{"authorizationData": [{"authorizationToken": "QVdTOnB3", "proxyEndpoint": "https://x"}]}"#;
        assert_eq!(parse_authorization_response(stdout).expect("parse"), "QVdTOnB3");
        assert!(parse_authorization_response(r#"{"authorizationData": []}"#).is_err());
    }

    #[test]
    fn authenticate_logs_in_to_registry_host() {
        let runtime = FakeRuntime::new();
        let tokens = StaticTokens::new(&encode("AWS:secret"));
        let session = authenticate(&tokens, &runtime, "111", "acct.dkr.ecr.region.amazonaws.com")
            .expect("session");
        assert_eq!(session.registry, "acct.dkr.ecr.region.amazonaws.com");
        assert_eq!(session.username, "AWS");
        assert_eq!(
            runtime.mutations(),
            vec!["login AWS@acct.dkr.ecr.region.amazonaws.com".to_string()]
        );
    }

    #[test]
    fn authenticate_fails_on_refused_login() {
        let runtime = FakeRuntime::new().refuse_login();
        let tokens = StaticTokens::new(&encode("AWS:secret"));
        let err = authenticate(&tokens, &runtime, "111", "registry").unwrap_err();
        assert_eq!(err.kind(), "auth");
    }

    #[test]
    fn authenticate_fails_on_token_exchange_error() {
        let runtime = FakeRuntime::new();
        let err = authenticate(&StaticTokens::failing(), &runtime, "111", "registry").unwrap_err();
        assert_eq!(err.kind(), "auth");
        assert!(runtime.mutations().is_empty());
    }

    #[test]
    fn authenticate_fails_on_undecodable_token() {
        let runtime = FakeRuntime::new();
        let err = authenticate(&StaticTokens::new("!!"), &runtime, "111", "registry").unwrap_err();
        assert_eq!(err.kind(), "auth");
        assert!(runtime.mutations().is_empty());
    }
}
