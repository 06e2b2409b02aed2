//! Launch configuration: decoding the descriptor's config blob and merging it
//! with the flags the agent always enforces.
//!
//! The blob is YAML using the option names of a container `run` call:
//!
//! ```yaml
//! environment:
//!   MODE: prod
//! ports:
//!   8080/tcp: 80
//!   9000: [9000, {ip: 127.0.0.1, port: 9001}]
//! volumes:
//!   /srv/data:
//!     bind: /data
//!     mode: ro
//! command: ["serve", "--verbose"]
//! ```
//!
//! Decoding is strict. Unknown options, wrong shapes and non-mapping documents
//! are all [`ConfigDecodeError`]s, so a container is never started from a
//! partially understood config.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::core::image_ref::ImageRef;

/// Options the agent always sets itself. User values for these are ignored.
pub const MANDATORY_OPTIONS: [&str; 3] = ["auto_remove", "detach", "name"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid launch config: {reason}")]
pub struct ConfigDecodeError {
    pub reason: String,
}

impl ConfigDecodeError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLaunchConfig {
    environment: Option<Value>,
    ports: Option<Mapping>,
    volumes: Option<Value>,
    command: Option<Value>,
    entrypoint: Option<Value>,
    network: Option<String>,
    network_mode: Option<String>,
    user: Option<Value>,
    working_dir: Option<String>,
    hostname: Option<String>,
    privileged: Option<bool>,
    labels: Option<Value>,
    mem_limit: Option<Value>,
    shm_size: Option<Value>,
    cap_add: Option<Value>,
    dns: Option<Value>,
    extra_hosts: Option<Value>,
    tmpfs: Option<Value>,
    read_only: Option<bool>,
    init: Option<bool>,
    tty: Option<bool>,
    auto_remove: Option<bool>,
    detach: Option<bool>,
    name: Option<String>,
}

/// One published binding: container side plus optional `port` or `ip:[port]`
/// host side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub container: String,
    pub host: Option<String>,
}

impl PortMapping {
    fn publish_arg(&self) -> String {
        match &self.host {
            Some(host) => format!("{host}:{}", self.container),
            None => self.container.clone(),
        }
    }
}

/// Decoded user launch options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchConfig {
    /// `KEY=VALUE` entries (or bare `KEY` to inherit from the daemon env).
    pub environment: Vec<String>,
    pub ports: Vec<PortMapping>,
    /// `host:container[:mode]` bind specs.
    pub volumes: Vec<String>,
    pub command: Vec<String>,
    pub entrypoint: Vec<String>,
    /// Network or network mode to join (`network` and `network_mode` both
    /// land here; setting both is an error).
    pub network: Option<String>,
    pub user: Option<String>,
    pub working_dir: Option<String>,
    pub hostname: Option<String>,
    pub privileged: bool,
    /// `key=value` label entries.
    pub labels: Vec<String>,
    pub mem_limit: Option<String>,
    pub shm_size: Option<String>,
    pub cap_add: Vec<String>,
    pub dns: Vec<String>,
    /// `host:ip` entries.
    pub extra_hosts: Vec<String>,
    /// `path[:options]` mounts.
    pub tmpfs: Vec<String>,
    pub read_only: bool,
    pub init: bool,
    pub tty: bool,
    /// Mandatory options the user tried to set.
    pub overridden: Vec<&'static str>,
}

impl LaunchConfig {
    /// Decode a raw config blob. `None`, blank input and a YAML null are the
    /// empty config.
    pub fn decode(raw: Option<&str>) -> Result<Self, ConfigDecodeError> {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return Ok(Self::default());
        };
        let value: Value = serde_yaml::from_str(raw)
            .map_err(|err| ConfigDecodeError::new(format!("parse yaml: {err}")))?;
        match value {
            Value::Null => Ok(Self::default()),
            Value::Mapping(_) => {
                let raw: RawLaunchConfig = serde_yaml::from_value(value)
                    .map_err(|err| ConfigDecodeError::new(err.to_string()))?;
                Self::from_raw(raw)
            }
            other => Err(ConfigDecodeError::new(format!(
                "config must be a mapping, got {}",
                yaml_kind(&other)
            ))),
        }
    }

    fn from_raw(raw: RawLaunchConfig) -> Result<Self, ConfigDecodeError> {
        let mut overridden = Vec::new();
        if raw.auto_remove.is_some() {
            overridden.push(MANDATORY_OPTIONS[0]);
        }
        if raw.detach.is_some() {
            overridden.push(MANDATORY_OPTIONS[1]);
        }
        if raw.name.is_some() {
            overridden.push(MANDATORY_OPTIONS[2]);
        }
        let network = match (raw.network, raw.network_mode) {
            (Some(_), Some(_)) => {
                return Err(ConfigDecodeError::new(
                    "network and network_mode cannot both be set",
                ));
            }
            (network, mode) => network.or(mode),
        };

        Ok(Self {
            environment: pair_list("environment", raw.environment, '=', false)?,
            ports: decode_ports(raw.ports)?,
            volumes: decode_volumes(raw.volumes)?,
            command: decode_args("command", raw.command)?,
            entrypoint: decode_args("entrypoint", raw.entrypoint)?,
            network,
            user: raw
                .user
                .map(|v| scalar("user", &v))
                .transpose()?,
            working_dir: raw.working_dir,
            hostname: raw.hostname,
            privileged: raw.privileged.unwrap_or(false),
            labels: pair_list("labels", raw.labels, '=', false)?,
            mem_limit: raw
                .mem_limit
                .map(|v| scalar("mem_limit", &v))
                .transpose()?,
            shm_size: raw
                .shm_size
                .map(|v| scalar("shm_size", &v))
                .transpose()?,
            cap_add: string_list("cap_add", raw.cap_add)?,
            dns: string_list("dns", raw.dns)?,
            extra_hosts: pair_list("extra_hosts", raw.extra_hosts, ':', true)?,
            tmpfs: pair_list("tmpfs", raw.tmpfs, ':', false)?,
            read_only: raw.read_only.unwrap_or(false),
            init: raw.init.unwrap_or(false),
            tty: raw.tty.unwrap_or(false),
            overridden,
        })
    }
}

fn yaml_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn scalar(option: &str, value: &Value) -> Result<String, ConfigDecodeError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ConfigDecodeError::new(format!(
            "{option}: expected a scalar, got {}",
            yaml_kind(other)
        ))),
    }
}

/// Mapping `{K: V}` becomes `K<sep>V` (a null value leaves the bare `K`
/// unless `value_required`); a sequence of scalars is taken verbatim.
fn pair_list(
    option: &str,
    value: Option<Value>,
    sep: char,
    value_required: bool,
) -> Result<Vec<String>, ConfigDecodeError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Mapping(map)) => map
            .iter()
            .map(|(k, v)| {
                let key = scalar(option, k)?;
                match v {
                    Value::Null if value_required => Err(ConfigDecodeError::new(format!(
                        "{option}.{key}: missing value"
                    ))),
                    Value::Null => Ok(key),
                    v => Ok(format!("{key}{sep}{}", scalar(option, v)?)),
                }
            })
            .collect(),
        Some(Value::Sequence(items)) => items.iter().map(|item| scalar(option, item)).collect(),
        Some(other) => Err(ConfigDecodeError::new(format!(
            "{option}: expected a mapping or a sequence, got {}",
            yaml_kind(&other)
        ))),
    }
}

/// A single scalar or a sequence of scalars.
fn string_list(option: &str, value: Option<Value>) -> Result<Vec<String>, ConfigDecodeError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items.iter().map(|item| scalar(option, item)).collect(),
        Some(other) => Ok(vec![scalar(option, &other)?]),
    }
}

/// Each container port maps to one binding or a list of bindings. A binding is
/// null (random host port), a host port, or `{ip, port}`.
fn decode_ports(ports: Option<Mapping>) -> Result<Vec<PortMapping>, ConfigDecodeError> {
    let Some(ports) = ports else {
        return Ok(Vec::new());
    };
    let mut mappings = Vec::new();
    for (container, bindings) in &ports {
        let container = scalar("ports", container)?;
        let context = format!("ports.{container}");
        let bindings = match bindings {
            Value::Sequence(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };
        for binding in bindings {
            mappings.push(PortMapping {
                container: container.clone(),
                host: host_binding(&context, binding)?,
            });
        }
    }
    Ok(mappings)
}

fn host_binding(context: &str, binding: &Value) -> Result<Option<String>, ConfigDecodeError> {
    match binding {
        Value::Null => Ok(None),
        Value::Number(_) | Value::String(_) => host_port(context, binding).map(Some),
        Value::Mapping(spec) => {
            if let Some(extra) = spec
                .keys()
                .find(|k| !matches!(k.as_str(), Some("ip") | Some("port")))
            {
                return Err(ConfigDecodeError::new(format!(
                    "{context}: unknown key {extra:?}"
                )));
            }
            let ip = spec
                .get("ip")
                .ok_or_else(|| ConfigDecodeError::new(format!("{context}: missing ip")))
                .and_then(|v| scalar(context, v))?;
            let port = match spec.get("port") {
                None | Some(Value::Null) => String::new(),
                Some(port) => host_port(context, port)?,
            };
            Ok(Some(format!("{ip}:{port}")))
        }
        other => Err(ConfigDecodeError::new(format!(
            "{context}: expected a host port, {{ip, port}}, a list of those or null, got {}",
            yaml_kind(other)
        ))),
    }
}

/// A port number or a `low-high` range.
fn host_port(context: &str, value: &Value) -> Result<String, ConfigDecodeError> {
    let port = scalar(context, value)?;
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let valid = match port.split_once('-') {
        Some((low, high)) => digits(low) && digits(high),
        None => digits(&port),
    };
    if valid {
        Ok(port)
    } else {
        Err(ConfigDecodeError::new(format!(
            "{context}: {port:?} is not a host port"
        )))
    }
}

fn decode_volumes(volumes: Option<Value>) -> Result<Vec<String>, ConfigDecodeError> {
    match volumes {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items.iter().map(|item| scalar("volumes", item)).collect(),
        Some(Value::Mapping(map)) => map
            .iter()
            .map(|(host, bind)| {
                let host = scalar("volumes", host)?;
                match bind {
                    Value::String(target) => Ok(format!("{host}:{target}")),
                    Value::Mapping(spec) => {
                        let target = spec
                            .get("bind")
                            .ok_or_else(|| {
                                ConfigDecodeError::new(format!("volumes.{host}: missing bind"))
                            })
                            .and_then(|v| scalar("volumes", v))?;
                        let mode = match spec.get("mode") {
                            Some(mode) => scalar("volumes", mode)?,
                            None => "rw".to_string(),
                        };
                        if let Some(extra) = spec.keys().find(|k| {
                            !matches!(k.as_str(), Some("bind") | Some("mode"))
                        }) {
                            return Err(ConfigDecodeError::new(format!(
                                "volumes.{host}: unknown key {extra:?}"
                            )));
                        }
                        Ok(format!("{host}:{target}:{mode}"))
                    }
                    other => Err(ConfigDecodeError::new(format!(
                        "volumes.{host}: expected a bind path or {{bind, mode}}, got {}",
                        yaml_kind(other)
                    ))),
                }
            })
            .collect(),
        Some(other) => Err(ConfigDecodeError::new(format!(
            "volumes: expected a mapping or a sequence, got {}",
            yaml_kind(&other)
        ))),
    }
}

/// A string is split with shell quoting rules; a sequence is taken verbatim.
fn decode_args(option: &str, value: Option<Value>) -> Result<Vec<String>, ConfigDecodeError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => shlex::split(&s).ok_or_else(|| {
            ConfigDecodeError::new(format!("{option}: unbalanced quoting in {s:?}"))
        }),
        Some(Value::Sequence(items)) => items.iter().map(|item| scalar(option, item)).collect(),
        Some(other) => Err(ConfigDecodeError::new(format!(
            "{option}: expected a string or a sequence, got {}",
            yaml_kind(&other)
        ))),
    }
}

/// Everything needed to start the managed container.
///
/// The mandatory flags (detached, removed on exit, reserved name) are not
/// fields: they are always emitted, so no user config can turn them off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub image: ImageRef,
    pub name: String,
    pub config: LaunchConfig,
}

impl RunSpec {
    pub fn new(image: ImageRef, config: LaunchConfig, managed_name: &str) -> Self {
        Self {
            image,
            name: managed_name.to_string(),
            config,
        }
    }

    /// Arguments for `docker run`, starting with the subcommand.
    pub fn docker_args(&self) -> Vec<String> {
        let cfg = &self.config;
        let mut args: Vec<String> = vec![
            "run".into(),
            "--detach".into(),
            "--rm".into(),
            "--name".into(),
            self.name.clone(),
        ];
        for env in &cfg.environment {
            args.push("--env".into());
            args.push(env.clone());
        }
        for port in &cfg.ports {
            args.push("--publish".into());
            args.push(port.publish_arg());
        }
        let repeated = [
            ("--volume", &cfg.volumes),
            ("--label", &cfg.labels),
            ("--cap-add", &cfg.cap_add),
            ("--dns", &cfg.dns),
            ("--add-host", &cfg.extra_hosts),
            ("--tmpfs", &cfg.tmpfs),
        ];
        for (flag, values) in repeated {
            for value in values {
                args.push(flag.into());
                args.push(value.clone());
            }
        }
        let optional = [
            ("--network", &cfg.network),
            ("--user", &cfg.user),
            ("--workdir", &cfg.working_dir),
            ("--hostname", &cfg.hostname),
            ("--memory", &cfg.mem_limit),
            ("--shm-size", &cfg.shm_size),
        ];
        for (flag, value) in optional {
            if let Some(value) = value {
                args.push(flag.into());
                args.push(value.clone());
            }
        }
        let switches = [
            ("--privileged", cfg.privileged),
            ("--read-only", cfg.read_only),
            ("--init", cfg.init),
            ("--tty", cfg.tty),
        ];
        for (flag, on) in switches {
            if on {
                args.push(flag.into());
            }
        }
        let mut entrypoint = cfg.entrypoint.iter();
        if let Some(first) = entrypoint.next() {
            args.push("--entrypoint".into());
            args.push(first.clone());
        }
        args.push(self.image.canonical());
        args.extend(entrypoint.cloned());
        args.extend(cfg.command.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ImageRef {
        ImageRef::new("acct.dkr.ecr.region.amazonaws.com/app", "v2").expect("ref")
    }

    #[test]
    fn empty_inputs_decode_to_default() {
        for raw in [None, Some(""), Some("  \n"), Some("~"), Some("null")] {
            assert_eq!(LaunchConfig::decode(raw), Ok(LaunchConfig::default()), "{raw:?}");
        }
    }

    #[test]
    fn decodes_common_options() {
        let raw = r#"
environment:
  MODE: prod
  WORKERS: 4
  INHERITED: ~
ports:
  8080/tcp: 80
  9000: {ip: 127.0.0.1, port: 9001}
  7000: ~
volumes:
  /srv/data:
    bind: /data
    mode: ro
  /srv/logs: /logs
command: serve --verbose
user: 1000
privileged: true
labels:
  team: infra
mem_limit: 512m
"#;
        let cfg = LaunchConfig::decode(Some(raw)).expect("decode");
        assert_eq!(cfg.environment, vec!["MODE=prod", "WORKERS=4", "INHERITED"]);
        assert_eq!(
            cfg.ports,
            vec![
                PortMapping {
                    container: "8080/tcp".to_string(),
                    host: Some("80".to_string())
                },
                PortMapping {
                    container: "9000".to_string(),
                    host: Some("127.0.0.1:9001".to_string())
                },
                PortMapping {
                    container: "7000".to_string(),
                    host: None
                },
            ]
        );
        assert_eq!(cfg.volumes, vec!["/srv/data:/data:ro", "/srv/logs:/logs"]);
        assert_eq!(cfg.command, vec!["serve", "--verbose"]);
        assert_eq!(cfg.user.as_deref(), Some("1000"));
        assert!(cfg.privileged);
        assert_eq!(cfg.labels, vec!["team=infra"]);
        assert_eq!(cfg.mem_limit.as_deref(), Some("512m"));
        assert!(cfg.overridden.is_empty());
    }

    #[test]
    fn list_forms_are_taken_verbatim() {
        let raw = "environment: [\"A=1\", \"B=2\"]\nvolumes: [\"/a:/b:ro\"]\ncommand: [\"sh\", \"-c\", \"echo hi\"]\n";
        let cfg = LaunchConfig::decode(Some(raw)).expect("decode");
        assert_eq!(cfg.environment, vec!["A=1", "B=2"]);
        assert_eq!(cfg.volumes, vec!["/a:/b:ro"]);
        assert_eq!(cfg.command, vec!["sh", "-c", "echo hi"]);
    }

    #[test]
    fn non_mapping_document_is_an_error() {
        for raw in ["- a\n- b\n", "just a string", "42"] {
            let err = LaunchConfig::decode(Some(raw)).unwrap_err();
            assert!(err.reason.contains("must be a mapping"), "{raw}: {err}");
        }
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let err = LaunchConfig::decode(Some("environment: [unclosed")).unwrap_err();
        assert!(err.reason.starts_with("parse yaml"));
    }

    #[test]
    fn unknown_option_is_an_error() {
        let err = LaunchConfig::decode(Some("restart_policy:\n  Name: always\n")).unwrap_err();
        assert!(err.reason.contains("restart_policy"), "{err}");
    }

    #[test]
    fn wrong_shape_is_an_error() {
        assert!(LaunchConfig::decode(Some("environment: 3\n")).is_err());
        assert!(LaunchConfig::decode(Some("ports:\n  80: {a: 1}\n")).is_err());
        assert!(LaunchConfig::decode(Some("volumes:\n  /a: {mode: ro}\n")).is_err());
        assert!(LaunchConfig::decode(Some("volumes:\n  /a: {bind: /b, extra: 1}\n")).is_err());
        assert!(LaunchConfig::decode(Some("environment:\n  A: [1, 2]\n")).is_err());
    }

    #[test]
    fn string_command_is_split_like_a_shell() {
        let raw = "entrypoint: /bin/sh -c\ncommand: \"sh -c 'echo hi'\"\n";
        let cfg = LaunchConfig::decode(Some(raw)).expect("decode");
        assert_eq!(cfg.entrypoint, vec!["/bin/sh", "-c"]);
        assert_eq!(cfg.command, vec!["sh", "-c", "echo hi"]);
    }

    #[test]
    fn unbalanced_quoting_is_an_error() {
        let err = LaunchConfig::decode(Some("command: \"sh -c 'echo hi\"\n")).unwrap_err();
        assert!(err.reason.contains("unbalanced quoting"), "{err}");
    }

    #[test]
    fn port_list_publishes_every_binding() {
        let raw = "ports:\n  80/tcp: [8080, 8081]\n  443: [{ip: 127.0.0.1, port: 8443}, ~]\n  53/udp: {ip: 10.0.0.1}\n";
        let cfg = LaunchConfig::decode(Some(raw)).expect("decode");
        let published: Vec<String> = cfg.ports.iter().map(PortMapping::publish_arg).collect();
        assert_eq!(
            published,
            vec![
                "8080:80/tcp",
                "8081:80/tcp",
                "127.0.0.1:8443:443",
                "443",
                "10.0.0.1::53/udp"
            ]
        );
    }

    #[test]
    fn unclear_port_bindings_are_errors() {
        for raw in [
            "ports:\n  9000: [\"127.0.0.1\", 9001]\n",
            "ports:\n  80: [[8080, 8081]]\n",
            "ports:\n  80: {port: 8080}\n",
            "ports:\n  80: {ip: 127.0.0.1, port: http}\n",
            "ports:\n  80: true\n",
            "ports:\n  80: 8080-\n",
        ] {
            assert!(LaunchConfig::decode(Some(raw)).is_err(), "{raw}");
        }
        let cfg = LaunchConfig::decode(Some("ports:\n  80: 8000-8010\n")).expect("range");
        assert_eq!(cfg.ports[0].publish_arg(), "8000-8010:80");
    }

    #[test]
    fn runtime_options_map_to_run_flags() {
        let raw = r#"
network: backend
cap_add: [NET_ADMIN, SYS_TIME]
dns: 10.0.0.2
extra_hosts:
  db.local: 10.0.0.5
tmpfs:
  /run: ~
  /tmp: size=64m
shm_size: 256m
read_only: true
init: true
tty: true
"#;
        let cfg = LaunchConfig::decode(Some(raw)).expect("decode");
        let args = RunSpec::new(image(), cfg, "app").docker_args();
        assert_eq!(
            args,
            vec![
                "run",
                "--detach",
                "--rm",
                "--name",
                "app",
                "--cap-add",
                "NET_ADMIN",
                "--cap-add",
                "SYS_TIME",
                "--dns",
                "10.0.0.2",
                "--add-host",
                "db.local:10.0.0.5",
                "--tmpfs",
                "/run",
                "--tmpfs",
                "/tmp:size=64m",
                "--network",
                "backend",
                "--shm-size",
                "256m",
                "--read-only",
                "--init",
                "--tty",
                "acct.dkr.ecr.region.amazonaws.com/app:v2"
            ]
        );
    }

    #[test]
    fn network_mode_alone_selects_the_network() {
        let cfg = LaunchConfig::decode(Some("network_mode: host\n")).expect("decode");
        assert_eq!(cfg.network.as_deref(), Some("host"));
    }

    #[test]
    fn conflicting_runtime_options_are_errors() {
        let err = LaunchConfig::decode(Some("network: a\nnetwork_mode: host\n")).unwrap_err();
        assert!(err.reason.contains("network_mode"), "{err}");
        assert!(LaunchConfig::decode(Some("extra_hosts:\n  db.local: ~\n")).is_err());
        assert!(LaunchConfig::decode(Some("cap_add: {NET_ADMIN: 1}\n")).is_err());
        assert!(LaunchConfig::decode(Some("read_only: maybe\n")).is_err());
    }

    #[test]
    fn mandatory_options_are_recorded_and_overridden() {
        let raw = "auto_remove: false\ndetach: false\nname: other\n";
        let cfg = LaunchConfig::decode(Some(raw)).expect("decode");
        assert_eq!(cfg.overridden, vec!["auto_remove", "detach", "name"]);

        let args = RunSpec::new(image(), cfg, "app").docker_args();
        assert_eq!(&args[..5], ["run", "--detach", "--rm", "--name", "app"]);
        assert!(!args.iter().any(|a| a == "other"));
    }

    #[test]
    fn docker_args_for_empty_config() {
        let args = RunSpec::new(image(), LaunchConfig::default(), "app").docker_args();
        assert_eq!(
            args,
            vec![
                "run",
                "--detach",
                "--rm",
                "--name",
                "app",
                "acct.dkr.ecr.region.amazonaws.com/app:v2"
            ]
        );
    }

    #[test]
    fn docker_args_place_entrypoint_and_command_around_image() {
        let raw = "entrypoint: [\"/bin/tini\", \"--\"]\ncommand: [\"serve\"]\nports:\n  80: 8080\nenvironment:\n  A: 1\n";
        let cfg = LaunchConfig::decode(Some(raw)).expect("decode");
        let args = RunSpec::new(image(), cfg, "app").docker_args();
        assert_eq!(
            args,
            vec![
                "run",
                "--detach",
                "--rm",
                "--name",
                "app",
                "--env",
                "A=1",
                "--publish",
                "8080:80",
                "--entrypoint",
                "/bin/tini",
                "acct.dkr.ecr.region.amazonaws.com/app:v2",
                "--",
                "serve"
            ]
        );
    }
}
