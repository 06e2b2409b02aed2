//! [`ContainerRuntime`] backed by the `docker` CLI.
//!
//! Every call goes through `docker --host <socket>` so the agent talks to the
//! local privileged socket explicitly. Listing uses `--format '{{json .}}'`
//! and `inspect`, whose JSON shapes are stable across CLI versions.

use std::collections::HashMap;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::core::image_ref::ImageRef;
use crate::core::launch::RunSpec;
use crate::core::types::{Container, LocalImage};
use crate::io::process::{CommandLimits, CommandOutput, run_command_with_timeout};
use crate::io::registry_auth::Credentials;
use crate::io::runtime::ContainerRuntime;

/// Tag docker prints for dangling images.
const NO_TAG: &str = "<none>";

#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: String,
    host: String,
    limits: CommandLimits,
}

impl DockerCli {
    pub fn new(bin: impl Into<String>, host: impl Into<String>, limits: CommandLimits) -> Self {
        Self {
            bin: bin.into(),
            host: host.into(),
            limits,
        }
    }

    fn exec(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<CommandOutput> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("--host").arg(&self.host).args(args);
        run_command_with_timeout(cmd, stdin, self.limits)
            .with_context(|| format!("docker {}", args.first().unwrap_or(&"")))
    }

    fn exec_checked(&self, args: &[&str]) -> Result<String> {
        let output = self.exec(args, None)?;
        output.check(&format!("docker {}", args.join(" ")))?;
        Ok(output.stdout_text())
    }

    /// `docker <kind> inspect`, keeping whatever objects were found.
    ///
    /// Docker exits non-zero when any id is gone (auto-removed containers vanish
    /// between listing and inspecting) but still prints the objects it found.
    fn inspect<T: DeserializeOwned>(&self, kind: &str, ids: &[String]) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec![kind, "inspect"];
        args.extend(ids.iter().map(String::as_str));
        let output = self.exec(&args, None)?;
        if output.timed_out {
            return Err(anyhow!("docker {kind} inspect timed out"));
        }
        let stdout = output.stdout_text();
        if stdout.trim().is_empty() {
            output.check(&format!("docker {kind} inspect"))?;
            return Ok(Vec::new());
        }
        serde_json::from_str(&stdout).with_context(|| format!("parse docker {kind} inspect"))
    }
}

#[derive(Debug, Deserialize)]
struct ImageLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Repository")]
    repository: String,
    #[serde(rename = "Tag")]
    tag: String,
}

#[derive(Debug, Deserialize)]
struct ContainerInspect {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "State")]
    state: ContainerState,
}

#[derive(Debug, Deserialize)]
struct ContainerState {
    #[serde(rename = "Running")]
    running: bool,
}

#[derive(Debug, Deserialize)]
struct ImageInspect {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "RepoTags", default)]
    repo_tags: Option<Vec<String>>,
}

/// Group `docker image ls --format '{{json .}}'` lines by image id, in first-seen order.
fn parse_image_lines(stdout: &str) -> Result<Vec<LocalImage>> {
    let mut images: Vec<LocalImage> = Vec::new();
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let parsed: ImageLine =
            serde_json::from_str(line).with_context(|| format!("parse image line {line:?}"))?;
        let tag = (parsed.tag != NO_TAG && parsed.repository != NO_TAG)
            .then(|| format!("{}:{}", parsed.repository, parsed.tag));
        match images.iter_mut().find(|image| image.id == parsed.id) {
            Some(image) => image.tags.extend(tag),
            None => images.push(LocalImage {
                id: parsed.id,
                tags: tag.into_iter().collect(),
            }),
        }
    }
    Ok(images)
}

/// Join inspected containers with their image tags, keeping exact name matches.
fn containers_from_inspect(
    containers: Vec<ContainerInspect>,
    images: Vec<ImageInspect>,
    name: &str,
) -> Vec<Container> {
    let tags: HashMap<String, Vec<String>> = images
        .into_iter()
        .map(|image| (image.id, image.repo_tags.unwrap_or_default()))
        .collect();
    containers
        .into_iter()
        .filter(|c| c.name.trim_start_matches('/') == name)
        .map(|c| Container {
            image_tags: tags.get(&c.image).cloned().unwrap_or_default(),
            name: c.name.trim_start_matches('/').to_string(),
            id: c.id,
            running: c.state.running,
        })
        .collect()
}

impl ContainerRuntime for DockerCli {
    #[instrument(skip_all)]
    fn ping(&self) -> Result<String> {
        let version = self.exec_checked(&["version", "--format", "{{.Server.Version}}"])?;
        let version = version.trim().to_string();
        debug!(version = %version, "docker daemon reachable");
        Ok(version)
    }

    #[instrument(skip_all, fields(repository = %repository))]
    fn list_images(&self, repository: &str) -> Result<Vec<LocalImage>> {
        let stdout = self.exec_checked(&[
            "image",
            "ls",
            "--no-trunc",
            "--format",
            "{{json .}}",
            repository,
        ])?;
        let images = parse_image_lines(&stdout)?;
        debug!(count = images.len(), "listed images");
        Ok(images)
    }

    #[instrument(skip_all, fields(name = %name, all = all))]
    fn list_containers(&self, name: &str, all: bool) -> Result<Vec<Container>> {
        let filter = format!("name={name}");
        let mut args: Vec<&str> = vec![
            "container",
            "ls",
            "--no-trunc",
            "--quiet",
            "--filter",
            filter.as_str(),
        ];
        if all {
            args.push("--all");
        }
        let ids: Vec<String> = self
            .exec_checked(&args)?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();

        let inspected: Vec<ContainerInspect> = self.inspect("container", &ids)?;
        let mut image_ids: Vec<String> = inspected.iter().map(|c| c.image.clone()).collect();
        image_ids.sort();
        image_ids.dedup();
        let images: Vec<ImageInspect> = self.inspect("image", &image_ids)?;

        let containers = containers_from_inspect(inspected, images, name);
        debug!(count = containers.len(), "listed containers");
        Ok(containers)
    }

    #[instrument(skip_all, fields(image = %image))]
    fn pull(&self, image: &ImageRef) -> Result<bool> {
        let reference = image.canonical();
        let output = self.exec(&["pull", &reference], None)?;
        if output.timed_out {
            return Err(anyhow!("docker pull {reference} timed out"));
        }
        if !output.status.success() {
            warn!(stderr = %output.stderr_text(), "docker pull failed");
            return Ok(false);
        }
        Ok(true)
    }

    #[instrument(skip_all, fields(image = %spec.image, name = %spec.name))]
    fn run(&self, spec: &RunSpec) -> Result<String> {
        let args = spec.docker_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = self.exec_checked(&args)?;
        let id = stdout.trim().to_string();
        if id.is_empty() {
            return Err(anyhow!("docker run printed no container id"));
        }
        Ok(id)
    }

    #[instrument(skip_all, fields(container = %container.id))]
    fn stop(&self, container: &Container, timeout: Duration) -> Result<()> {
        let secs = timeout.as_secs().to_string();
        self.exec_checked(&["container", "stop", "--time", &secs, &container.id])?;
        Ok(())
    }

    #[instrument(skip_all, fields(container = %container.id))]
    fn remove(&self, container: &Container) -> Result<()> {
        let output = self.exec(&["container", "rm", &container.id], None)?;
        if !output.success() && output.stderr_text().contains("No such container") {
            debug!("container already removed");
            return Ok(());
        }
        output.check("docker container rm")
    }

    #[instrument(skip_all, fields(registry = %registry, username = %credentials.username))]
    fn login(&self, credentials: &Credentials, registry: &str) -> Result<bool> {
        let output = self.exec(
            &[
                "login",
                "--username",
                &credentials.username,
                "--password-stdin",
                registry,
            ],
            Some(credentials.password.as_bytes()),
        )?;
        if output.timed_out {
            return Err(anyhow!("docker login {registry} timed out"));
        }
        if !output.status.success() {
            warn!(stderr = %output.stderr_text(), "docker login refused");
        }
        Ok(output.status.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPO: &str = "acct.dkr.ecr.region.amazonaws.com/app";

    #[test]
    fn image_lines_group_tags_by_id() {
        let stdout = format!(
            concat!(
                r#"{{"ID":"sha256:aaa","Repository":"{repo}","Tag":"v2","Size":"10MB"}}"#,
                "\n",
                r#"{{"ID":"sha256:bbb","Repository":"{repo}","Tag":"v1"}}"#,
                "\n",
                r#"{{"ID":"sha256:aaa","Repository":"{repo}","Tag":"latest"}}"#,
                "\n",
                r#"{{"ID":"sha256:ccc","Repository":"{repo}","Tag":"<none>"}}"#,
                "\n"
            ),
            repo = REPO
        );
        let images = parse_image_lines(&stdout).expect("parse");
        assert_eq!(
            images,
            vec![
                LocalImage {
                    id: "sha256:aaa".to_string(),
                    tags: vec![format!("{REPO}:v2"), format!("{REPO}:latest")],
                },
                LocalImage {
                    id: "sha256:bbb".to_string(),
                    tags: vec![format!("{REPO}:v1")],
                },
                LocalImage {
                    id: "sha256:ccc".to_string(),
                    tags: Vec::new(),
                },
            ]
        );
    }

    #[test]
    fn empty_listing_is_no_images() {
        assert!(parse_image_lines("").expect("parse").is_empty());
        assert!(parse_image_lines("\n\n").expect("parse").is_empty());
    }

    #[test]
    fn garbage_listing_is_an_error() {
        assert!(parse_image_lines("not json").is_err());
    }

    #[test]
    fn inspect_join_keeps_exact_names_and_tags() {
        let containers: Vec<ContainerInspect> = serde_json::from_str(
            r#"[
                {"Id": "c1", "Name": "/app", "Image": "sha256:aaa", "State": {"Running": true}},
                {"Id": "c2", "Name": "/myapp", "Image": "sha256:aaa", "State": {"Running": true}},
                {"Id": "c3", "Name": "/app", "Image": "sha256:gone", "State": {"Running": false}}
            ]"#,
        )
        .expect("containers");
        let images: Vec<ImageInspect> = serde_json::from_str(&format!(
            r#"[{{"Id": "sha256:aaa", "RepoTags": ["{REPO}:v2"]}}]"#
        ))
        .expect("images");

        let joined = containers_from_inspect(containers, images, "app");
        assert_eq!(
            joined,
            vec![
                Container {
                    id: "c1".to_string(),
                    name: "app".to_string(),
                    image_tags: vec![format!("{REPO}:v2")],
                    running: true,
                },
                Container {
                    id: "c3".to_string(),
                    name: "app".to_string(),
                    image_tags: Vec::new(),
                    running: false,
                },
            ]
        );
    }

    #[test]
    fn image_inspect_tolerates_null_repo_tags() {
        let images: Vec<ImageInspect> =
            serde_json::from_str(r#"[{"Id": "sha256:aaa", "RepoTags": null}]"#).expect("images");
        assert_eq!(images[0].repo_tags, None);
    }
}
