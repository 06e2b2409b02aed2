//! Matching the target image against local images and containers.

use crate::core::types::{Container, LocalImage};

/// Whether any local image carries the exact `target` tag.
pub fn image_present(images: &[LocalImage], target: &str) -> bool {
    images
        .iter()
        .any(|image| image.tags.iter().any(|tag| tag == target))
}

/// How the managed containers relate to the target image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningState {
    /// No managed container is running.
    Absent,
    /// Exactly one managed container runs, from a different image.
    Outdated,
    /// Exactly one managed container runs the target image.
    Current,
    /// More than one managed container runs. The single-container invariant is
    /// broken; convergence must replace them all.
    Duplicated { count: usize, any_current: bool },
}

impl RunningState {
    /// Converged only when exactly one managed container runs the target.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Current)
    }
}

/// Running containers whose name is exactly `managed_name`.
pub fn managed<'a>(containers: &'a [Container], managed_name: &str) -> Vec<&'a Container> {
    containers
        .iter()
        .filter(|container| container.running && container.name == managed_name)
        .collect()
}

/// Classify the running managed containers against the `target` tag.
pub fn running_state(containers: &[Container], managed_name: &str, target: &str) -> RunningState {
    let managed = managed(containers, managed_name);
    let is_current = |container: &&Container| container.image_tags.iter().any(|tag| tag == target);
    match managed.len() {
        0 => RunningState::Absent,
        1 if managed.iter().any(is_current) => RunningState::Current,
        1 => RunningState::Outdated,
        count => RunningState::Duplicated {
            count,
            any_current: managed.iter().any(is_current),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "acct.dkr.ecr.region.amazonaws.com/app:v2";

    fn image(tags: &[&str]) -> LocalImage {
        LocalImage {
            id: "sha256:1".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn container(id: &str, name: &str, tags: &[&str]) -> Container {
        Container {
            id: id.to_string(),
            name: name.to_string(),
            image_tags: tags.iter().map(|t| t.to_string()).collect(),
            running: true,
        }
    }

    #[test]
    fn image_present_requires_exact_tag() {
        let images = vec![image(&["acct.dkr.ecr.region.amazonaws.com/app:v1"])];
        assert!(!image_present(&images, TARGET));

        let images = vec![
            image(&["acct.dkr.ecr.region.amazonaws.com/app:v1"]),
            image(&[TARGET, "acct.dkr.ecr.region.amazonaws.com/app:latest"]),
        ];
        assert!(image_present(&images, TARGET));
    }

    #[test]
    fn image_present_is_false_for_fresh_host() {
        assert!(!image_present(&[], TARGET));
    }

    #[test]
    fn image_tag_prefix_does_not_match() {
        let images = vec![image(&["acct.dkr.ecr.region.amazonaws.com/app:v20"])];
        assert!(!image_present(&images, TARGET));
    }

    #[test]
    fn running_state_classifies_single_container() {
        assert_eq!(running_state(&[], "app", TARGET), RunningState::Absent);
        assert_eq!(
            running_state(&[container("a", "app", &[TARGET])], "app", TARGET),
            RunningState::Current
        );
        assert_eq!(
            running_state(
                &[container("a", "app", &["acct.dkr.ecr.region.amazonaws.com/app:v1"])],
                "app",
                TARGET
            ),
            RunningState::Outdated
        );
    }

    #[test]
    fn running_state_ignores_other_names_and_stopped_containers() {
        let mut stopped = container("b", "app", &[TARGET]);
        stopped.running = false;
        let containers = vec![container("a", "myapp", &[TARGET]), stopped];
        assert_eq!(running_state(&containers, "app", TARGET), RunningState::Absent);
    }

    #[test]
    fn duplicated_managed_containers_are_not_converged() {
        let containers = vec![
            container("a", "app", &[TARGET]),
            container("b", "app", &["acct.dkr.ecr.region.amazonaws.com/app:v1"]),
        ];
        let state = running_state(&containers, "app", TARGET);
        assert_eq!(
            state,
            RunningState::Duplicated {
                count: 2,
                any_current: true
            }
        );
        assert!(!state.is_running());
    }
}
