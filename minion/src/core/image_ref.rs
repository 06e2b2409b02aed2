//! Image references and their canonical `repository:tag` form.

use std::fmt;

use thiserror::Error;

/// Reason an image reference was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidImageRef {
    #[error("repository uri is empty")]
    EmptyRepository,
    #[error("image tag is empty")]
    EmptyTag,
    #[error("repository uri {0:?} contains whitespace")]
    RepositoryWhitespace(String),
    #[error("image tag {0:?} must not contain whitespace, ':' or '/'")]
    BadTag(String),
}

/// A repository plus tag.
///
/// The canonical `repository_uri:tag` string is the only identity used when
/// comparing against local images and running containers. No normalization is
/// applied: a reference built from the descriptor is compared byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    repository_uri: String,
    tag: String,
}

impl ImageRef {
    pub fn new(
        repository_uri: impl Into<String>,
        tag: impl Into<String>,
    ) -> Result<Self, InvalidImageRef> {
        let repository_uri = repository_uri.into();
        let tag = tag.into();
        if repository_uri.is_empty() {
            return Err(InvalidImageRef::EmptyRepository);
        }
        if tag.is_empty() {
            return Err(InvalidImageRef::EmptyTag);
        }
        if repository_uri.chars().any(char::is_whitespace) {
            return Err(InvalidImageRef::RepositoryWhitespace(repository_uri));
        }
        if tag
            .chars()
            .any(|c| c.is_whitespace() || c == ':' || c == '/')
        {
            return Err(InvalidImageRef::BadTag(tag));
        }
        Ok(Self {
            repository_uri,
            tag,
        })
    }

    pub fn repository_uri(&self) -> &str {
        &self.repository_uri
    }

    /// `repository_uri:tag`.
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.repository_uri, self.tag)
    }

    /// Registry host: everything before the first `/` of the repository uri.
    ///
    /// A repository without a `/` is its own host.
    pub fn registry_host(&self) -> &str {
        self.repository_uri
            .split('/')
            .next()
            .unwrap_or(&self.repository_uri)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository_uri, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_joins_repository_and_tag() {
        let image = ImageRef::new("acct.dkr.ecr.us-east-1.amazonaws.com/app", "v2").expect("ref");
        assert_eq!(
            image.canonical(),
            "acct.dkr.ecr.us-east-1.amazonaws.com/app:v2"
        );
        assert_eq!(image.to_string(), image.canonical());
    }

    #[test]
    fn registry_host_is_leading_segment() {
        let image = ImageRef::new("acct.dkr.ecr.us-east-1.amazonaws.com/team/app", "v2")
            .expect("ref");
        assert_eq!(image.registry_host(), "acct.dkr.ecr.us-east-1.amazonaws.com");

        let bare = ImageRef::new("localhost:5000", "v1").expect("ref");
        assert_eq!(bare.registry_host(), "localhost:5000");
    }

    #[test]
    fn rejects_empty_parts() {
        assert_eq!(ImageRef::new("", "v1"), Err(InvalidImageRef::EmptyRepository));
        assert_eq!(ImageRef::new("repo/app", ""), Err(InvalidImageRef::EmptyTag));
    }

    #[test]
    fn rejects_tags_that_would_change_the_canonical_form() {
        assert!(matches!(
            ImageRef::new("repo/app", "v2\n"),
            Err(InvalidImageRef::BadTag(_))
        ));
        assert!(matches!(
            ImageRef::new("repo/app", "v2:extra"),
            Err(InvalidImageRef::BadTag(_))
        ));
        assert!(matches!(
            ImageRef::new("repo/app ", "v2"),
            Err(InvalidImageRef::RepositoryWhitespace(_))
        ));
    }

    #[test]
    fn case_is_preserved() {
        let image = ImageRef::new("Repo/App", "V2").expect("ref");
        assert_eq!(image.canonical(), "Repo/App:V2");
    }
}
