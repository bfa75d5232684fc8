//! paths relative to the configuration root
//!
//! A [ProjectPath] always starts with `/`, where `/` is the configuration root (not the host filesystem root).
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct ProjectPath(String);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path {0:?} escapes the configuration root")]
    EscapesRoot(String),
    #[error("path {host:?} is not inside the configuration root {root:?}")]
    OutsideRoot { host: PathBuf, root: PathBuf },
}

impl ProjectPath {
    pub fn root() -> Self {
        Self("/".to_owned())
    }

    /// Creates a project path from its textual form, lexically cleaning it up
    ///
    /// Fails if `..` elements walk above the root.
    pub fn new(path: &str) -> Result<Self, PathError> {
        let mut elements: Vec<&str> = Vec::new();
        for element in path.split('/') {
            match element {
                "" | "." => {}
                ".." => {
                    if elements.pop().is_none() {
                        return Err(PathError::EscapesRoot(path.to_owned()));
                    }
                }
                element => elements.push(element),
            }
        }

        Ok(Self(format!("/{}", elements.join("/"))))
    }

    /// Maps a host path below `root` into a project path
    pub fn from_host(root: &Path, host: &Path) -> Result<Self, PathError> {
        let relative = host
            .strip_prefix(root)
            .map_err(|_| PathError::OutsideRoot {
                host: host.to_owned(),
                root: root.to_owned(),
            })?;

        let mut elements = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(element) => elements.push(element.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => {
                    return Err(PathError::OutsideRoot {
                        host: host.to_owned(),
                        root: root.to_owned(),
                    })
                }
            }
        }

        Self::new(&elements.join("/"))
    }

    pub fn to_host(&self, root: &Path) -> PathBuf {
        let mut host = root.to_owned();
        for element in self.elements() {
            host.push(element);
        }
        host
    }

    /// Resolves `other` against this path
    ///
    /// Absolute inputs (starting with `/`) are resolved against the root instead.
    pub fn join(&self, other: &str) -> Result<Self, PathError> {
        if other.starts_with('/') {
            return Self::new(other);
        }

        Self::new(&format!("{}/{}", self.0, other))
    }

    /// Parent directory, the root is its own parent
    pub fn dir(&self) -> Self {
        match self.0.rfind('/') {
            Some(0) | None => Self::root(),
            Some(idx) => Self(self.0[..idx].to_owned()),
        }
    }

    /// Last element, empty for the root
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// True if `self` is `other` or one of the directories above it
    pub fn is_ancestor_of(&self, other: &ProjectPath) -> bool {
        if self.is_root() || self == other {
            return true;
        }

        other
            .0
            .strip_prefix(&self.0)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn elements(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|element| !element.is_empty())
    }
}

impl std::fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
