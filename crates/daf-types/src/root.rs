//! Repository roots.
//!
//! A root is the location string a repository was opened with. Plain paths
//! and `file://` URIs live in POSIX storage; `mem://name` roots live in the
//! process-local memory storage.
//!
//! Two different spellings can name the same repository (`a/b`, `./a/b/`,
//! `/cwd/a/b`, `file:///cwd/a/b`). [`RootKey`] is the canonical identity used
//! wherever repositories are deduplicated; [`RepoRoot`] keeps the normalized
//! spelling the user gave so that stored configurations read back the way
//! they were written.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::TypeError;

const FILE_SCHEME: &str = "file://";
const MEMORY_SCHEME: &str = "mem://";

/// Which storage backend a root lives in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Posix,
    Memory,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Posix => write!(f, "posix"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// A parsed repository root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepoRoot {
    kind: StorageKind,
    location: String,
}

impl RepoRoot {
    /// Parse a root string.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TypeError::InvalidRoot("root must not be empty".into()));
        }

        if let Some(name) = raw.strip_prefix(MEMORY_SCHEME) {
            let name = name.trim_matches('/');
            if name.is_empty() {
                return Err(TypeError::InvalidRoot(raw.to_string()));
            }
            return Ok(Self {
                kind: StorageKind::Memory,
                location: normalize_segments(name),
            });
        }

        let path = match raw.strip_prefix(FILE_SCHEME) {
            Some(path) => path,
            None => {
                if let Some((scheme, _)) = raw.split_once("://") {
                    return Err(TypeError::UnsupportedScheme {
                        scheme: scheme.to_string(),
                        root: raw.to_string(),
                    });
                }
                raw
            }
        };
        if path.is_empty() {
            return Err(TypeError::InvalidRoot(raw.to_string()));
        }

        Ok(Self {
            kind: StorageKind::Posix,
            location: normalize_path(Path::new(path)),
        })
    }

    /// The storage backend this root lives in.
    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    /// The normalized location, without scheme for POSIX roots.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Join a repository-relative path onto this root, producing the full
    /// location string understood by the root's storage backend.
    pub fn join(&self, relative: &str) -> String {
        let relative = relative.trim_start_matches('/');
        match self.kind {
            StorageKind::Posix => Path::new(&self.location)
                .join(relative)
                .to_string_lossy()
                .into_owned(),
            StorageKind::Memory => format!("{}/{}", self.location, relative),
        }
    }

    /// The canonical identity of this root.
    ///
    /// POSIX roots are made absolute against the current directory and
    /// lexically normalized; symlinks are not resolved.
    pub fn key(&self) -> RootKey {
        match self.kind {
            StorageKind::Posix => {
                let path = Path::new(&self.location);
                posix_key(path, std::path::absolute(path))
            }
            StorageKind::Memory => RootKey(format!("{MEMORY_SCHEME}{}", self.location)),
        }
    }
}

impl fmt::Display for RepoRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StorageKind::Posix => write!(f, "{}", self.location),
            StorageKind::Memory => write!(f, "{MEMORY_SCHEME}{}", self.location),
        }
    }
}

impl std::str::FromStr for RepoRoot {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical identity of a repository root.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootKey(String);

impl RootKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of a POSIX root given the result of making it absolute. When that
/// fails the root is keyed as given, which may not match other spellings.
fn posix_key(path: &Path, absolute: std::io::Result<PathBuf>) -> RootKey {
    let absolute = absolute.unwrap_or_else(|e| {
        warn!(root = %path.display(), error = %e, "cannot make root absolute, keying it as given");
        path.to_path_buf()
    });
    RootKey(format!("{FILE_SCHEME}{}", normalize_path(&absolute)))
}

/// Lexical normalization: drops `.` components and redundant separators and
/// folds `..` into the preceding normal component where one exists.
fn normalize_path(path: &Path) -> String {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    out.pop();
                    depth -= 1;
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            Component::RootDir | Component::Prefix(_) => out.push(component.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        return ".".to_string();
    }
    out.to_string_lossy().into_owned()
}

fn normalize_segments(name: &str) -> String {
    name.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}
