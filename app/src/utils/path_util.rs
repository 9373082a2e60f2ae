//! split absolute paths of the emulated filesystem into components
use std::path::{Component, Path};

use smallvec::SmallVec;

use crate::error::{FsError, Result};

pub type Components = SmallVec<[String; 8]>;

/// an absolute path broken into its parent directories and the final name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPath {
    pub parents: Components,
    /// empty only for the root path `/`
    pub leaf: String,
}

impl SplitPath {
    pub fn is_root(&self) -> bool {
        self.parents.is_empty() && self.leaf.is_empty()
    }

    /// every component including the leaf
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.parents
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.leaf.as_str()).filter(|l| !l.is_empty()))
    }
}

/// normalise `path` like a lexical clean and split it
/// # Errors
/// [FsError::InvalidInput] when the path is not absolute
pub fn split_path(path: &str) -> Result<SplitPath> {
    let path = Path::new(path.trim());
    if !path.has_root() {
        return Err(FsError::InvalidInput(format!(
            "path must be absolute: {}",
            path.display()
        )));
    }
    let mut components = Components::new();
    for c in path.components() {
        match c {
            Component::Normal(name) => components.push(name.to_string_lossy().into_owned()),
            Component::ParentDir => {
                components.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    let leaf = components.pop().unwrap_or_default();
    Ok(SplitPath {
        parents: components,
        leaf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_nested_path() {
        let split = split_path("/a/b/c.txt").unwrap();
        assert_eq!(split.parents.as_slice(), ["a", "b"]);
        assert_eq!(split.leaf, "c.txt");
        assert_eq!(split.components().collect::<Vec<_>>(), ["a", "b", "c.txt"]);
    }

    #[test]
    fn test_split_root() {
        let split = split_path("/").unwrap();
        assert!(split.is_root());
        assert_eq!(split.components().count(), 0);
    }

    #[test]
    fn test_split_cleans_dots() {
        let split = split_path("/a/./b/../c/").unwrap();
        assert_eq!(split.parents.as_slice(), ["a"]);
        assert_eq!(split.leaf, "c");
    }

    #[test]
    fn test_relative_path_rejected() {
        assert!(matches!(
            split_path("a/b"),
            Err(FsError::InvalidInput(_))
        ));
    }
}
