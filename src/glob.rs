use globset::GlobMatcher;
use serde::{Deserialize, Deserializer};
use std::path::{Component, Path, PathBuf};

const META: &[char] = &['*', '?', '[', ']', '{', '}'];

/// A compiled glob that remembers its source pattern.
#[derive(Debug, Clone)]
pub struct Glob(GlobMatcher);

impl Glob {
    pub fn new(pattern: &str) -> anyhow::Result<Self> {
        Ok(Self(globset::Glob::new(pattern)?.compile_matcher()))
    }

    pub fn is_match(&self, path: impl AsRef<Path>) -> bool {
        self.0.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        self.0.glob().glob()
    }

    /// The leading directories of the pattern that contain no wildcards.
    /// Walking starts here.
    pub fn get_prefix(&self) -> PathBuf {
        let mut prefix = PathBuf::new();
        for component in Path::new(self.as_str()).components() {
            if let Component::Normal(part) = component {
                if part.to_string_lossy().contains(META) {
                    break;
                }
            }
            prefix.push(component);
        }

        if prefix.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            prefix
        }
    }
}

impl<'de> Deserialize<'de> for Glob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let glob = globset::Glob::deserialize(deserializer)?;
        Ok(Self(glob.compile_matcher()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_stops_at_first_wildcard() {
        let glob = Glob::new("assets/icons/**/*.svg").unwrap();
        assert_eq!(glob.get_prefix(), PathBuf::from("assets/icons"));

        let glob = Glob::new("*.svg").unwrap();
        assert_eq!(glob.get_prefix(), PathBuf::from("."));

        let glob = Glob::new("art/logo.svg").unwrap();
        assert_eq!(glob.get_prefix(), PathBuf::from("art/logo.svg"));
    }

    #[test]
    fn matches_nested_files() {
        let glob = Glob::new("assets/**/*.svg").unwrap();
        assert!(glob.is_match("assets/a.svg"));
        assert!(glob.is_match("assets/deep/er/b.svg"));
        assert!(!glob.is_match("assets/a.png"));
        assert!(!glob.is_match("other/a.svg"));
    }
}
