//! Configuration lookup by requested path name

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{PathError, Result};

use super::path::{validate_path_name, PathConf, ALL_OTHERS};

/// Full set of path configurations, keyed by configuration name
///
/// Ordered so that pattern matching is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathConfs {
    confs: BTreeMap<String, Arc<PathConf>>,
}

/// A configuration resolved for a requested name
#[derive(Debug, Clone)]
pub struct FoundConf {
    pub conf: Arc<PathConf>,
    /// Full match followed by capture groups (empty for fixed names)
    pub matches: Vec<String>,
}

impl PathConfs {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration, replacing any with the same name
    pub fn insert(&mut self, conf: PathConf) -> Option<Arc<PathConf>> {
        self.confs.insert(conf.name.clone(), Arc::new(conf))
    }

    /// Builder-style insert
    pub fn with(mut self, conf: PathConf) -> Self {
        self.insert(conf);
        self
    }

    /// Remove a configuration by name
    pub fn remove(&mut self, name: &str) -> Option<Arc<PathConf>> {
        self.confs.remove(name)
    }

    /// Get a configuration by its own name
    pub fn get(&self, name: &str) -> Option<&Arc<PathConf>> {
        self.confs.get(name)
    }

    pub fn len(&self) -> usize {
        self.confs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.confs.is_empty()
    }

    /// Iterate in configuration name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<PathConf>)> {
        self.confs.iter()
    }

    /// Resolve the configuration governing a requested path name
    ///
    /// Fixed names win over patterns. Patterns are tried in name order and
    /// `all_others` is tried last.
    pub fn find(&self, name: &str) -> Result<FoundConf> {
        validate_path_name(name)?;

        if let Some(conf) = self.confs.get(name) {
            if conf.regexp.is_none() {
                return Ok(FoundConf {
                    conf: Arc::clone(conf),
                    matches: Vec::new(),
                });
            }
        }

        let patterns = self
            .confs
            .iter()
            .filter(|(conf_name, _)| conf_name.as_str() != ALL_OTHERS)
            .chain(self.confs.get_key_value(ALL_OTHERS));

        for (_, conf) in patterns {
            if let Some(pattern) = &conf.regexp {
                if let Some(matches) = pattern.captures(name) {
                    return Ok(FoundConf {
                        conf: Arc::clone(conf),
                        matches,
                    });
                }
            }
        }

        Err(PathError::NotFound(name.to_string()))
    }
}

impl FromIterator<PathConf> for PathConfs {
    fn from_iter<I: IntoIterator<Item = PathConf>>(iter: I) -> Self {
        let mut confs = PathConfs::new();
        for conf in iter {
            confs.insert(conf);
        }
        confs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confs() -> PathConfs {
        [
            PathConf::new("cam1").unwrap(),
            PathConf::new("~^cam(\\d+)$").unwrap(),
            PathConf::new("~^live/(.+)$").unwrap(),
            PathConf::new(ALL_OTHERS).unwrap(),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_exact_match_wins() {
        let found = confs().find("cam1").unwrap();
        assert_eq!(found.conf.name, "cam1");
        assert!(found.matches.is_empty());
    }

    #[test]
    fn test_pattern_match_captures() {
        let found = confs().find("cam7").unwrap();
        assert_eq!(found.conf.name, "~^cam(\\d+)$");
        assert_eq!(found.matches, vec!["cam7", "7"]);

        let found = confs().find("live/stage").unwrap();
        assert_eq!(found.matches[1], "stage");
    }

    #[test]
    fn test_all_others_is_last_resort() {
        let found = confs().find("anything").unwrap();
        assert_eq!(found.conf.name, ALL_OTHERS);
    }

    #[test]
    fn test_not_found() {
        let confs: PathConfs = [PathConf::new("cam1").unwrap()].into_iter().collect();
        assert_eq!(
            confs.find("cam2").unwrap_err(),
            PathError::NotFound("cam2".into())
        );
    }

    #[test]
    fn test_invalid_name() {
        assert!(matches!(
            confs().find("/cam1"),
            Err(PathError::InvalidName { .. })
        ));
    }
}
