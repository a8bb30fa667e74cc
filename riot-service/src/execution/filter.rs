// Instance Filter
// Selects environment instances by name, venv identifier and Python version

use crate::error::{RiotError, RiotResult};
use crate::execution::instance::EnvironmentInstance;

use regex::Regex;
use std::collections::BTreeSet;

/// Pattern that matches every instance
pub const MATCH_ALL: &str = ".*";

/// Criteria an instance must satisfy to be selected
#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    /// None selects every instance, named or not
    name: Option<Regex>,
    venv: Option<Regex>,
    pythons: BTreeSet<String>,
}

impl InstanceFilter {
    /// Filter on the instance name.
    ///
    /// The pattern must match at the start of the name; a prefix of the
    /// instance's short hash also selects it.
    pub fn new(name_pattern: &str) -> RiotResult<Self> {
        let name = match name_pattern {
            "" | MATCH_ALL => None,
            pattern => Some(compile(pattern, true)?),
        };
        Ok(Self {
            name,
            ..Self::default()
        })
    }

    /// Also require the pattern to occur somewhere in the venv identifier.
    ///
    /// Instances without packages have no identifier and always pass.
    pub fn with_venv_pattern(mut self, pattern: Option<&str>) -> RiotResult<Self> {
        self.venv = match pattern {
            Some(p) if !p.is_empty() => Some(compile(p, false)?),
            _ => None,
        };
        Ok(self)
    }

    /// Restrict to the given interpreter hints (no hints means all)
    pub fn with_pythons<I, S>(mut self, pythons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pythons = pythons.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches(&self, instance: &EnvironmentInstance) -> bool {
        let name_ok = match &self.name {
            None => true,
            Some(re) => {
                instance.name().map(|name| re.is_match(name)).unwrap_or(false)
                    || re.is_match(instance.short_hash())
            }
        };

        let venv_ok = self
            .venv
            .as_ref()
            .map(|re| instance.ident().is_empty() || re.is_match(instance.ident()))
            .unwrap_or(true);

        let python_ok =
            self.pythons.is_empty() || self.pythons.contains(instance.interpreter().hint());

        name_ok && venv_ok && python_ok
    }

    /// Keep the matching instances, preserving order
    pub fn apply<'a>(&self, instances: &'a [EnvironmentInstance]) -> Vec<&'a EnvironmentInstance> {
        instances.iter().filter(|i| self.matches(i)).collect()
    }
}

fn compile(pattern: &str, anchored: bool) -> RiotResult<Regex> {
    let source = if anchored {
        format!("^(?:{})", pattern)
    } else {
        pattern.to_string()
    };

    Regex::new(&source).map_err(|e| RiotError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Interpreter;

    fn instance(name: Option<&str>, py: &str, pkgs: &[(&str, &str)]) -> EnvironmentInstance {
        let pkgs: Vec<(String, String)> = pkgs
            .iter()
            .map(|(n, c)| (n.to_string(), c.to_string()))
            .collect();
        EnvironmentInstance::new(
            name.map(String::from),
            "pytest".to_string(),
            Interpreter::new(py),
            Vec::new(),
            pkgs.clone(),
            pkgs,
            false,
        )
    }

    #[test]
    fn test_default_matches_everything() {
        let filter = InstanceFilter::default();
        assert!(filter.matches(&instance(Some("test"), "3.9", &[])));
        assert!(filter.matches(&instance(None, "3.9", &[])));
    }

    #[test]
    fn test_name_pattern_is_anchored() {
        let filter = InstanceFilter::new("test").unwrap();
        assert!(filter.matches(&instance(Some("test"), "3.9", &[])));
        assert!(filter.matches(&instance(Some("test_integration"), "3.9", &[])));
        assert!(!filter.matches(&instance(Some("unittest"), "3.9", &[])));
        assert!(!filter.matches(&instance(None, "3.9", &[])));
    }

    #[test]
    fn test_short_hash_selects_instance() {
        let target = instance(Some("test"), "3.9", &[("pytest", "==6.2.5")]);
        let other = instance(Some("test"), "3.9", &[("pytest", "==5.4.3")]);
        let filter = InstanceFilter::new(target.short_hash()).unwrap();

        assert!(filter.matches(&target));
        assert!(!filter.matches(&other));
    }

    #[test]
    fn test_venv_pattern_searches_ident() {
        let filter = InstanceFilter::new(MATCH_ALL)
            .unwrap()
            .with_venv_pattern(Some("pytest6"))
            .unwrap();

        assert!(filter.matches(&instance(Some("t"), "3.9", &[("pytest", "==6.2.5")])));
        assert!(!filter.matches(&instance(Some("t"), "3.9", &[("pytest", "==5.4.3")])));
    }

    #[test]
    fn test_venv_pattern_keeps_instances_without_packages() {
        let filter = InstanceFilter::default()
            .with_venv_pattern(Some("pytest6"))
            .unwrap();

        assert!(filter.matches(&instance(Some("lint"), "3.9", &[])));
    }

    #[test]
    fn test_python_filter() {
        let filter = InstanceFilter::default().with_pythons(["3.8"]);
        assert!(filter.matches(&instance(Some("t"), "3.8", &[])));
        assert!(!filter.matches(&instance(Some("t"), "3.9", &[])));
    }

    #[test]
    fn test_apply_preserves_order() {
        let instances = vec![
            instance(Some("lint"), "3.9", &[]),
            instance(Some("test"), "3.8", &[]),
            instance(Some("test"), "3.9", &[]),
        ];
        let selected = InstanceFilter::new("test").unwrap().apply(&instances);

        let pys: Vec<_> = selected.iter().map(|i| i.interpreter().hint()).collect();
        assert_eq!(pys, vec!["3.8", "3.9"]);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = InstanceFilter::new("test[").unwrap_err();
        assert!(matches!(err, RiotError::InvalidPattern { .. }));
    }
}
