// Matrix Expansion
// Expands the riotfile venv tree into concrete environment instances

use crate::execution::instance::EnvironmentInstance;
use crate::interpreter::Interpreter;
use crate::riotfile::{Alternatives, VenvSpec, LATEST};

use tracing::debug;

/// Attributes accumulated from the root of the tree down to a node
#[derive(Debug, Clone, Default)]
struct Inherited {
    name: Option<String>,
    command: Option<String>,
    py: Option<Interpreter>,
    env: Vec<(String, String)>,
    full_pkgs: Vec<(String, String)>,
    skip_dev_install: bool,
}

/// Matrix expander for venv trees
pub struct MatrixExpander;

impl MatrixExpander {
    /// Expand a venv tree into its runnable instances, in declaration order
    pub fn expand(root: &VenvSpec) -> Vec<EnvironmentInstance> {
        let mut instances = Vec::new();
        Self::expand_node(root, &Inherited::default(), &mut instances);
        instances
    }

    fn expand_node(spec: &VenvSpec, parent: &Inherited, out: &mut Vec<EnvironmentInstance>) {
        let pys: Vec<Option<Interpreter>> = if spec.pys.is_empty() {
            vec![parent.py.clone()]
        } else {
            spec.pys.iter().map(|py| Some(Interpreter::new(py))).collect()
        };

        for env_combo in expand_specs(&spec.env) {
            let mut env = parent.env.clone();
            for (key, value) in env_combo {
                upsert(&mut env, key, value);
            }

            for py in &pys {
                for pkg_combo in expand_specs(&spec.pkgs) {
                    let pkgs: Vec<(String, String)> = pkg_combo
                        .into_iter()
                        .map(|(name, constraint)| (name, normalize_constraint(constraint)))
                        .collect();

                    let mut full_pkgs = parent.full_pkgs.clone();
                    for (name, constraint) in &pkgs {
                        upsert(&mut full_pkgs, name.clone(), constraint.clone());
                    }

                    let node = Inherited {
                        name: spec.name.clone().or_else(|| parent.name.clone()),
                        command: spec.command.clone().or_else(|| parent.command.clone()),
                        py: py.clone(),
                        env: env.clone(),
                        full_pkgs,
                        skip_dev_install: spec.skip_dev_install.unwrap_or(parent.skip_dev_install),
                    };

                    if spec.venvs.is_empty() {
                        Self::emit_leaf(node, pkgs, out);
                    } else {
                        for child in &spec.venvs {
                            Self::expand_node(child, &node, out);
                        }
                    }
                }
            }
        }
    }

    fn emit_leaf(node: Inherited, pkgs: Vec<(String, String)>, out: &mut Vec<EnvironmentInstance>) {
        let (command, py) = match (node.command, node.py) {
            (Some(command), Some(py)) => (command, py),
            (command, py) => {
                debug!(
                    name = ?node.name,
                    has_command = command.is_some(),
                    has_python = py.is_some(),
                    "skipping venv that is not runnable"
                );
                return;
            }
        };

        out.push(EnvironmentInstance::new(
            node.name,
            command,
            py,
            node.env,
            pkgs,
            node.full_pkgs,
            node.skip_dev_install,
        ));
    }
}

/// `latest` and empty constraints both mean "unconstrained"
fn normalize_constraint(constraint: String) -> String {
    if constraint.trim() == LATEST {
        String::new()
    } else {
        constraint.trim().to_string()
    }
}

/// Replace the value of `key`, keeping its original position, or append it
fn upsert(entries: &mut Vec<(String, String)>, key: String, value: String) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

/// Cartesian product of all alternatives.
///
/// `{x: [x0, x1], y: [y0]}` gives `[[(x, x0), (y, y0)], [(x, x1), (y, y0)]]`.
/// No keys give a single empty combination.
pub fn expand_specs(specs: &Alternatives) -> Vec<Vec<(String, String)>> {
    let mut combos: Vec<Vec<(String, String)>> = vec![Vec::new()];
    for (key, values) in specs {
        combos = combos
            .into_iter()
            .flat_map(|prefix| {
                values.iter().map(move |value| {
                    let mut combo = prefix.clone();
                    combo.push((key.clone(), value.clone()));
                    combo
                })
            })
            .collect();
    }
    combos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riotfile::RiotfileParser;

    fn alternatives(items: &[(&str, &[&str])]) -> Alternatives {
        items
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    fn expand(yaml: &str) -> Vec<EnvironmentInstance> {
        MatrixExpander::expand(&RiotfileParser::parse(yaml).unwrap())
    }

    #[test]
    fn test_expand_specs() {
        let specs = alternatives(&[("x", &["x0", "x1"]), ("y", &["y0", "y1"])]);
        let combos = expand_specs(&specs);

        assert_eq!(combos.len(), 4);
        assert_eq!(
            combos[1],
            vec![
                ("x".to_string(), "x0".to_string()),
                ("y".to_string(), "y1".to_string())
            ]
        );
        assert_eq!(
            combos[2],
            vec![
                ("x".to_string(), "x1".to_string()),
                ("y".to_string(), "y0".to_string())
            ]
        );
    }

    #[test]
    fn test_expand_specs_empty() {
        assert_eq!(expand_specs(&Vec::new()), vec![Vec::new()]);
    }

    #[test]
    fn test_two_alternatives_one_python() {
        let instances = expand(
            r#"
venv:
  pys: ["3.9"]
  name: test
  command: pytest
  pkgs:
    pytest: ["==5.4.3", latest]
"#,
        );

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].full_pkg_str(), "'pytest==5.4.3'");
        assert_eq!(instances[1].full_pkg_str(), "'pytest'");
        assert_ne!(instances[0].short_hash(), instances[1].short_hash());
    }

    #[test]
    fn test_cross_product_count() {
        let instances = expand(
            r#"
venv:
  name: test
  command: pytest
  pys: ["3.7", "3.8", "3.9"]
  pkgs:
    pytest: ["==5.4.3", "==6.2.5"]
    mock: [latest, "==4.0.3"]
  env:
    MODE: [fast, slow]
"#,
        );

        assert_eq!(instances.len(), 3 * 2 * 2 * 2);
    }

    #[test]
    fn test_declaration_order() {
        let instances = expand(
            r#"
venv:
  command: pytest
  pkgs:
    pytest: ["==5", "==6"]
  pys: ["3.8", "3.9"]
"#,
        );

        let order: Vec<_> = instances
            .iter()
            .map(|i| format!("{} {}", i.interpreter(), i.full_pkg_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                "3.8 'pytest==5'",
                "3.8 'pytest==6'",
                "3.9 'pytest==5'",
                "3.9 'pytest==6'",
            ]
        );
    }

    #[test]
    fn test_children_inherit_and_override() {
        let instances = expand(
            r#"
venv:
  pys: ["3.9"]
  pkgs:
    attrs: "==20.1"
    six: latest
  env:
    LVL: "1"
  venvs:
    - name: mypy
      command: mypy
      pkgs:
        mypy: "==0.790"
    - name: test
      pys: ["3.7", "3.8"]
      command: pytest
      pkgs:
        attrs: "==21.2"
      env:
        LVL: "2"
"#,
        );

        assert_eq!(instances.len(), 3);

        let mypy = &instances[0];
        assert_eq!(mypy.name(), Some("mypy"));
        assert_eq!(mypy.interpreter().hint(), "3.9");
        assert_eq!(mypy.pkg_str(), "'mypy==0.790'");
        assert_eq!(mypy.full_pkg_str(), "'attrs==20.1' 'six' 'mypy==0.790'");

        let test = &instances[1];
        assert_eq!(test.interpreter().hint(), "3.7");
        // overridden packages keep the parent's position
        assert_eq!(test.full_pkg_str(), "'attrs==21.2' 'six'");
        assert_eq!(test.env(), &[("LVL".to_string(), "2".to_string())]);
        assert_eq!(instances[2].interpreter().hint(), "3.8");
    }

    #[test]
    fn test_name_and_command_inherited() {
        let instances = expand(
            r#"
venv:
  name: parent
  command: "pytest {cmdargs}"
  venvs:
    - pys: ["3"]
      pkgs:
        pytest: ["==5.4.3", ""]
"#,
        );

        assert_eq!(instances.len(), 2);
        assert!(instances.iter().all(|i| i.name() == Some("parent")));
        assert!(instances.iter().all(|i| i.command() == "pytest {cmdargs}"));
    }

    #[test]
    fn test_non_runnable_leaves_are_dropped() {
        let instances = expand(
            r#"
venv:
  venvs:
    - name: no-python
      command: pytest
    - name: no-command
      pys: ["3.9"]
    - name: ok
      pys: ["3.9"]
      command: pytest
"#,
        );

        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].name(), Some("ok"));
    }

    #[test]
    fn test_skip_dev_install_inherited() {
        let instances = expand(
            r#"
venv:
  skip_dev_install: true
  pys: ["3.9"]
  command: flake8
  venvs:
    - name: a
    - name: b
      skip_dev_install: false
"#,
        );

        assert!(instances[0].skip_dev_install());
        assert!(!instances[1].skip_dev_install());
    }

    #[test]
    fn test_expansion_is_deterministic() {
        let yaml = r#"
venv:
  pys: ["3.8", "3.9"]
  command: pytest
  pkgs:
    pytest: ["==5.4.3", latest]
"#;
        let first: Vec<_> = expand(yaml).iter().map(|i| i.long_hash().to_string()).collect();
        let second: Vec<_> = expand(yaml).iter().map(|i| i.long_hash().to_string()).collect();
        assert_eq!(first, second);
    }
}
