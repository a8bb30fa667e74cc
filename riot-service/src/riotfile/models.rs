// Riotfile Data Models
// The declarative venv tree as written in riotfile.yaml

use serde::Deserialize;

/// Package constraint meaning "whatever pip resolves"
pub const LATEST: &str = "latest";

/// Ordered `key -> alternatives` mapping. Declaration order is kept so that
/// expansion and `list` output are reproducible.
pub type Alternatives = Vec<(String, Vec<String>)>;

/// Root of a riotfile
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Riotfile {
    /// The environment tree
    pub venv: Option<VenvSpec>,
}

/// A node of the environment tree.
///
/// Children inherit every attribute of their parent. `name`, `pys`, `command`
/// and `skip_dev_install` are overridden by the child when set, `pkgs` and
/// `env` are merged with the child's entries taking precedence.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct VenvSpec {
    /// Name of the instances produced from this node
    pub name: Option<String>,

    /// Interpreter hints: a version (`3.9`), an executable name or a path
    #[serde(default, deserialize_with = "deserialize_scalar_list")]
    pub pys: Vec<String>,

    /// Packages to install, each with one or more version constraints
    #[serde(default, deserialize_with = "deserialize_alternatives")]
    pub pkgs: Alternatives,

    /// Environment variables, each with one or more values
    #[serde(default, deserialize_with = "deserialize_alternatives")]
    pub env: Alternatives,

    /// Shell command to run, `{cmdargs}` is replaced by extra CLI arguments
    pub command: Option<String>,

    /// Do not install the project itself into the environment
    pub skip_dev_install: Option<bool>,

    /// Child specs
    #[serde(default)]
    pub venvs: Vec<VenvSpec>,
}

/// Render a YAML scalar the way a user would have typed it
fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Accept a scalar or a list of scalars
fn scalar_list(value: &serde_yaml::Value) -> Result<Vec<String>, String> {
    match value {
        serde_yaml::Value::Sequence(items) => items
            .iter()
            .map(|item| {
                scalar_to_string(item)
                    .ok_or_else(|| "expected a scalar inside the list".to_string())
            })
            .collect(),
        serde_yaml::Value::Tagged(tagged) => scalar_list(&tagged.value),
        other => scalar_to_string(other)
            .map(|s| vec![s])
            .ok_or_else(|| "expected a scalar or a list of scalars".to_string()),
    }
}

fn deserialize_scalar_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    scalar_list(&value).map_err(serde::de::Error::custom)
}

fn deserialize_alternatives<'de, D>(deserializer: D) -> Result<Alternatives, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = serde_yaml::Value::deserialize(deserializer)?;
    let mapping = match value {
        serde_yaml::Value::Null => return Ok(Vec::new()),
        serde_yaml::Value::Mapping(mapping) => mapping,
        _ => return Err(D::Error::custom("expected a mapping of name to value(s)")),
    };

    let mut entries = Vec::with_capacity(mapping.len());
    for (key, value) in &mapping {
        let key = scalar_to_string(key)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| D::Error::custom("mapping keys must be non-empty scalars"))?;
        let mut values = scalar_list(value).map_err(D::Error::custom)?;
        // `name: []` is treated like `name:`
        if values.is_empty() {
            values.push(String::new());
        }
        entries.push((key, values));
    }

    Ok(entries)
}
