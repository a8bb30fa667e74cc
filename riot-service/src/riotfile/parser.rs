// Riotfile Parser
// Loads riotfile.yaml into a validated venv tree

use crate::riotfile::error::{ConfigError, ConfigErrorKind, ConfigResult};
use crate::riotfile::models::{Riotfile, VenvSpec};

use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up when `--file` is not given
pub const DEFAULT_RIOTFILE: &str = "riotfile.yaml";

/// Alternate spelling tried when the default file is absent
const FALLBACK_RIOTFILE: &str = "riotfile.yml";

/// Riotfile parser
pub struct RiotfileParser;

impl RiotfileParser {
    /// Parse a riotfile from a YAML string
    pub fn parse(content: &str) -> ConfigResult<VenvSpec> {
        if content.trim().is_empty() {
            return Err(missing_root());
        }

        let riotfile: Riotfile =
            serde_yaml::from_str(content).map_err(|e| ConfigError::from_yaml_error(&e, content))?;

        let venv = riotfile.venv.ok_or_else(missing_root)?;
        RiotfileValidator::validate(&venv, "venv")?;
        Ok(venv)
    }

    /// Parse a riotfile from disk
    pub fn parse_file<P: AsRef<Path>>(path: P) -> ConfigResult<VenvSpec> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, &e))?;
        Self::parse(&content)
    }

    /// Resolve which file to load.
    ///
    /// The `.yml` spelling is only tried when the requested path is the
    /// default name, an explicit `--file` is taken as is.
    pub fn discover(requested: &Path) -> Option<PathBuf> {
        if requested.exists() {
            return Some(requested.to_path_buf());
        }

        if requested == Path::new(DEFAULT_RIOTFILE) {
            let fallback = PathBuf::from(FALLBACK_RIOTFILE);
            if fallback.exists() {
                return Some(fallback);
            }
        }

        None
    }
}

fn missing_root() -> ConfigError {
    ConfigError::new(
        "riotfile does not define a top-level 'venv' tree",
        ConfigErrorKind::MissingRoot,
    )
    .with_suggestion("start the file with 'venv:' followed by the environment specification")
}

/// Semantic checks serde cannot express
struct RiotfileValidator;

impl RiotfileValidator {
    fn validate(spec: &VenvSpec, path: &str) -> ConfigResult<()> {
        if let Some(py) = spec.pys.iter().find(|py| py.trim().is_empty()) {
            return Err(invalid(format!(
                "{}.pys contains an empty interpreter hint ({:?})",
                path, py
            )));
        }

        if let Some(name) = &spec.name {
            if name.trim().is_empty() {
                return Err(invalid(format!("{}.name must not be empty", path)));
            }
        }

        if let Some(command) = &spec.command {
            if command.trim().is_empty() {
                return Err(invalid(format!("{}.command must not be empty", path)));
            }
        }

        for (name, _) in &spec.pkgs {
            if name.chars().any(char::is_whitespace) {
                return Err(invalid(format!(
                    "{}.pkgs has an invalid package name '{}'",
                    path, name
                )));
            }
        }

        for (i, child) in spec.venvs.iter().enumerate() {
            Self::validate(child, &format!("{}.venvs[{}]", path, i))?;
        }

        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::new(message, ConfigErrorKind::InvalidValue)
}
