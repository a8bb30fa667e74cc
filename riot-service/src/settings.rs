// Settings
// Environment-driven configuration for venv storage and wheel installs

use std::path::PathBuf;

/// Default directory holding all virtual environments
pub const DEFAULT_RIOT_FOLDER: &str = ".riot";

/// Default name prefix of base virtual environments
pub const DEFAULT_VENV_PREFIX: &str = "venv_py";

/// Runtime settings for a riot session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiotSettings {
    /// Where virtual environments, wheels and requirements live
    pub riot_folder: PathBuf,

    /// Prefix of base venv directory names
    pub venv_prefix: String,

    /// Package name used to find the project's wheel (`RIOT_PACKAGE_NAME`)
    pub package_name: Option<String>,

    /// Directory holding the project (editable installs run here)
    pub project_dir: PathBuf,
}

impl Default for RiotSettings {
    fn default() -> Self {
        Self {
            riot_folder: PathBuf::from(DEFAULT_RIOT_FOLDER),
            venv_prefix: DEFAULT_VENV_PREFIX.to_string(),
            package_name: None,
            project_dir: PathBuf::from("."),
        }
    }
}

impl RiotSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            riot_folder: non_empty("RIOT_ENV_BASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.riot_folder),
            venv_prefix: non_empty("RIOT_ENV_PREFIX").unwrap_or(defaults.venv_prefix),
            package_name: non_empty("RIOT_PACKAGE_NAME").map(|v| v.trim().to_string()),
            project_dir: defaults.project_dir,
        }
    }

    pub fn with_riot_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.riot_folder = folder.into();
        self
    }

    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    pub fn with_package_name(mut self, name: impl Into<String>) -> Self {
        self.package_name = Some(name.into());
        self
    }

    /// Directory downloaded wheels are stored in
    pub fn wheel_dir(&self) -> PathBuf {
        self.riot_folder.join("wheels")
    }

    /// Directory compiled requirement files are stored in
    pub fn requirements_dir(&self) -> PathBuf {
        self.riot_folder.join("requirements")
    }
}
