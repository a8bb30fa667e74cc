// Wheel Source
// Installs the project from a pre-built wheel instead of an editable install

use crate::error::{RiotError, RiotResult};
use crate::runners::CommandRunner;
use crate::settings::RiotSettings;
use crate::venv::VirtualEnv;

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Where the project wheel comes from, and which package it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelSource {
    location: String,
    package: String,
}

impl WheelSource {
    pub fn new(location: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            package: package.into(),
        }
    }

    /// Wheel source at `location` for the project described by `settings`
    pub fn resolve(location: impl Into<String>, settings: &RiotSettings) -> RiotResult<Self> {
        Ok(Self::new(location, package_name(settings)?))
    }

    /// Path or URL searched for wheels
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Download the project wheel into `dest` and return the file.
    ///
    /// Only `location` is consulted, never a package index. A failed
    /// download or a missing wheel afterwards is [`RiotError::WheelNotFound`].
    pub async fn fetch(
        &self,
        venv: &VirtualEnv,
        dest: &Path,
        runner: &dyn CommandRunner,
    ) -> RiotResult<PathBuf> {
        tokio::fs::create_dir_all(dest).await?;

        let invocation = venv
            .pip("download")
            .args(["--no-index", "--no-deps", "--only-binary=:all:", "--find-links"])
            .arg(self.location.clone())
            .arg("--dest")
            .arg(dest.to_string_lossy())
            .arg(self.package.clone());
        debug!(command = %invocation.display(), "downloading wheel");

        let output = runner.output(&invocation).await;
        if output.interrupted {
            return Err(RiotError::Interrupted(invocation.display()));
        }
        if !output.success() {
            return Err(self.not_found(Some(output.combined())));
        }

        let wheel = find_wheel(dest, &self.package).ok_or_else(|| self.not_found(None))?;
        info!(wheel = ?wheel, source = %self.location, "found wheel");
        Ok(wheel)
    }

    /// Download the wheel and install it into `venv`.
    ///
    /// Each download lands in a fresh directory under `wheel_dir` that is
    /// removed afterwards, so wheels left by earlier runs are never picked.
    pub async fn install(
        &self,
        venv: &VirtualEnv,
        wheel_dir: &Path,
        runner: &dyn CommandRunner,
    ) -> RiotResult<()> {
        tokio::fs::create_dir_all(wheel_dir).await?;
        let download = tempfile::Builder::new()
            .prefix("download-")
            .tempdir_in(wheel_dir)?;

        let wheel = self.fetch(venv, download.path(), runner).await?;
        venv.install_wheel(&wheel, runner).await
    }

    fn not_found(&self, detail: Option<String>) -> RiotError {
        RiotError::WheelNotFound {
            package: self.package.clone(),
            source_path: self.location.clone(),
            detail,
        }
    }
}

/// Name of the project package.
///
/// `RIOT_PACKAGE_NAME` wins; otherwise the name is read from
/// `pyproject.toml`, `setup.cfg` or `setup.py` in the project directory.
pub fn package_name(settings: &RiotSettings) -> RiotResult<String> {
    if let Some(name) = &settings.package_name {
        return Ok(name.clone());
    }

    let dir = &settings.project_dir;
    let read = |file: &str| std::fs::read_to_string(dir.join(file)).ok();

    read("pyproject.toml")
        .and_then(|s| name_from_pyproject(&s))
        .or_else(|| read("setup.cfg").and_then(|s| name_from_setup_cfg(&s)))
        .or_else(|| read("setup.py").and_then(|s| name_from_setup_py(&s)))
        .ok_or(RiotError::PackageName)
}

fn name_from_pyproject(source: &str) -> Option<String> {
    let value: toml::Value = toml::from_str(source).ok()?;
    value
        .get("project")?
        .get("name")?
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn name_from_setup_cfg(source: &str) -> Option<String> {
    let mut in_metadata = false;
    for line in source.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_metadata = line == "[metadata]";
            continue;
        }
        if !in_metadata {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "name" && !value.trim().is_empty() {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

fn name_from_setup_py(source: &str) -> Option<String> {
    static NAME: OnceLock<Option<Regex>> = OnceLock::new();
    let re = NAME
        .get_or_init(|| Regex::new(r#"\bname\s*=\s*['"]([^'"]+)['"]"#).ok())
        .as_ref()?;
    re.captures(source).map(|c| c[1].to_string())
}

/// Normalised distribution name as used in wheel file names
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_sep = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !last_sep {
                out.push('_');
            }
            last_sep = true;
        } else {
            out.extend(c.to_lowercase());
            last_sep = false;
        }
    }
    out
}

/// Wheel of `package` in `dir`, the highest file name when there are several
fn find_wheel(dir: &Path, package: &str) -> Option<PathBuf> {
    let wanted = normalize_name(package);
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            file_name.ends_with(".whl")
                && file_name
                    .split_once('-')
                    .map(|(dist, _)| normalize_name(dist) == wanted)
                    .unwrap_or(false)
        })
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runners::recording::{failed, RecordingRunner};
    use crate::runners::Invocation;

    fn settings(dir: &Path) -> RiotSettings {
        RiotSettings::default().with_project_dir(dir)
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("My.Package"), "my_package");
        assert_eq!(normalize_name("ddtrace"), "ddtrace");
        assert_eq!(normalize_name("foo--bar_.baz"), "foo_bar_baz");
    }

    #[test]
    fn test_package_name_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("setup.py"), "setup(name='other')").unwrap();
        let settings = settings(dir.path()).with_package_name("override");

        assert_eq!(package_name(&settings).unwrap(), "override");
    }

    #[test]
    fn test_package_name_from_pyproject() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pyproject.toml"),
            "[build-system]\nrequires = [\"setuptools\"]\n\n[project]\nname = \"riot-demo\"\n",
        )
        .unwrap();

        assert_eq!(package_name(&settings(dir.path())).unwrap(), "riot-demo");
    }

    #[test]
    fn test_package_name_falls_through_pyproject_without_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pyproject.toml"), "[tool.black]\nline-length = 120\n").unwrap();
        std::fs::write(
            dir.path().join("setup.cfg"),
            "[options]\nname = wrong\n\n[metadata]\nname = from-cfg\nversion = 1.0\n",
        )
        .unwrap();

        assert_eq!(package_name(&settings(dir.path())).unwrap(), "from-cfg");
    }

    #[test]
    fn test_package_name_from_setup_py() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("setup.py"),
            "from setuptools import setup\n\nsetup(\n    name=\"ddtrace\",\n    version=\"1.0\",\n)\n",
        )
        .unwrap();

        assert_eq!(package_name(&settings(dir.path())).unwrap(), "ddtrace");
    }

    #[test]
    fn test_package_name_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = package_name(&settings(dir.path())).unwrap_err();
        assert!(matches!(err, RiotError::PackageName));
    }

    #[test]
    fn test_find_wheel_matches_normalised_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("riot_demo-1.0-py3-none-any.whl"), "").unwrap();
        std::fs::write(dir.path().join("other-1.0-py3-none-any.whl"), "").unwrap();
        std::fs::write(dir.path().join("riot_demo-1.0.tar.gz"), "").unwrap();

        let found = find_wheel(dir.path(), "Riot-Demo").unwrap();
        assert_eq!(
            found.file_name().unwrap().to_str().unwrap(),
            "riot_demo-1.0-py3-none-any.whl"
        );
        assert!(find_wheel(dir.path(), "missing").is_none());
    }

    /// Directory a `pip download` invocation saves into
    fn download_dest(invocation: &Invocation) -> Option<PathBuf> {
        let at = invocation.args.iter().position(|a| a == "--dest")?;
        invocation.args.get(at + 1).map(PathBuf::from)
    }

    /// Runner whose `pip download` saves `file_name` into the requested dest
    fn downloading(file_name: &'static str) -> RecordingRunner {
        RecordingRunner::new().respond_with(move |invocation| {
            if invocation.display().contains("pip download") {
                let dest = download_dest(invocation)?;
                std::fs::write(dest.join(file_name), "").ok()?;
            }
            None
        })
    }

    #[tokio::test]
    async fn test_fetch_uses_only_the_given_source() {
        let dest = tempfile::tempdir().unwrap();
        let dest_path = dest.path().to_path_buf();
        let runner = RecordingRunner::new().respond_with(move |invocation| {
            if invocation.display().contains("pip download") {
                std::fs::write(dest_path.join("demo-2.0-py3-none-any.whl"), "").ok()?;
            }
            None
        });
        let source = WheelSource::new("/wheels", "demo");

        let wheel = source
            .fetch(&VirtualEnv::new("/v"), dest.path(), &runner)
            .await
            .unwrap();

        assert!(wheel.ends_with("demo-2.0-py3-none-any.whl"));
        let line = &runner.command_lines()[0];
        assert!(line.contains("--no-index"));
        assert!(line.contains("--find-links /wheels"));
        assert!(line.ends_with(" demo"));
    }

    #[tokio::test]
    async fn test_failed_download_is_wheel_not_found() {
        let dest = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new().respond(
            "pip download",
            failed(1, "ERROR: Could not find a version that satisfies the requirement demo"),
        );
        let source = WheelSource::new("https://example.invalid/wheels", "demo");

        let err = source
            .install(&VirtualEnv::new("/v"), dest.path(), &runner)
            .await
            .unwrap_err();

        match err {
            RiotError::WheelNotFound { package, detail, .. } => {
                assert_eq!(package, "demo");
                assert!(detail.unwrap().contains("Could not find a version"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // no install of any kind is attempted, editable or otherwise
        assert!(runner
            .command_lines()
            .iter()
            .all(|line| !line.contains("pip install")));
    }

    #[tokio::test]
    async fn test_missing_wheel_after_download_is_wheel_not_found() {
        let dest = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new();
        let source = WheelSource::new("/wheels", "demo");

        let err = source
            .install(&VirtualEnv::new("/v"), dest.path(), &runner)
            .await
            .unwrap_err();

        assert!(matches!(err, RiotError::WheelNotFound { detail: None, .. }));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_install_found_wheel() {
        let wheel_dir = tempfile::tempdir().unwrap();
        let runner = downloading("demo-1.0-py3-none-any.whl");

        WheelSource::new("/wheels", "demo")
            .install(&VirtualEnv::new("/v"), wheel_dir.path(), &runner)
            .await
            .unwrap();

        let lines = runner.command_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("pip install --disable-pip-version-check"));
        assert!(lines[1].ends_with("demo-1.0-py3-none-any.whl"));
        // the download directory is gone once installed
        assert_eq!(std::fs::read_dir(wheel_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_install_ignores_wheels_from_earlier_runs() {
        let wheel_dir = tempfile::tempdir().unwrap();
        std::fs::write(wheel_dir.path().join("demo-1.0-py3-none-any.whl"), "").unwrap();
        std::fs::write(wheel_dir.path().join("demo-3.0-py3-none-any.whl"), "").unwrap();
        let runner = downloading("demo-2.0-py3-none-any.whl");

        WheelSource::new("/wheels", "demo")
            .install(&VirtualEnv::new("/v"), wheel_dir.path(), &runner)
            .await
            .unwrap();

        let dest = download_dest(&runner.calls()[0]).unwrap();
        assert_eq!(dest.parent(), Some(wheel_dir.path()));
        assert!(runner.command_lines()[1].ends_with("demo-2.0-py3-none-any.whl"));
    }

    #[tokio::test]
    async fn test_interrupted_download() {
        let wheel_dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new().respond(
            "pip download",
            crate::runners::CommandOutput {
                interrupted: true,
                ..Default::default()
            },
        );

        let err = WheelSource::new("/wheels", "demo")
            .install(&VirtualEnv::new("/v"), wheel_dir.path(), &runner)
            .await
            .unwrap_err();

        assert!(err.is_interrupted());
        assert_eq!(runner.calls().len(), 1);
    }
}
