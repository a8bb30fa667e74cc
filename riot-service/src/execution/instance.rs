// Environment Instances
// One concrete (interpreter, packages, env, command) combination

use crate::interpreter::{Interpreter, ResolvedInterpreter};
use crate::settings::RiotSettings;
use crate::utils::{env_to_str, pip_deps, rmchars};

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Longest venv path used before falling back to the short hash
const MAX_VENV_PATH_LEN: usize = 255;

/// Characters dropped from package specs when building the identifier
const IDENT_STRIP_CHARS: &str = "<=>.,:+@/'";

/// Placeholder in commands replaced by extra command-line arguments
pub const CMDARGS_PLACEHOLDER: &str = "{cmdargs}";

/// A runnable, fully resolved environment.
///
/// Identifier and hashes are computed once from the interpreter hint and the
/// merged package set, so the same logical environment always maps to the
/// same directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentInstance {
    name: Option<String>,
    command: String,
    interpreter: Interpreter,
    env: Vec<(String, String)>,
    pkgs: Vec<(String, String)>,
    full_pkgs: Vec<(String, String)>,
    skip_dev_install: bool,
    ident: String,
    long_hash: String,
}

impl EnvironmentInstance {
    pub fn new(
        name: Option<String>,
        command: String,
        interpreter: Interpreter,
        env: Vec<(String, String)>,
        pkgs: Vec<(String, String)>,
        full_pkgs: Vec<(String, String)>,
        skip_dev_install: bool,
    ) -> Self {
        let full_pkg_str = pip_deps(&full_pkgs);
        let ident = compute_ident(&full_pkg_str);
        let long_hash = compute_hash(interpreter.hint(), &full_pkg_str);

        Self {
            name,
            command,
            interpreter,
            env,
            pkgs,
            full_pkgs,
            skip_dev_install,
            ident,
            long_hash,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for display, empty when the instance is unnamed
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn env_str(&self) -> String {
        env_to_str(&self.env)
    }

    /// Packages declared by the leaf venv itself
    pub fn pkgs(&self) -> &[(String, String)] {
        &self.pkgs
    }

    /// Packages merged from the root venv down to the leaf
    pub fn full_pkgs(&self) -> &[(String, String)] {
        &self.full_pkgs
    }

    pub fn pkg_str(&self) -> String {
        pip_deps(&self.pkgs)
    }

    pub fn full_pkg_str(&self) -> String {
        pip_deps(&self.full_pkgs)
    }

    pub fn skip_dev_install(&self) -> bool {
        self.skip_dev_install
    }

    /// Identifier derived from the package set, empty without packages
    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn long_hash(&self) -> &str {
        &self.long_hash
    }

    pub fn short_hash(&self) -> &str {
        &self.long_hash[..7]
    }

    /// Command with `{cmdargs}` substituted
    pub fn command_with_args(&self, cmdargs: &[String]) -> String {
        self.command
            .replace(CMDARGS_PLACEHOLDER, &cmdargs.join(" "))
            .trim()
            .to_string()
    }

    /// Directory of the virtualenv this instance runs in.
    ///
    /// Instances without packages share their interpreter's base venv. The
    /// identifier alone is lossy (`six<1.16` and `six>1.16` both give
    /// `six116`), so the short hash is always part of the name.
    pub fn venv_path(&self, py: &ResolvedInterpreter, settings: &RiotSettings) -> PathBuf {
        let base = py.base_venv_path(settings);
        if self.ident.is_empty() {
            return base;
        }

        let base_name = base
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let parent = base.parent().map(PathBuf::from).unwrap_or_default();

        let by_ident = parent.join(format!(
            "{}_{}_{}",
            base_name,
            self.ident,
            self.short_hash()
        ));
        if by_ident.as_os_str().len() > MAX_VENV_PATH_LEN {
            parent.join(format!("{}_{}", base_name, self.short_hash()))
        } else {
            by_ident
        }
    }

    /// Variables identifying the instance to the command it runs
    pub fn riot_env(&self, py: &ResolvedInterpreter) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("RIOT".to_string(), "1".to_string());
        env.insert(
            "RIOT_PYTHON_HINT".to_string(),
            self.interpreter.hint().to_string(),
        );
        env.insert("RIOT_PYTHON_VERSION".to_string(), py.version.clone());
        env.insert("RIOT_VENV_HASH".to_string(), self.short_hash().to_string());
        if !self.ident.is_empty() {
            env.insert("RIOT_VENV_IDENT".to_string(), self.ident.clone());
        }
        env.insert(
            "RIOT_VENV_NAME".to_string(),
            self.display_name().to_string(),
        );
        env.insert("RIOT_VENV_PKGS".to_string(), self.pkg_str());
        env.insert("RIOT_VENV_FULL_PKGS".to_string(), self.full_pkg_str());
        env
    }

    /// One-line description used by `list` and the run summary
    pub fn summary(&self) -> String {
        let mut parts = vec![self.display_name().to_string()];
        let env = self.env_str();
        if !env.is_empty() {
            parts.push(env);
        }
        parts.push(format!("Interpreter(_hint='{}')", self.interpreter.hint()));
        let pkgs = self.full_pkg_str();
        if !pkgs.is_empty() {
            parts.push(pkgs);
        }
        parts.join(" ")
    }
}

fn compute_ident(full_pkg_str: &str) -> String {
    full_pkg_str
        .split_whitespace()
        .map(|dep| rmchars(IDENT_STRIP_CHARS, dep))
        .collect::<Vec<_>>()
        .join("_")
}

fn compute_hash(hint: &str, full_pkg_str: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"py:");
    hasher.update(hint.as_bytes());
    hasher.update(b"\npkgs:");
    hasher.update(full_pkg_str.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkgs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    fn instance(hint: &str, full: &[(&str, &str)]) -> EnvironmentInstance {
        EnvironmentInstance::new(
            Some("test".to_string()),
            "pytest {cmdargs}".to_string(),
            Interpreter::new(hint),
            Vec::new(),
            pkgs(full),
            pkgs(full),
            false,
        )
    }

    fn resolved(version: &str) -> ResolvedInterpreter {
        ResolvedInterpreter {
            interpreter: Interpreter::new("3.9"),
            executable: PathBuf::from("/usr/bin/python3.9"),
            version: version.to_string(),
        }
    }

    #[test]
    fn test_ident() {
        let inst = instance("3.9", &[("pytest", "==6.1.2"), ("mock", ""), ("attrs", ">=20.1,<21")]);
        assert_eq!(inst.ident(), "pytest612_mock_attrs20121");
        assert_eq!(inst.full_pkg_str(), "'pytest==6.1.2' 'mock' 'attrs>=20.1,<21'");
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = instance("3.9", &[("pytest", "==6.1.2")]);
        let b = instance("3.9", &[("pytest", "==6.1.2")]);
        let c = instance("3.8", &[("pytest", "==6.1.2")]);
        let d = instance("3.9", &[("pytest", "==6.2.0")]);

        assert_eq!(a.long_hash(), b.long_hash());
        assert_eq!(a.long_hash().len(), 64);
        assert_eq!(a.short_hash().len(), 7);
        assert_ne!(a.short_hash(), c.short_hash());
        assert_ne!(a.short_hash(), d.short_hash());
    }

    #[test]
    fn test_command_with_args() {
        let inst = instance("3.9", &[]);
        assert_eq!(
            inst.command_with_args(&["-k".to_string(), "foo".to_string()]),
            "pytest -k foo"
        );
        assert_eq!(inst.command_with_args(&[]), "pytest");
    }

    #[test]
    fn test_venv_path() {
        let settings = RiotSettings::default().with_riot_folder("/tmp/.riot");

        let bare = instance("3.9", &[]);
        assert_eq!(
            bare.venv_path(&resolved("3.9.7"), &settings),
            PathBuf::from("/tmp/.riot/venv_py397")
        );

        let with_pkgs = instance("3.9", &[("pytest", "==6.1.2")]);
        assert_eq!(
            with_pkgs.venv_path(&resolved("3.9.7"), &settings),
            PathBuf::from(format!(
                "/tmp/.riot/venv_py397_pytest612_{}",
                with_pkgs.short_hash()
            ))
        );
    }

    #[test]
    fn test_colliding_idents_get_distinct_venvs() {
        let settings = RiotSettings::default().with_riot_folder("/tmp/.riot");
        let below = instance("3.9", &[("six", "<1.16")]);
        let above = instance("3.9", &[("six", ">1.16")]);

        assert_eq!(below.ident(), above.ident());
        assert_ne!(
            below.venv_path(&resolved("3.9.7"), &settings),
            above.venv_path(&resolved("3.9.7"), &settings)
        );
    }

    #[test]
    fn test_long_venv_path_uses_hash() {
        let settings = RiotSettings::default().with_riot_folder("/tmp/.riot");
        let many: Vec<(String, String)> = (0..40)
            .map(|i| (format!("package-number-{}", i), "==1.0.0".to_string()))
            .collect();
        let inst = EnvironmentInstance::new(
            None,
            "true".to_string(),
            Interpreter::new("3.9"),
            Vec::new(),
            many.clone(),
            many,
            false,
        );

        let path = inst.venv_path(&resolved("3.9.7"), &settings);
        assert_eq!(
            path,
            PathBuf::from(format!("/tmp/.riot/venv_py397_{}", inst.short_hash()))
        );
    }

    #[test]
    fn test_riot_env() {
        let inst = EnvironmentInstance::new(
            Some("test".to_string()),
            "pytest".to_string(),
            Interpreter::new("3.9"),
            Vec::new(),
            pkgs(&[("pytest", "")]),
            pkgs(&[("mock", "==4.0"), ("pytest", "")]),
            false,
        );
        let env = inst.riot_env(&resolved("3.9.7"));

        assert_eq!(env["RIOT"], "1");
        assert_eq!(env["RIOT_PYTHON_HINT"], "3.9");
        assert_eq!(env["RIOT_PYTHON_VERSION"], "3.9.7");
        assert_eq!(env["RIOT_VENV_HASH"], inst.short_hash());
        assert_eq!(env["RIOT_VENV_IDENT"], "mock40_pytest");
        assert_eq!(env["RIOT_VENV_NAME"], "test");
        assert_eq!(env["RIOT_VENV_PKGS"], "'pytest'");
        assert_eq!(env["RIOT_VENV_FULL_PKGS"], "'mock==4.0' 'pytest'");
    }

    #[test]
    fn test_riot_env_without_packages_has_no_ident() {
        let inst = instance("3.9", &[]);
        let env = inst.riot_env(&resolved("3.9.7"));
        assert!(!env.contains_key("RIOT_VENV_IDENT"));
        assert_eq!(env["RIOT_VENV_PKGS"], "");
    }

    #[test]
    fn test_summary() {
        let inst = EnvironmentInstance::new(
            Some("test".to_string()),
            "pytest".to_string(),
            Interpreter::new("3.9"),
            vec![("LANG".to_string(), "C".to_string())],
            pkgs(&[("pytest", "")]),
            pkgs(&[("pytest", "")]),
            false,
        );
        assert_eq!(inst.summary(), "test LANG=C Interpreter(_hint='3.9') 'pytest'");
    }
}
