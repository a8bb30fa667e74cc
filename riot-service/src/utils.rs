// Utility Functions
// String helpers shared by expansion, building and reporting

use std::path::Path;

/// Remove every character of `chars` from `s`.
pub fn rmchars(chars: &str, s: &str) -> String {
    s.chars().filter(|c| !chars.contains(*c)).collect()
}

/// A PEP 508 dependency string: the name followed by its constraint.
pub fn pep_dep(name: &str, constraint: &str) -> String {
    format!("{}{}", name, constraint)
}

/// Shell-quoted, space separated dependency list as passed to pip.
pub fn pip_deps<'a, I>(pkgs: I) -> String
where
    I: IntoIterator<Item = &'a (String, String)>,
{
    pkgs.into_iter()
        .map(|(name, constraint)| format!("'{}'", pep_dep(name, constraint)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Human-friendly `K=V K2=V2` rendering of environment variables.
pub fn env_to_str<'a, I>(env: I) -> String
where
    I: IntoIterator<Item = &'a (String, String)>,
{
    env.into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Join paths with the platform separator, skipping missing entries.
pub fn join_paths<'a, I>(paths: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let separator = if cfg!(windows) { ";" } else { ":" };
    paths
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Whether the working directory holds an installable Python project.
pub fn has_python_project(dir: &Path) -> bool {
    ["pyproject.toml", "setup.py", "setup.cfg"]
        .iter()
        .any(|name| dir.join(name).exists())
}
