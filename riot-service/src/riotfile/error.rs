// Riotfile error types
// Location, source context and suggestions for malformed riotfiles

use std::fmt;

/// Detailed riotfile error with location and context
#[derive(Debug, Clone)]
pub struct ConfigError {
    /// Error message
    pub message: String,
    /// Line number (1-indexed, 0 when not tied to a location)
    pub line: usize,
    /// Column number (1-indexed, 0 when not tied to a location)
    pub column: usize,
    /// Surrounding source lines
    pub context: String,
    /// Optional suggestion for fixing the error
    pub suggestion: Option<String>,
    /// The kind of error
    pub kind: ConfigErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// YAML syntax error
    YamlSyntax,
    /// Wrong types or unknown keys
    InvalidSchema,
    /// No top-level `venv` tree
    MissingRoot,
    /// Invalid value (e.g. an empty package name)
    InvalidValue,
    /// File missing or unreadable
    Io,
}

impl ConfigError {
    pub fn new(message: impl Into<String>, kind: ConfigErrorKind) -> Self {
        Self {
            message: message.into(),
            line: 0,
            column: 0,
            context: String::new(),
            suggestion: None,
            kind,
        }
    }

    pub fn io(path: &std::path::Path, err: &std::io::Error) -> Self {
        Self::new(
            format!("cannot read riotfile '{}': {}", path.display(), err),
            ConfigErrorKind::Io,
        )
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Create context from source content
    pub fn with_source_context(mut self, source: &str, context_lines: usize) -> Self {
        if self.line == 0 {
            return self;
        }

        let lines: Vec<&str> = source.lines().collect();
        let start = self.line.saturating_sub(context_lines + 1);
        let end = (self.line + context_lines).min(lines.len());

        let mut context = String::new();
        for (i, line) in lines.iter().enumerate().take(end).skip(start) {
            let line_num = i + 1;
            let prefix = if line_num == self.line { ">" } else { " " };
            context.push_str(&format!("{} {:4} | {}\n", prefix, line_num, line));

            if line_num == self.line && self.column > 0 {
                let indicator = " ".repeat(self.column - 1) + "^";
                context.push_str(&format!("       | {}\n", indicator));
            }
        }

        self.context = context;
        self
    }

    /// Create from a serde_yaml error
    pub fn from_yaml_error(err: &serde_yaml::Error, source: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((0, 0));

        let msg = err.to_string();
        let kind = if msg.contains("unknown field")
            || msg.contains("missing field")
            || msg.contains("invalid type")
        {
            ConfigErrorKind::InvalidSchema
        } else {
            ConfigErrorKind::YamlSyntax
        };

        let mut error = ConfigError::new(format_yaml_error_message(&msg), kind)
            .at(line, column)
            .with_source_context(source, 2);
        error.suggestion = suggest_yaml_fix(&msg, source, line);
        error
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if self.line > 0 {
            write!(f, "\n  --> line {}:{}", self.line, self.column)?;
        }

        if !self.context.is_empty() {
            write!(f, "\n\n{}", self.context.trim_end())?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n\nhelp: {}", suggestion)?;
        }

        Ok(())
    }
}

impl std::error::Error for ConfigError {}

/// Make serde_yaml messages read like riotfile messages
fn format_yaml_error_message(msg: &str) -> String {
    // serde_yaml appends the location, which is printed separately
    let msg = match msg.find(" at line ") {
        Some(idx) => &msg[..idx],
        None => msg,
    };

    if msg.contains("unknown field") {
        if let Some(field) = extract_field_name(msg, "unknown field `", "`") {
            if let Some(expected) = extract_expected_fields(msg) {
                return format!(
                    "unknown key '{}', expected one of: {}",
                    field,
                    expected.join(", ")
                );
            }
            return format!("unknown key '{}'", field);
        }
    }

    if msg.contains("invalid type") {
        if let (Some(found), Some(expected)) = (
            extract_field_name(msg, "invalid type: ", ", expected"),
            msg.find(", expected ").map(|i| msg[i + ", expected ".len()..].to_string()),
        ) {
            return format!("expected {}, but found {}", expected, found);
        }
    }

    msg.to_string()
}

fn extract_field_name(msg: &str, prefix: &str, suffix: &str) -> Option<String> {
    let start = msg.find(prefix)? + prefix.len();
    let end = msg[start..].find(suffix)? + start;
    Some(msg[start..end].to_string())
}

fn extract_expected_fields(msg: &str) -> Option<Vec<String>> {
    let start = msg.find("expected one of ")? + "expected one of ".len();
    let fields = msg[start..]
        .split(", ")
        .map(|s| s.trim_matches('`').to_string())
        .collect();
    Some(fields)
}

/// Suggest fixes for common riotfile mistakes
fn suggest_yaml_fix(msg: &str, source: &str, line: usize) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    let error_line = lines.get(line.saturating_sub(1)).unwrap_or(&"");

    if error_line.starts_with('\t') {
        return Some(
            "YAML prefers spaces over tabs for indentation. Replace tabs with spaces.".to_string(),
        );
    }

    let typo_suggestions = [
        ("python", "pys"),
        ("pythons", "pys"),
        ("packages", "pkgs"),
        ("deps", "pkgs"),
        ("environment", "env"),
        ("children", "venvs"),
        ("cmd", "command"),
    ];

    if let Some(field) = extract_field_name(msg, "unknown field `", "`") {
        for (typo, correct) in typo_suggestions {
            if field.eq_ignore_ascii_case(typo) {
                return Some(format!("did you mean '{}'?", correct));
            }
        }
    }

    None
}

/// Result type for riotfile operations
pub type ConfigResult<T> = Result<T, ConfigError>;
