// Output formatting helpers for CLI commands

use std::sync::atomic::{AtomicBool, Ordering};

static PLAIN: AtomicBool = AtomicBool::new(false);

/// Drop colours and symbols (`--pipe`)
pub fn set_plain(plain: bool) {
    PLAIN.store(plain, Ordering::Relaxed);
}

fn plain() -> bool {
    PLAIN.load(Ordering::Relaxed)
}

fn paint(style: &str, text: &str) -> String {
    if plain() {
        text.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", style, text)
    }
}

/// Print a status message: "     Running message"
pub fn status(action: &str, message: &str) {
    eprintln!("{} {}", paint("1;36", &format!("{:>12}", action)), message);
}

/// Print a success message with checkmark
pub fn success(message: &str) {
    let mark = if plain() { "  ok" } else { "  \u{2713}" };
    eprintln!("{} {}", paint("1;32", mark), message);
}

/// Print a failure message with X
pub fn failure(message: &str) {
    let mark = if plain() { "  FAIL" } else { "  \u{2717}" };
    eprintln!("{} {}", paint("1;31", mark), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    eprintln!("{} {}", paint("33", "  !"), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", paint("1;31", "error:"), message);
}

/// Print an info message
pub fn info(message: &str) {
    eprintln!("{} {}", paint("36", "  i"), message);
}

/// Print a dim/muted message
pub fn dim(message: &str) {
    eprintln!("{}", paint("2", message));
}

/// Print a header line
pub fn header(message: &str) {
    eprintln!("{}", paint("1", &format!("==> {}", message)));
}

/// Forward a line the command printed on stdout
pub fn command_output(line: &str) {
    println!("{}", line);
}

/// Forward a line the command printed on stderr
pub fn command_error(line: &str) {
    eprintln!("{}", line);
}
