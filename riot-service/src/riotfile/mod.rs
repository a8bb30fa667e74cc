// Riotfile module
// Loading and validation of the declarative environment tree

pub mod error;
pub mod models;
pub mod parser;

pub use error::{ConfigError, ConfigErrorKind, ConfigResult};
pub use models::{Alternatives, Riotfile, VenvSpec, LATEST};
pub use parser::{RiotfileParser, DEFAULT_RIOTFILE};
