use std::fmt;

#[derive(Debug)]
pub enum EngineError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Rule table validation error (empty predicate, bad factor, etc.).
    ConfigValidation(String),
    /// A required source mapping is absent from the rule table.
    UnknownSource(String),
    /// Missing required column in input data.
    MissingColumn { source: String, column: String },
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "rule table parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "rule table validation error: {msg}"),
            Self::UnknownSource(name) => {
                write!(f, "source '{name}' is not declared in the rule table")
            }
            Self::MissingColumn { source, column } => {
                write!(f, "source '{source}': missing column '{column}'")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
