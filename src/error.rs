use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} file {} does not exist", path.display())]
    MissingInput { kind: &'static str, path: PathBuf },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("PDDL syntax error: {0}")]
    Syntax(String),
    /// The same symbol was observed with conflicting structure.
    #[error("inconsistent model: {0}")]
    Inconsistent(String),
    #[error("unknown goal construct: {0}")]
    UnknownGoal(String),
    #[error("fluent {0} is not defined in the initial state")]
    UnresolvedFluent(String),
    #[error("translator exited with {status}: {output}")]
    Tool { status: ExitStatus, output: String },
    #[error("malformed translator output at line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("operator refers to unknown action schema {0}")]
    UnknownSchema(String),
}

impl Error {
    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        Error::Malformed { line, message: message.into() }
    }
}
