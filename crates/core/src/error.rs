use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the resource collection, the plugin contracts and dispatch.
#[derive(Debug, Error)]
pub enum Error {
    /// Two resources share an identity but differ in content.
    #[error("conflict on {id}:\n  existing: {existing}\n  incoming: {incoming}")]
    Conflict {
        id: String,
        existing: String,
        incoming: String,
    },
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("malformed arguments for {kind}: {reason}")]
    MalformedArguments { kind: String, reason: String },
    #[error("no plugin registered for apiVersion '{api_version}', kind '{kind}'")]
    ResolutionFailure { api_version: String, kind: String },
    #[error("resource sets differ:\n{0}")]
    SetMismatch(String),
    #[error("invalid resource id '{input}': {reason}")]
    InvalidResId { input: String, reason: String },
    #[error("field path '{path}': {reason}")]
    FieldPath { path: String, reason: String },
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    #[error("cannot load '{path}': {reason}")]
    Load { path: String, reason: String },
}

impl Error {
    pub fn malformed(kind: impl Into<String>, reason: impl ToString) -> Self {
        Error::MalformedArguments { kind: kind.into(), reason: reason.to_string() }
    }

    pub fn field_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::FieldPath { path: path.into(), reason: reason.into() }
    }
}
