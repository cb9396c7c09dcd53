pub mod cache;
pub mod detect;
pub mod discover;
pub mod file;
pub mod fm;
pub mod images;
pub mod merge;
pub mod preview;
pub mod slug;
pub mod tokens;
pub mod unique;
pub mod workspace;

pub use cache::CollectionCache;
pub use workspace::Workspace;

use http::StatusCode;
use serde::Serialize;
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("front matter parse error: {0}")]
    FrontMatter(String),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Coarse classification the route layer maps to a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Filesystem,
}

impl Error {
    #[inline]
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    #[inline]
    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Error::NotFound {
            what,
            name: name.into(),
        }
    }

    #[inline]
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            _ => ErrorKind::Filesystem,
        }
    }

    pub fn to_status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Filesystem => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{ "success": true, ...data }` or `{ "success": false, "error": "...", "kind": "..." }`.
#[derive(Debug, Clone, Serialize)]
pub struct WriteOutcome<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl<T: Serialize> From<Result<T>> for WriteOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
                kind: None,
            },
            Err(e) => Self {
                success: false,
                data: None,
                error: Some(e.to_string()),
                kind: Some(e.kind()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Made {
        id: String,
    }

    #[test]
    fn outcome_shapes() {
        let ok: WriteOutcome<Made> = Ok(Made { id: "a".into() }).into();
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v, serde_json::json!({"success": true, "id": "a"}));

        let err: WriteOutcome<Made> = Err(Error::not_found("content", "blog/x")).into();
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["success"], false);
        assert_eq!(v["kind"], "notfound");
        assert_eq!(v["error"], "content not found: blog/x");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            Error::validation("bad").to_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::io("/x", io::Error::new(io::ErrorKind::NotFound, "gone")).to_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::io("/x", io::Error::new(io::ErrorKind::PermissionDenied, "no")).to_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
