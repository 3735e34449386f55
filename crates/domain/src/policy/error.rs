use std::path::PathBuf;

use thiserror::Error;

/// A document that could not be decoded into a typed manifest.
///
/// Parsing is total: every byte sequence produces either manifests or one of
/// these. The variants carry the zero-based document index within the stream;
/// `in_file` attaches the originating path when parsing from disk.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("document {index}: invalid YAML: {message}")]
    Yaml { index: usize, message: String },

    #[error("document {index}: unsupported apiVersion \"{found}\" (want {want})")]
    UnsupportedApiVersion {
        index: usize,
        found: String,
        want: &'static str,
    },

    #[error("document {index}: unknown kind \"{kind}\"")]
    UnknownKind { index: usize, kind: String },

    #[error("document {index}: decode {kind} spec: {message}")]
    Spec {
        index: usize,
        kind: &'static str,
        message: String,
    },

    #[error("{}: {source}", path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Wrap this error with the file it came from, unless it already carries
    /// a path.
    pub fn in_file(self, path: &std::path::Path) -> Self {
        match self {
            err @ (Self::Io { .. } | Self::InFile { .. }) => err,
            other => Self::InFile {
                path: path.to_path_buf(),
                source: Box::new(other),
            },
        }
    }
}

/// Aggregated semantic errors across a whole batch of manifests.
///
/// One validation pass reports every problem it finds rather than stopping at
/// the first, so a single invocation is enough to fix a policy set.
#[derive(Debug, Error)]
#[error("validation errors:\n  - {}", errors.join("\n  - "))]
pub struct ValidationError {
    pub errors: Vec<String>,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_includes_index() {
        let err = ParseError::UnknownKind {
            index: 2,
            kind: "RoutingPolicy".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("document 2"), "got: {msg}");
        assert!(msg.contains("RoutingPolicy"), "got: {msg}");
    }

    #[test]
    fn in_file_wraps_once() {
        let err = ParseError::Yaml {
            index: 0,
            message: "mapping expected".to_string(),
        };
        let wrapped = err.in_file(std::path::Path::new("/etc/aegisx/a.yaml"));
        let msg = wrapped.to_string();
        assert!(msg.contains("a.yaml"), "got: {msg}");

        // A second wrap keeps the original path.
        let rewrapped = wrapped.in_file(std::path::Path::new("/tmp/b.yaml"));
        assert!(rewrapped.to_string().contains("a.yaml"));
    }

    #[test]
    fn validation_error_lists_every_entry() {
        let err = ValidationError {
            errors: vec!["first".to_string(), "second".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("- first"));
        assert!(msg.contains("- second"));
    }

    #[test]
    fn compile_error_wraps_validation() {
        let err = CompileError::from(ValidationError {
            errors: vec!["bad".to_string()],
        });
        assert!(err.to_string().contains("validation failed"));
    }
}
