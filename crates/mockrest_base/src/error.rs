use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use tracing_error::{SpanTrace, SpanTraceStatus};

/* 📖 # Why a custom error type and not use anyhow/eyre/thiserror etc?

- Better control over error handling
- No dependencies to compile and integrate
- The Debug output doubles as the diagnostic body of HTTP 500 responses,
  so we want full control over its layout (message, context tree, causes, span trace)
 */

/// Error variants that can occur in mockrest operations.
/// Each variant represents a specific error category with its associated context.
#[derive(Debug)]
pub enum ErrorKind {
    /// File system operation failed
    FileError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A JSON document or request body could not be decoded or encoded
    Json { source: serde_json::Error },

    /// A top-level document entry is neither an object nor an array
    UnsupportedEntry { key: String, actual_type: String },

    /// The verb/depth combination of a request maps to no template key
    NoTemplateRoute { method: String, path: String },

    /// A template key was derived but the options carry no template path for it
    UnmappedTemplate {
        resource: String,
        template_key: String,
    },

    /// A template file was found but could not be compiled or rendered
    Template { path: String, message: String },

    /// A record with the same identity already exists in the collection
    DuplicateId { collection: String, id: String },

    /// Catch-all for other errors with a message
    Message { message: String },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileError { path, source } => {
                write!(f, "File error at {}: {}", path.display(), source)
            }
            Self::Json { source } => write!(f, "Invalid JSON: {}", source),
            Self::UnsupportedEntry { key, actual_type } => write!(
                f,
                "Type of \"{}\" ({}) is not supported. Use objects or arrays of objects.",
                key, actual_type
            ),
            Self::NoTemplateRoute { method, path } => write!(
                f,
                "No template key for {} {}: templates exist for POST, GET-ALL, GET, PUT and DELETE only",
                method, path
            ),
            Self::UnmappedTemplate {
                resource,
                template_key,
            } => write!(
                f,
                "No template configured for resource \"{}\" and key \"{}\"",
                resource, template_key
            ),
            Self::Template { path, message } => {
                write!(f, "Failed to render template {}: {}", path, message)
            }
            Self::DuplicateId { collection, id } => write!(
                f,
                "Insert failed, duplicate id \"{}\" in collection \"{}\"",
                id, collection
            ),
            Self::Message { message } => write!(f, "{}", message),
        }
    }
}

/* 📖 # Why separate ErrorKind and MockrestError?
ErrorKind holds the structural variant users match on (is it a configuration fault?
which key was unsupported?). MockrestError wraps it with runtime context strings,
an optional cause and the span trace captured where the error was created.
*/

/// Error type wrapping ErrorKind with context, cause chain and span trace.
pub struct MockrestError {
    kind: ErrorKind,
    context: Vec<String>,
    cause: Option<Box<MockrestError>>,
    span_trace: SpanTrace,
}

impl MockrestError {
    /// Creates a new error from an ErrorKind, capturing the current span trace.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: vec![],
            cause: None,
            span_trace: SpanTrace::capture(),
        }
    }

    /// Creates a message error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Message {
            message: message.into(),
        })
    }

    /// Attaches context to an error.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Attaches context using lazy evaluation.
    pub fn with_context<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> String,
    {
        self.context.push(f());
        self
    }

    /// Records the error that led to this one.
    pub fn caused_by(mut self, cause: impl Into<Box<MockrestError>>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Returns a reference to the underlying ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the attached context strings, oldest first.
    pub fn get_context(&self) -> &[String] {
        &self.context
    }

    /// Returns the error this one was caused by, if any.
    pub fn cause(&self) -> Option<&MockrestError> {
        self.cause.as_deref()
    }

    /// Returns the span trace captured when the error was created.
    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// Configuration faults are programmer errors (bad document shape, bad template
    /// mapping) as opposed to faults caused by a particular request.
    pub fn is_configuration_fault(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::UnsupportedEntry { .. }
                | ErrorKind::NoTemplateRoute { .. }
                | ErrorKind::UnmappedTemplate { .. }
        )
    }

    /// Returns the innermost error in the chain.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: &str) -> fmt::Result {
        let total = self.context.len() + usize::from(self.cause.is_some());
        for (i, ctx) in self.context.iter().enumerate() {
            let connector = if i + 1 == total { "└─" } else { "├─" };
            writeln!(f, "{}{} {}", indent, connector, ctx)?;
        }
        if let Some(cause) = &self.cause {
            writeln!(f, "{}└─ cause: {}", indent, cause.kind)?;
            cause.fmt_tree(f, &format!("{}   ", indent))?;
        }
        Ok(())
    }
}

impl From<ErrorKind> for MockrestError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<ErrorKind> for Box<MockrestError> {
    fn from(kind: ErrorKind) -> Self {
        Box::new(MockrestError::new(kind))
    }
}

impl From<serde_json::Error> for Box<MockrestError> {
    fn from(source: serde_json::Error) -> Self {
        Box::new(MockrestError::new(ErrorKind::Json { source }))
    }
}

impl StdError for MockrestError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            ErrorKind::FileError { source, .. } => Some(source),
            ErrorKind::Json { source } => Some(source),
            _ => self
                .cause
                .as_deref()
                .map(|cause| cause as &(dyn StdError + 'static)),
        }
    }
}

impl fmt::Display for MockrestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ctx in &self.context {
            write!(f, "{}: ", ctx)?;
        }
        write!(f, "{}", self.kind)
    }
}

/* 📖 # Why a tree-shaped Debug output?
`{:?}` of an error is what ends up in logs and in the body of HTTP 500 responses.
A tree of message, context and causes followed by the span trace reads well in both
places and tells the reader where in the request pipeline the failure happened.
*/
impl fmt::Debug for MockrestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;
        self.fmt_tree(f, "")?;
        if self.span_trace.status() == SpanTraceStatus::CAPTURED {
            writeln!(f, "Trace: {}", self.span_trace)?;
        }
        Ok(())
    }
}

/// Standard result type for mockrest operations.
pub type MockrestResult<T> = std::result::Result<T, Box<MockrestError>>;

/// Extension trait for attaching context to Results.
pub trait ResultExt<T> {
    /// Attaches context to an error, consuming and re-wrapping it.
    fn context(self, context: impl Into<String>) -> MockrestResult<T>;

    /// Attaches context using lazy evaluation.
    /// Prefer this to avoid expensive string formatting in the success path.
    fn with_context<F>(self, f: F) -> MockrestResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for MockrestResult<T> {
    fn context(self, context: impl Into<String>) -> MockrestResult<T> {
        self.map_err(|err| Box::new(err.context(context)))
    }

    fn with_context<F>(self, f: F) -> MockrestResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| Box::new(err.with_context(f)))
    }
}

/// Creates a boxed message error from format arguments.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        Box::new($crate::error::MockrestError::message(format!($($arg)*)))
    };
}

/// Returns early with a boxed message error.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::err!($($arg)*))
    };
}
