//! Error types and result definitions for replication operations.
//!
//! [`ShovelError`] carries a classified [`ErrorKind`], a static description, optional dynamic
//! detail and source, plus the callsite and backtrace where it was created.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type used throughout the crate.
pub type ShovelResult<T> = Result<T, ShovelError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the replication engine.
#[derive(Debug, Clone)]
pub struct ShovelError {
    payload: ErrorPayload,
}

/// Categories of errors raised while running a sync attempt.
///
/// Kinds prefixed with `Source` or `Destination` name the connector side an error is attributed
/// to when a failure reason is built from it.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Source connector
    SourceStartFailed,
    SourceReadFailed,
    SourceProcessFailed,
    SourceCloseFailed,

    // Destination connector
    DestinationStartFailed,
    DestinationWriteFailed,
    DestinationReadFailed,
    DestinationProcessFailed,
    DestinationCloseFailed,

    // Connector configuration
    ConfigPersistFailed,

    // Schema & data
    InvalidSchema,
    InvalidData,

    // IO & serialization
    IoError,
    SerializationError,
    DeserializationError,

    // Worker internals
    InvalidState,
    PumpPanicked,
    /// The output of an attempt could not be assembled.
    WorkerInternal,

    // Raised only by failpoints in tests.
    #[cfg(feature = "failpoints")]
    FailpointTriggered,
}

impl ErrorKind {
    /// Returns `true` for kinds attributed to the source connector.
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            ErrorKind::SourceStartFailed
                | ErrorKind::SourceReadFailed
                | ErrorKind::SourceProcessFailed
                | ErrorKind::SourceCloseFailed
        )
    }

    /// Returns `true` for kinds attributed to the destination connector.
    pub fn is_destination(&self) -> bool {
        matches!(
            self,
            ErrorKind::DestinationStartFailed
                | ErrorKind::DestinationWriteFailed
                | ErrorKind::DestinationReadFailed
                | ErrorKind::DestinationProcessFailed
                | ErrorKind::DestinationCloseFailed
        )
    }
}

impl ShovelError {
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    pub fn description(&self) -> &str {
        self.payload.description.as_ref()
    }

    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Attaches the error that caused this one.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    /// Renders description, detail and the whole source chain on a single line.
    ///
    /// Locations and backtraces are left out, which makes the result suitable for messages shown
    /// next to a failed sync.
    pub fn chain_message(&self) -> String {
        let mut message = summary(&self.payload);

        let mut source = error::Error::source(self);
        while let Some(err) = source {
            let text = match err.downcast_ref::<ShovelError>() {
                Some(shovel_err) => summary(&shovel_err.payload),
                None => err.to_string(),
            };
            // Converted errors repeat their source in the detail.
            if !message.contains(&text) {
                message.push_str(&format!(": {text}"));
            }
            source = err.source();
        }

        message
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        ShovelError {
            payload: ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            },
        }
    }
}

impl PartialEq for ShovelError {
    fn eq(&self, other: &ShovelError) -> bool {
        self.payload.kind == other.payload.kind
    }
}

impl fmt::Display for ShovelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let payload = &self.payload;
        let location = payload.location;
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            payload.kind,
            payload.description,
            location.file(),
            location.line(),
            location.column()
        )?;

        write_detail(payload.detail.as_deref(), f)?;
        write_backtrace(payload.backtrace.as_ref(), f)
    }
}

impl error::Error for ShovelError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Wraps a failure to encode a value as JSON.
///
/// `serde_json` classifies encoding failures like decoding ones, so they are never converted
/// implicitly.
#[track_caller]
pub fn serialization_error(err: serde_json::Error) -> ShovelError {
    let detail = err.to_string();
    ShovelError::from_components(
        ErrorKind::SerializationError,
        Cow::Borrowed("JSON serialization failed"),
        Some(Cow::Owned(detail)),
        Some(Arc::new(err)),
    )
}

fn summary(payload: &ErrorPayload) -> String {
    match payload.detail.as_deref() {
        Some(detail) => format!("{} ({detail})", payload.description),
        None => payload.description.to_string(),
    }
}

fn write_backtrace(backtrace: &Backtrace, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let rendered = backtrace.to_string();
    if rendered.trim().is_empty() || rendered.starts_with("disabled") {
        return Ok(());
    }

    write!(f, "\n  Backtrace:")?;
    for line in rendered.lines() {
        write!(f, "\n    {line}")?;
    }

    Ok(())
}

fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let Some(detail) = detail else {
        return Ok(());
    };

    if detail.trim().is_empty() {
        return write!(f, "\n  Detail: <empty>");
    }

    write!(f, "\n  Detail:")?;
    for line in detail.lines() {
        write!(f, "\n    {line}")?;
    }

    Ok(())
}

impl From<(ErrorKind, &'static str)> for ShovelError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> ShovelError {
        ShovelError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for ShovelError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> ShovelError {
        ShovelError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

impl From<std::io::Error> for ShovelError {
    #[track_caller]
    fn from(err: std::io::Error) -> ShovelError {
        let detail = err.to_string();
        ShovelError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<serde_json::Error> for ShovelError {
    #[track_caller]
    fn from(err: serde_json::Error) -> ShovelError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        ShovelError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
