use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use shovel::error::ShovelError;

fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

pub type ReplicatorResult<T> = Result<T, ReplicatorError>;

/// Backtrace captured when an infrastructure error is created.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the replicator binary.
///
/// Wraps [`ShovelError`] for failures of the attempt itself and provides variants for the
/// surrounding infrastructure.
#[derive(Debug)]
pub enum ReplicatorError {
    Shovel(ShovelError),
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    Io(std::io::Error, CapturedBacktrace),
    Json(serde_json::Error, CapturedBacktrace),
}

impl ReplicatorError {
    pub fn category(&self) -> &'static str {
        match self {
            ReplicatorError::Shovel(_) => "replication error",
            ReplicatorError::Config(_, _) => "configuration error",
            ReplicatorError::Io(_, _) => "i/o error",
            ReplicatorError::Json(_, _) => "json error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            // Rendered as part of the error itself.
            ReplicatorError::Shovel(_) => None,
            ReplicatorError::Config(_, backtrace)
            | ReplicatorError::Io(_, backtrace)
            | ReplicatorError::Json(_, backtrace) => Some(&backtrace.0),
        }
    }

    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        ReplicatorError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a report of the error and its causes for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("replicator failed\n");
        out.push_str(&format!("category: {}\n", self.category()));

        match self {
            ReplicatorError::Shovel(err) => {
                out.push_str(&format!("error: {}\n", err.chain_message()));
            }
            _ => {
                out.push_str(&format!("error: {self}\n"));
                let mut source = Error::source(self);
                let mut index = 1usize;
                while let Some(err) = source {
                    out.push_str(&format!("cause {index}: {err}\n"));
                    source = err.source();
                    index += 1;
                }
            }
        }

        if should_render_backtrace() {
            if let Some(backtrace) = self.backtrace() {
                out.push_str("backtrace:\n");
                out.push_str(&backtrace.to_string());
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }

        out
    }
}

impl fmt::Display for ReplicatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicatorError::Shovel(err) => write!(f, "{err}"),
            ReplicatorError::Config(source, _) => write!(f, "configuration error: {source}"),
            ReplicatorError::Io(source, _) => write!(f, "i/o error: {source}"),
            ReplicatorError::Json(source, _) => write!(f, "json error: {source}"),
        }
    }
}

impl Error for ReplicatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReplicatorError::Shovel(err) => err.source(),
            ReplicatorError::Config(source, _) => Some(source.as_ref()),
            ReplicatorError::Io(source, _) => Some(source),
            ReplicatorError::Json(source, _) => Some(source),
        }
    }
}

impl From<ShovelError> for ReplicatorError {
    fn from(err: ShovelError) -> Self {
        ReplicatorError::Shovel(err)
    }
}

impl From<std::io::Error> for ReplicatorError {
    fn from(err: std::io::Error) -> Self {
        ReplicatorError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<serde_json::Error> for ReplicatorError {
    fn from(err: serde_json::Error) -> Self {
        ReplicatorError::Json(err, CapturedBacktrace::capture())
    }
}
