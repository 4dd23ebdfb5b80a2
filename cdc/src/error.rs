//! Error type of the DDL coordinator and its collaborators.
//!
//! Every failure is a [`CdcError`] classified by an [`ErrorKind`]. Errors raised by the
//! schema store, the redo log or the sink travel through the coordinator unchanged, so the
//! owner of a changefeed decides on the kind alone whether a tick is worth retrying.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for changefeed operations using [`CdcError`] as the error type.
pub type CdcResult<T> = Result<T, CdcError>;

/// Categories of errors raised while coordinating DDL.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Schema
    SchemaStoreError,
    SnapshotLost,
    InvalidDdlJob,
    DdlOutOfOrder,

    // Collaborators
    DdlSourceError,
    RedoLogError,
    DdlSinkError,
    DdlSinkPanic,

    // Configuration
    UnsupportedDownstream,
    ConfigError,

    // Coordinator state
    InvalidState,
    CoordinatorWorkerPanic,

    Unknown,

    /// Raised by fail points configured to return.
    #[cfg(feature = "failpoints")]
    InjectedFailure,
}

/// Error of a changefeed operation.
///
/// Carries a static description, an optional dynamic detail, an optional source and the
/// location it was created at. Two errors are equal when their kinds are.
#[derive(Debug, Clone)]
pub struct CdcError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

impl CdcError {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Returns where the error was created.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches the error that caused this one.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        CdcError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }
}

impl PartialEq for CdcError {
    fn eq(&self, other: &CdcError) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for CdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        if let Some(detail) = &self.detail {
            write_block(f, "Detail", detail)?;
        }
        if let Some(source) = &self.source {
            write_block(f, "Caused by", &source.to_string())?;
        }

        let backtrace = self.backtrace.to_string();
        if !backtrace.trim().is_empty() {
            write_block(f, "Backtrace", &backtrace)?;
        }

        Ok(())
    }
}

impl error::Error for CdcError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Writes `content` under an indented `label:` line.
fn write_block(f: &mut fmt::Formatter<'_>, label: &str, content: &str) -> fmt::Result {
    if content.trim().is_empty() {
        return write!(f, "\n  {label}: <empty>");
    }

    write!(f, "\n  {label}:")?;
    for line in content.lines() {
        if line.trim().is_empty() {
            write!(f, "\n    ")?;
        } else {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

impl From<(ErrorKind, &'static str)> for CdcError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> CdcError {
        CdcError::from_components(kind, Cow::Borrowed(description), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for CdcError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, D)) -> CdcError {
        CdcError::from_components(kind, Cow::Borrowed(description), Some(detail.into()), None)
    }
}

/// Panicked tasks map to [`ErrorKind::CoordinatorWorkerPanic`], cancelled tasks to
/// [`ErrorKind::InvalidState`].
impl From<tokio::task::JoinError> for CdcError {
    #[track_caller]
    fn from(err: tokio::task::JoinError) -> CdcError {
        let (kind, description) = if err.is_panic() {
            (ErrorKind::CoordinatorWorkerPanic, "Background task panicked")
        } else {
            (ErrorKind::InvalidState, "Background task was cancelled")
        };

        let detail = err.to_string();
        CdcError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<cdc_config::shared::ValidationError> for CdcError {
    #[track_caller]
    fn from(err: cdc_config::shared::ValidationError) -> CdcError {
        let detail = err.to_string();
        CdcError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid changefeed configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
