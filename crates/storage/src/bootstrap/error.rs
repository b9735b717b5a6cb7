#![forbid(unsafe_code)]

/// Fatal bootstrap failures. Any of these means the schema cannot be
/// guaranteed and the host must not start serving traffic.
#[derive(Debug)]
pub enum BootstrapError {
    Io(std::io::Error),
    Connection(rusqlite::Error),
    Probe(rusqlite::Error),
    Structural {
        object: String,
        source: rusqlite::Error,
    },
}

impl BootstrapError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Connection(_) => "CONNECTION",
            Self::Probe(_) => "PROBE",
            Self::Structural { .. } => "STRUCTURAL",
        }
    }
}

impl std::fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Connection(err) => write!(f, "connection: {err}"),
            Self::Probe(err) => write!(f, "schema probe: {err}"),
            Self::Structural { object, source } => {
                write!(f, "structural mutation failed on {object}: {source}")
            }
        }
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Connection(err) | Self::Probe(err) => Some(err),
            Self::Structural { source, .. } => Some(source),
        }
    }
}

impl From<std::io::Error> for BootstrapError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Failures in best-effort phases (seeding, backfill, one-time
/// migrations). Logged and carried in the report; never fatal.
#[derive(Debug)]
pub(crate) enum StepError {
    Sql(rusqlite::Error),
    InvalidDefault {
        key: &'static str,
        detail: String,
    },
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::InvalidDefault { key, detail } => {
                write!(f, "invalid default for setting {key}: {detail}")
            }
        }
    }
}

impl From<rusqlite::Error> for StepError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

/// One recorded non-fatal failure, surfaced through the bootstrap
/// report for operator-facing diagnostics.
#[derive(Clone, Debug)]
pub struct StepFailure {
    pub step: &'static str,
    pub detail: String,
}

impl StepFailure {
    pub(crate) fn new(step: &'static str, detail: impl std::fmt::Display) -> Self {
        Self {
            step,
            detail: detail.to_string(),
        }
    }
}
