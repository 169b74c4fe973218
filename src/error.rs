use std::fmt;

/// Errors surfaced directly to the caller. Never retried.
#[derive(Debug, Clone, PartialEq)]
pub enum HeatmapError {
    /// Association could not be created (missing guid, empty sensor id)
    InvalidAssociation(String),
    /// No association with this id exists
    UnknownAssociation(String),
    /// Snapshot document could not be parsed or failed validation
    InvalidSnapshot(String),
    /// Controller was disposed and cannot be re-enabled
    Disposed,
}

impl fmt::Display for HeatmapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeatmapError::InvalidAssociation(reason) => {
                write!(f, "invalid association: {}", reason)
            }
            HeatmapError::UnknownAssociation(id) => {
                write!(f, "association '{}' not found", id)
            }
            HeatmapError::InvalidSnapshot(reason) => {
                write!(f, "invalid snapshot: {}", reason)
            }
            HeatmapError::Disposed => write!(f, "heatmap controller has been disposed"),
        }
    }
}

impl std::error::Error for HeatmapError {}
