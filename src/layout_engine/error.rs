use thiserror::Error;

use super::{StackId, ToplevelKey};
use crate::model::{Entity, Rect};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TilingError {
    #[error("Stale entity: {0}")]
    StaleEntity(Entity),
    #[error("Stale stack: {0:?}")]
    StaleStack(StackId),
    #[error("Structural violation: {0}")]
    StructuralViolation(String),
    #[error("Geometry out of bounds: {rect} is outside {bounds}")]
    GeometryOutOfBounds { rect: Rect, bounds: Rect },
    #[error("Window {0} has no monitor association")]
    MissingMonitorAssociation(Entity),
    #[error("Unknown monitor: {0}")]
    UnknownMonitor(u32),
    #[error("Window {0} is not tiled")]
    NotTiled(Entity),
    #[error("No toplevel for {0:?}")]
    NoToplevel(ToplevelKey),
}

impl TilingError {
    /// Stale handles are expected under racing host events and only worth a
    /// debug line.
    pub fn is_stale(&self) -> bool {
        matches!(self, TilingError::StaleEntity(_) | TilingError::StaleStack(_))
    }
}
