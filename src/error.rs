use crate::animation::ValidationError;
use crate::storage::PersistenceError;

/// Crate-wide error type.
///
/// Validation and persistence failures keep their own enums so callers can match on the
/// exact reason; this type wraps them for code paths that can fail in more than one way.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An upload or persisted animation was rejected.
    #[display("invalid animation: {_0}")]
    #[from]
    Validation(ValidationError),

    /// Loading or saving the persisted animation failed.
    #[display("persistence failed: {_0}")]
    #[from]
    Persistence(PersistenceError),

    /// A [`PixelSink`](crate::player::PixelSink) did not accept a frame.
    #[display("LED output failed")]
    LedOutput,

    /// An embassy task could not be spawned (its pool is exhausted).
    #[cfg(feature = "arm")]
    #[display("task spawn failed")]
    #[from]
    TaskSpawn(#[error(not(source))] embassy_executor::SpawnError),
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;
