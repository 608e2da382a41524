//! Error types for tag store operations.

/// Errors surfaced to callers of the tag store.
///
/// Most failure modes degrade internally (a failed table resize disables
/// resizing and keeps going); only result-buffer exhaustion is fatal to the
/// call that triggered it.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A result buffer could not be allocated.
    #[error("out of memory while collecting results")]
    OutOfMemory,
}

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
