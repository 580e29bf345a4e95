use thiserror_no_std::Error;

/// Errors reported by [`crate::ring::ByteRing`].
///
/// Running out of space is not an error: writes are shortened and the shortfall is counted
/// instead, so acquisition never stalls behind a slow consumer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// The backing storage is empty or not smaller than [`crate::ring::MAX_SIZE`].
    #[error("Invalid ring buffer size {size} (must be 1..{max})")]
    InvalidSize { size: usize, max: usize },

    /// The buffer was used before [`crate::ring::ByteRing::init`].
    #[error("Ring buffer is not initialized")]
    NotInitialized,

    /// Another read or write is in progress; retry later.
    #[error("Ring buffer is busy")]
    Busy,
}
