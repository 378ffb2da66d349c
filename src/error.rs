use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    #[error("number of clusters must be at least 1")]
    ZeroClusters,

    #[error("cannot select {k} clusters from {available} unique points")]
    TooManyClusters { k: usize, available: usize },

    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("images must have the same dimensions, got {}x{} and {}x{}", left.0, left.1, right.0, right.1)]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("image dimensions cannot be zero")]
    ZeroDimension,

    #[error("pixel buffer length {len} does not match dimensions {width}x{height}")]
    BufferSizeMismatch {
        len: usize,
        width: usize,
        height: usize,
    },

    #[error("colors must be between 1 and 256, got {0}")]
    InvalidColorCount(usize),

    #[error("{name} must be in (0, 1), got {value}")]
    InvalidFactor { name: &'static str, value: f32 },

    #[error("clustering cancelled after {iterations} iterations")]
    Cancelled { iterations: usize },
}

impl ClusterError {
    /// Whether this error is a precondition violation raised before any
    /// clustering work was done.
    pub fn is_invalid_argument(&self) -> bool {
        !matches!(self, Self::Cancelled { .. })
    }
}

pub type Result<T, E = ClusterError> = std::result::Result<T, E>;
