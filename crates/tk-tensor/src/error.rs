use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: String, got: String },
    #[error("cannot broadcast shapes {a:?} and {b:?}")]
    BroadcastError { a: Vec<usize>, b: Vec<usize> },
    #[error("dimension {dim} has zero extent")]
    ZeroExtent { dim: usize },
    #[error("rank {rank} exceeds the maximum of {max} dimensions")]
    RankTooLarge { rank: usize, max: usize },
    #[error("invalid stride {stride} for dimension {dim}: {reason}")]
    InvalidStride {
        dim: usize,
        stride: usize,
        reason: String,
    },
    #[error("tensor descriptor is not resizable")]
    NotResizable,
    #[error("coordinates {coords:?} out of bounds for shape {shape:?}")]
    OutOfBounds { coords: Vec<isize>, shape: Vec<usize> },
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
