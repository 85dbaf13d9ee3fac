use thiserror::Error;

/// Errors raised by policies, value functions and trainers.
///
/// Every variant is fatal to the call that produced it. Running a learner on a
/// replay buffer that is still filling up is not an error and never shows up here.
#[derive(Error, Debug)]
pub enum RlError {
    /// A component was configured with spaces or settings it cannot support.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown parameter '{name}' for {component}")]
    InvalidParameter { component: String, name: String },

    /// An optional backend (e.g. an interactive input source) is unavailable.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("cannot sample {requested} records from a replay buffer holding {available}")]
    InsufficientData { requested: usize, available: usize },

    #[error("shape mismatch in '{field}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        field: String,
        expected: Vec<i64>,
        actual: Vec<i64>,
    },

    #[error("trajectory is missing '{0}'")]
    MissingField(&'static str),

    #[error("index out of range for {what}: {index} not in [0, {bound})")]
    IndexOutOfRange {
        what: &'static str,
        index: i64,
        bound: i64,
    },

    #[error("tensor error: {0}")]
    Tensor(#[from] tch::TchError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RlError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        RlError::Configuration(msg.into())
    }

    pub(crate) fn invalid_parameter(component: &str, name: &str) -> Self {
        RlError::InvalidParameter {
            component: component.to_string(),
            name: name.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RlError>;
