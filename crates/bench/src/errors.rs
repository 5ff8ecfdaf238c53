use attention::AttentionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BenchmarkError>;

/// Everything that can stop a benchmark from producing a latency.
#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("kernel library error: {0}")]
    Library(#[from] AttentionError),

    #[error("device error: {0}")]
    Device(#[from] candle_core::Error),

    #[error("timer error: {0}")]
    Timer(String),

    #[error("invalid configuration: {}", .0.join("; "))]
    Config(Vec<String>),

    #[error("unsupported configuration format: {0}")]
    ConfigFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde_json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BenchmarkError {
    /// True when the workload itself was rejected before touching the device.
    pub fn is_precondition(&self) -> bool {
        matches!(self, BenchmarkError::Precondition(_))
    }
}

/// Fail with [`BenchmarkError::Precondition`] unless `cond` holds.
pub(crate) fn ensure(cond: bool, message: impl FnOnce() -> String) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(BenchmarkError::Precondition(message()))
    }
}
