use thiserror::Error;

pub type Result<T, E = NetTrayError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
///
/// Network faults never show up here: the probe folds them into
/// [`ProbeResult`](crate::probe::ProbeResult) instead.
#[derive(Debug, Error)]
pub enum NetTrayError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("probe error: {0}")]
    Probe(String),
    #[error("monitor error: {0}")]
    Monitor(String),
    #[error("chart error: {0}")]
    Chart(String),
    #[error("operational error: {0}")]
    Ops(String),
}
