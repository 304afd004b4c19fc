use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("event log error: {0}")]
    Log(#[from] tortuga_store::LogError),
    #[error("record encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}
