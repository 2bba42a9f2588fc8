#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to (de)serialize record: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Stored record under {key} is not a JSON object")]
    NotAnObject { key: String },
}
