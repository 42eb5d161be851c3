use thiserror::Error;

#[derive(Error, Debug)]
pub enum PixelsError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Generation failed: {0}")]
    Generator(String),
}

pub type Result<T> = std::result::Result<T, PixelsError>;

// UI layers receive errors as plain messages
impl serde::Serialize for PixelsError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
