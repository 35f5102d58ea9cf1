use thiserror::Error;

/// Boxed error produced by a model backend.
pub type BoxedModelError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Reasons the ask action is refused before the pipeline is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No model session has been loaded yet.
    #[error("the model is not loaded, load it first")]
    ModelNotLoaded,
    /// No image has been selected.
    #[error("no image selected, pick an image first")]
    NoImage,
    /// The question is empty after trimming.
    #[error("the question is empty")]
    EmptyQuestion,
}

/// Errors surfaced to the caller by image acquisition, session loading and inference.
#[derive(Debug, Error)]
pub enum VqaError {
    /// The image URL could not be fetched: timeout, connection failure or non-2xx status.
    #[error("failed to fetch image: {0}")]
    Network(#[source] reqwest::Error),

    /// The bytes are not a supported raster image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The model or its preprocessor could not be loaded.
    #[error("failed to load model: {0}")]
    ModelLoad(#[source] BoxedModelError),

    /// Encoding, generation or decoding failed.
    #[error("inference failed: {0}")]
    Inference(#[source] BoxedModelError),

    /// A precondition of the ask action is not met.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl VqaError {
    /// Short machine-readable tag for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            VqaError::Network(_) => "network",
            VqaError::Decode(_) => "decode",
            VqaError::ModelLoad(_) => "model_load",
            VqaError::Inference(_) => "inference",
            VqaError::Validation(_) => "validation",
        }
    }
}
