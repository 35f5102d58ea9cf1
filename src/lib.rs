#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! The crate answers natural-language questions about images with a pretrained
//! vision-language model. It is split into:
//!
//! - [`acquisition`]: uploads, URLs and camera captures normalised to an RGB image
//! - [`session`]: the model, loaded once and bound to a compute device
//! - [`pipeline`]: encode, timed generation and decode
//! - [`app`]: the state a front end drives, with the ask-action gates
//!
//! Models plug in through the [`VqaModel`] and [`ModelLoader`] traits. The PaliGemma
//! backend is available with the `paligemma` feature.

pub mod acquisition;
pub mod app;
pub mod device;
pub mod error;
pub mod model;
#[cfg(feature = "paligemma")]
pub mod paligemma;
pub mod pipeline;
pub mod session;

pub use acquisition::{
    CanonicalImage, DEFAULT_FETCH_TIMEOUT, ImageFetcher, ImageSource, MAX_IMAGE_BYTES,
    decode_image,
};
pub use app::{AppStatus, VqaApp};
pub use device::{ComputeDevice, Precision};
pub use error::{ValidationError, VqaError};
pub use model::{ModelLoader, VqaModel, strip_control_tokens};
pub use pipeline::{InferenceResult, Question, run_inference};
pub use session::{
    DEFAULT_MAX_LENGTH, DEFAULT_MODEL_ID, MODEL_SIZE_LABEL, ModelSession, SessionConfig,
    SessionSlot,
};
