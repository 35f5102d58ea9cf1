//! The inference pipeline: encode, timed generation, decode.

use crate::{
    acquisition::CanonicalImage,
    error::{ValidationError, VqaError},
    model::VqaModel,
    session::ModelSession,
};
use std::time::{Duration, Instant};

/// A user question, trimmed and guaranteed non-empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Trims `text`, rejecting it if nothing is left.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The trimmed question text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Answer produced by a successful inference.
#[derive(Clone, Debug, PartialEq)]
pub struct InferenceResult {
    /// Decoded answer text.
    pub answer: String,
    /// Wall-clock time spent in generation only.
    pub latency: Duration,
}

impl InferenceResult {
    /// Generation latency in seconds.
    pub fn latency_secs(&self) -> f64 {
        self.latency.as_secs_f64()
    }

    /// Latency in seconds with two decimals, e.g. `1.23s`.
    pub fn latency_display(&self) -> String {
        format!("{:.2}s", self.latency_secs())
    }
}

/// Answers `question` about `image` with the session's model.
///
/// Only the generation step is timed. Failures in any step come back as
/// [`VqaError::Inference`] and never as answer text.
pub fn run_inference<M: VqaModel>(
    session: &mut ModelSession<M>,
    image: &CanonicalImage,
    question: &Question,
) -> Result<InferenceResult, VqaError> {
    let max_length = session.max_length();
    let model = session.model_mut();

    log::debug!("Encoding question and image");
    let inputs = model
        .encode(image, question.as_str())
        .map_err(|e| VqaError::Inference(Box::new(e)))?;

    let start_time = Instant::now();
    let output = model
        .generate(inputs, max_length)
        .map_err(|e| VqaError::Inference(Box::new(e)))?;
    let latency = start_time.elapsed();
    log::debug!("Generation completed in {:?}", latency);

    let answer = model
        .decode(output)
        .map_err(|e| VqaError::Inference(Box::new(e)))?;

    Ok(InferenceResult { answer, latency })
}
