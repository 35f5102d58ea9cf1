use crate::{
    acquisition::CanonicalImage,
    device::{ComputeDevice, Precision},
    session::SessionConfig,
};

/// Control tokens a vision-language tokenizer may leave in generated text.
pub const CONTROL_TOKENS: &[&str] = &[
    "<bos>",
    "<eos>",
    "<pad>",
    "<unk>",
    "<image>",
    "<start_of_turn>",
    "<end_of_turn>",
];

/// Trait for vision-language models that answer questions about images.
///
/// Implementors split inference into the three steps the pipeline times
/// separately: only [`VqaModel::generate`] is covered by the latency measurement.
pub trait VqaModel {
    /// Encoded image and question, already placed on the model's device.
    type Inputs<'a>;
    /// Raw generation output, e.g. token ids or undecoded text.
    type Output;
    /// The error type that can be returned during inference.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Jointly encodes the image and question into the model's input representation.
    fn encode<'a>(
        &mut self,
        image: &'a CanonicalImage,
        question: &str,
    ) -> Result<Self::Inputs<'a>, Self::Error>;

    /// Runs generation without gradient bookkeeping, stopping at end-of-sequence or
    /// after `max_length` tokens, whichever comes first.
    fn generate(
        &mut self,
        inputs: Self::Inputs<'_>,
        max_length: usize,
    ) -> Result<Self::Output, Self::Error>;

    /// Decodes the generation output into plain text without control tokens.
    fn decode(&self, output: Self::Output) -> Result<String, Self::Error>;

    /// Device the weights actually live on.
    fn device(&self) -> ComputeDevice;

    /// Precision the weights were actually loaded with.
    fn precision(&self) -> Precision;
}

/// Builds a [`VqaModel`] bound to a device and precision.
pub trait ModelLoader {
    /// The model type this loader produces.
    type Model: VqaModel;
    /// The error type that can be returned while loading.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Picks the device to load onto, checking at runtime which devices are usable.
    ///
    /// Called once when the application starts. Loaders without accelerator support
    /// keep the default, the CPU.
    fn select_device(&self) -> ComputeDevice {
        ComputeDevice::Cpu
    }

    /// Loads the model, preferring `device` and `precision`.
    ///
    /// The returned model reports where it really ended up through
    /// [`VqaModel::device`] and [`VqaModel::precision`].
    fn load(
        &self,
        config: &SessionConfig,
        device: ComputeDevice,
        precision: Precision,
    ) -> Result<Self::Model, Self::Error>;
}

/// Removes [`CONTROL_TOKENS`] from `text` and trims surrounding whitespace.
pub fn strip_control_tokens(text: &str) -> String {
    let mut cleaned = text.to_string();
    for token in CONTROL_TOKENS {
        if cleaned.contains(token) {
            cleaned = cleaned.replace(token, "");
        }
    }
    cleaned.trim().to_string()
}
