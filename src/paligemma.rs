//! PaliGemma backend built on `kornia-vlm`.

use crate::{
    acquisition::CanonicalImage,
    device::{ComputeDevice, Precision},
    model::{ModelLoader, VqaModel, strip_control_tokens},
    session::{DEFAULT_MODEL_ID, SessionConfig},
};
use kornia_vlm::paligemma::{Paligemma, PaligemmaConfig, PaligemmaError};

/// Image and prompt handed to PaliGemma; the model preprocesses both internally.
pub struct PaligemmaInputs<'a> {
    image: &'a CanonicalImage,
    prompt: String,
}

/// [`VqaModel`] backed by kornia's PaliGemma implementation.
pub struct PaligemmaModel {
    model: Paligemma,
    device: ComputeDevice,
    precision: Precision,
}

impl VqaModel for PaligemmaModel {
    type Inputs<'a> = PaligemmaInputs<'a>;
    type Output = String;
    type Error = PaligemmaError;

    fn encode<'a>(
        &mut self,
        image: &'a CanonicalImage,
        question: &str,
    ) -> Result<Self::Inputs<'a>, Self::Error> {
        Ok(PaligemmaInputs {
            image,
            prompt: question.to_string(),
        })
    }

    fn generate(
        &mut self,
        inputs: Self::Inputs<'_>,
        max_length: usize,
    ) -> Result<Self::Output, Self::Error> {
        self.model
            .inference(inputs.image, &inputs.prompt, max_length, false)
    }

    fn decode(&self, output: Self::Output) -> Result<String, Self::Error> {
        Ok(strip_control_tokens(&output))
    }

    fn device(&self) -> ComputeDevice {
        self.device
    }

    fn precision(&self) -> Precision {
        self.precision
    }
}

/// Whether a CUDA context can actually be created on `ordinal`.
///
/// Always false unless the crate is built with the `cuda` feature.
pub fn cuda_usable(ordinal: usize) -> bool {
    candle_core::Device::new_cuda(ordinal).is_ok()
}

/// Loads PaliGemma weights and tokenizer from the Hugging Face hub.
///
/// kornia-vlm places the model itself: CUDA with bf16 weights when a GPU can be
/// opened, the CPU with f32 weights otherwise. The loader applies the same runtime
/// check so the session reports that placement rather than the requested one.
#[derive(Clone, Debug, Default)]
pub struct PaligemmaLoader;

impl ModelLoader for PaligemmaLoader {
    type Model = PaligemmaModel;
    type Error = PaligemmaError;

    fn select_device(&self) -> ComputeDevice {
        ComputeDevice::prefer_cuda(cuda_usable)
    }

    fn load(
        &self,
        config: &SessionConfig,
        device: ComputeDevice,
        precision: Precision,
    ) -> Result<Self::Model, Self::Error> {
        if config.model_id != DEFAULT_MODEL_ID {
            log::warn!(
                "kornia-vlm resolves its own PaliGemma checkpoint, ignoring model id {}",
                config.model_id
            );
        }
        let placed = self.select_device();
        if placed != device {
            log::warn!("Requested {} but PaliGemma will run on {}", device, placed);
        }
        let placed_precision = Precision::for_device(placed);
        if placed_precision != precision {
            log::debug!("Loading {} weights instead of {}", placed_precision, precision);
        }

        let model = Paligemma::new(PaligemmaConfig::default())?;
        Ok(PaligemmaModel {
            model,
            device: placed,
            precision: placed_precision,
        })
    }
}
