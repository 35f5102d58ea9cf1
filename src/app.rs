use crate::{
    acquisition::{CanonicalImage, ImageFetcher, ImageSource},
    device::ComputeDevice,
    error::{ValidationError, VqaError},
    model::ModelLoader,
    pipeline::{InferenceResult, Question, run_inference},
    session::{ModelSession, SessionConfig, SessionSlot},
};

/// Readiness of the application for the ask action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppStatus {
    /// No model session has been loaded.
    ModelNotLoaded,
    /// The model is loaded but no image is selected.
    AwaitingImage,
    /// A question can be asked.
    Ready,
}

impl AppStatus {
    /// Returns the status as a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::ModelNotLoaded => "model_not_loaded",
            AppStatus::AwaitingImage => "awaiting_image",
            AppStatus::Ready => "ready",
        }
    }
}

/// State behind a visual question answering front end.
///
/// Holds the model session, the current image selection and the device picked at
/// construction. Every method runs to completion; callers serialise user actions.
pub struct VqaApp<L: ModelLoader> {
    loader: L,
    config: SessionConfig,
    device: ComputeDevice,
    fetcher: ImageFetcher,
    session: SessionSlot<L::Model>,
    image: Option<CanonicalImage>,
}

impl<L: ModelLoader> VqaApp<L> {
    /// Creates the application state, asking the loader to select the device once.
    pub fn new(loader: L, config: SessionConfig) -> Result<Self, VqaError> {
        let device = loader.select_device();
        Self::with_device(loader, config, device)
    }

    /// Creates the application state with an explicitly chosen device.
    pub fn with_device(
        loader: L,
        config: SessionConfig,
        device: ComputeDevice,
    ) -> Result<Self, VqaError> {
        let fetcher = ImageFetcher::with_timeout(config.fetch_timeout)?;
        log::info!("Using device: {}", device);

        Ok(Self {
            loader,
            config,
            device,
            fetcher,
            session: SessionSlot::new(),
            image: None,
        })
    }

    /// Device selected at startup; the loaded session reports where the model really runs.
    pub fn device(&self) -> ComputeDevice {
        self.device
    }

    /// Configuration the application was created with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The loaded model session, if any.
    pub fn session(&self) -> Option<&ModelSession<L::Model>> {
        self.session.get()
    }

    /// The currently selected image, if any.
    pub fn image(&self) -> Option<&CanonicalImage> {
        self.image.as_ref()
    }

    /// Readiness for the ask action.
    pub fn status(&self) -> AppStatus {
        if !self.session.is_loaded() {
            AppStatus::ModelNotLoaded
        } else if self.image.is_none() {
            AppStatus::AwaitingImage
        } else {
            AppStatus::Ready
        }
    }

    /// Loads the model unless a session is already present.
    pub fn load_model(&mut self) -> Result<&ModelSession<L::Model>, VqaError> {
        let session = self
            .session
            .get_or_load(&self.loader, &self.config, self.device)
            .inspect_err(|e| log::warn!("{}", e))?;
        Ok(session)
    }

    /// Loads a fresh model session, keeping the previous one if loading fails.
    pub fn reload_model(&mut self) -> Result<&ModelSession<L::Model>, VqaError> {
        let session = self
            .session
            .reload(&self.loader, &self.config, self.device)
            .inspect_err(|e| log::warn!("{}", e))?;
        Ok(session)
    }

    /// Replaces the current image with one acquired from `source`.
    ///
    /// On failure the selection is cleared and the error is returned for display.
    pub fn select_image(&mut self, source: &ImageSource) -> Result<&CanonicalImage, VqaError> {
        self.image = None;
        let image = self
            .fetcher
            .load(source)
            .inspect_err(|e| log::warn!("Could not load image from {}: {}", source.as_str(), e))?;

        log::info!(
            "Selected {}x{} image from {}",
            image.width(),
            image.height(),
            source.as_str()
        );
        Ok(self.image.insert(image))
    }

    /// Drops the current image selection.
    pub fn clear_image(&mut self) {
        self.image = None;
    }

    /// Answers `question` about the selected image.
    ///
    /// The pipeline runs only when a model is loaded, an image is selected and the
    /// question is non-empty, checked in that order.
    pub fn ask(&mut self, question: &str) -> Result<InferenceResult, VqaError> {
        let session = self
            .session
            .get_mut()
            .ok_or(ValidationError::ModelNotLoaded)?;
        let image = self.image.as_ref().ok_or(ValidationError::NoImage)?;
        let question = Question::parse(question)?;

        log::info!("Asking: {}", question.as_str());
        let result = run_inference(session, image, &question)
            .inspect_err(|e| log::warn!("{}", e))?;
        log::info!(
            "Answer in {}: {}",
            result.latency_display(),
            result.answer
        );

        Ok(result)
    }
}
