use crate::{
    acquisition::DEFAULT_FETCH_TIMEOUT,
    device::{ComputeDevice, Precision},
    error::VqaError,
    model::{ModelLoader, VqaModel},
};
use std::time::{Duration, Instant};

/// Hub identifier of the default model.
pub const DEFAULT_MODEL_ID: &str = "google/paligemma-3b-mix-224";

/// Hard cap on generated tokens.
pub const DEFAULT_MAX_LENGTH: usize = 496;

/// Human-readable size of the default model.
pub const MODEL_SIZE_LABEL: &str = "3B parameters";

/// Configuration for loading a model session and serving requests with it.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Identifier of the model in the model registry.
    pub model_id: String,
    /// Maximum number of tokens a single generation may produce.
    pub max_length: usize,
    /// Timeout for fetching images from URLs.
    pub fetch_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            max_length: DEFAULT_MAX_LENGTH,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// A loaded model together with the device and precision it is bound to.
///
/// Never mutated after construction apart from the model's own inference state;
/// a reload builds a new session and replaces the old one wholesale.
pub struct ModelSession<M: VqaModel> {
    model: M,
    model_id: String,
    max_length: usize,
    load_time: Duration,
}

impl<M: VqaModel> ModelSession<M> {
    /// Loads the model described by `config`, asking for `device`.
    ///
    /// This is the expensive step (seconds to minutes on first run, as weights may be
    /// downloaded). Callers keep the returned session for the process lifetime.
    pub fn acquire<L>(
        loader: &L,
        config: &SessionConfig,
        device: ComputeDevice,
    ) -> Result<Self, VqaError>
    where
        L: ModelLoader<Model = M>,
    {
        let precision = Precision::for_device(device);
        log::info!(
            "Loading model {} on {} ({})",
            config.model_id,
            device,
            precision
        );

        let start_time = Instant::now();
        let model = loader
            .load(config, device, precision)
            .map_err(|e| VqaError::ModelLoad(Box::new(e)))?;
        let load_time = start_time.elapsed();

        if model.device() != device || model.precision() != precision {
            log::warn!(
                "Model placed on {} ({}) instead of {} ({})",
                model.device(),
                model.precision(),
                device,
                precision
            );
        }
        log::info!("Model loaded in {:.2}s", load_time.as_secs_f64());

        Ok(Self {
            model,
            model_id: config.model_id.clone(),
            max_length: config.max_length,
            load_time,
        })
    }

    /// Registry identifier the session was loaded from.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Device the model actually runs on, as reported by the backend.
    pub fn device(&self) -> ComputeDevice {
        self.model.device()
    }

    /// Precision the model was actually loaded with, as reported by the backend.
    pub fn precision(&self) -> Precision {
        self.model.precision()
    }

    /// Cap on generated tokens for every request served by this session.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Wall-clock time the load took.
    pub fn load_time(&self) -> Duration {
        self.load_time
    }

    pub(crate) fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }
}

/// Holder for at most one [`ModelSession`].
pub struct SessionSlot<M: VqaModel> {
    session: Option<ModelSession<M>>,
}

impl<M: VqaModel> Default for SessionSlot<M> {
    fn default() -> Self {
        Self { session: None }
    }
}

impl<M: VqaModel> SessionSlot<M> {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a session is present.
    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    /// The current session, if any.
    pub fn get(&self) -> Option<&ModelSession<M>> {
        self.session.as_ref()
    }

    /// The current session for inference, if any.
    pub fn get_mut(&mut self) -> Option<&mut ModelSession<M>> {
        self.session.as_mut()
    }

    /// Returns the loaded session, loading it first if the slot is empty.
    pub fn get_or_load<L>(
        &mut self,
        loader: &L,
        config: &SessionConfig,
        device: ComputeDevice,
    ) -> Result<&mut ModelSession<M>, VqaError>
    where
        L: ModelLoader<Model = M>,
    {
        let session = match self.session.take() {
            Some(session) => {
                log::debug!("Model already loaded, reusing session");
                session
            }
            None => ModelSession::acquire(loader, config, device)?,
        };
        Ok(self.session.insert(session))
    }

    /// Loads a fresh session and replaces the current one.
    ///
    /// On failure the previous session, if any, is left in place.
    pub fn reload<L>(
        &mut self,
        loader: &L,
        config: &SessionConfig,
        device: ComputeDevice,
    ) -> Result<&mut ModelSession<M>, VqaError>
    where
        L: ModelLoader<Model = M>,
    {
        let session = ModelSession::acquire(loader, config, device)?;
        Ok(self.session.insert(session))
    }
}
