#![allow(dead_code)]

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use kornia_vqa::{
    CanonicalImage, ComputeDevice, ModelLoader, Precision, SessionConfig, VqaModel,
    strip_control_tokens,
};
use std::{
    io::Cursor,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub String);

#[derive(Default, Debug)]
pub struct Counters {
    pub loads: AtomicUsize,
    pub encodes: AtomicUsize,
    pub generates: AtomicUsize,
}

impl Counters {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of times the pipeline reached the model.
    pub fn pipeline_calls(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }

    pub fn generates(&self) -> usize {
        self.generates.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub enum Behavior {
    /// Answers with the given text wrapped in control tokens.
    Answer(String),
    /// Never emits end-of-sequence; produces exactly `max_length` tokens.
    Endless,
    /// Generation fails with the given message.
    FailGenerate(String),
    /// Encoding fails with the given message.
    FailEncode(String),
    /// Decoding fails with the given message.
    FailDecode(String),
    /// Encoding and decoding each take the given time; generation is instant.
    SlowEncodeDecode(Duration),
}

pub struct MockInputs {
    pixels: usize,
    prompt: String,
}

pub struct MockModel {
    counters: Arc<Counters>,
    behavior: Behavior,
    device: ComputeDevice,
    precision: Precision,
}

impl VqaModel for MockModel {
    type Inputs<'a> = MockInputs;
    type Output = String;
    type Error = MockError;

    fn encode<'a>(
        &mut self,
        image: &'a CanonicalImage,
        question: &str,
    ) -> Result<Self::Inputs<'a>, Self::Error> {
        self.counters.encodes.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::FailEncode(message) => return Err(MockError(message.clone())),
            Behavior::SlowEncodeDecode(delay) => std::thread::sleep(*delay),
            _ => {}
        }
        Ok(MockInputs {
            pixels: image.as_slice().len(),
            prompt: question.to_string(),
        })
    }

    fn generate(
        &mut self,
        inputs: Self::Inputs<'_>,
        max_length: usize,
    ) -> Result<Self::Output, Self::Error> {
        self.counters.generates.fetch_add(1, Ordering::SeqCst);
        assert!(inputs.pixels > 0);
        assert!(!inputs.prompt.is_empty());

        match &self.behavior {
            Behavior::Endless => Ok(vec!["tok"; max_length].join(" ")),
            Behavior::FailGenerate(message) => Err(MockError(message.clone())),
            Behavior::Answer(text) => Ok(format!("<bos>{text}<eos><pad>")),
            _ => Ok("<bos>ok<eos>".to_string()),
        }
    }

    fn decode(&self, output: Self::Output) -> Result<String, Self::Error> {
        match &self.behavior {
            Behavior::FailDecode(message) => return Err(MockError(message.clone())),
            Behavior::SlowEncodeDecode(delay) => std::thread::sleep(*delay),
            _ => {}
        }
        Ok(strip_control_tokens(&output))
    }

    fn device(&self) -> ComputeDevice {
        self.device
    }

    fn precision(&self) -> Precision {
        self.precision
    }
}

#[derive(Clone)]
pub struct MockLoader {
    pub counters: Arc<Counters>,
    pub behavior: Behavior,
    pub fail: Arc<AtomicBool>,
    /// Whether a GPU can be opened; when false the model lands on the CPU.
    pub gpu_present: bool,
}

impl MockLoader {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            behavior,
            fail: Arc::new(AtomicBool::new(false)),
            gpu_present: false,
        }
    }

    pub fn with_gpu(mut self, gpu_present: bool) -> Self {
        self.gpu_present = gpu_present;
        self
    }

    pub fn answering(text: &str) -> Self {
        Self::new(Behavior::Answer(text.to_string()))
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl ModelLoader for MockLoader {
    type Model = MockModel;
    type Error = MockError;

    fn select_device(&self) -> ComputeDevice {
        ComputeDevice::prefer_cuda(|_| self.gpu_present)
    }

    fn load(
        &self,
        _config: &SessionConfig,
        device: ComputeDevice,
        precision: Precision,
    ) -> Result<Self::Model, Self::Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MockError("weights not found".to_string()));
        }
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        // without a GPU the weights fall back to the CPU at full precision
        let (device, precision) = if device.is_accelerated() && !self.gpu_present {
            (ComputeDevice::Cpu, Precision::F32)
        } else {
            (device, precision)
        };
        Ok(MockModel {
            counters: self.counters.clone(),
            behavior: self.behavior.clone(),
            device,
            precision,
        })
    }
}

pub fn solid_rgb(width: u32, height: u32, pixel: [u8; 3], format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb(pixel)));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).expect("encode test image");
    buf.into_inner()
}

pub fn red_square_jpeg() -> Vec<u8> {
    solid_rgb(224, 224, [255, 0, 0], ImageFormat::Jpeg)
}
