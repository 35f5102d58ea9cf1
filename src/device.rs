use std::fmt;

/// Compute device the model is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComputeDevice {
    /// General-purpose CPU execution.
    Cpu,
    /// CUDA device by ordinal.
    Cuda(usize),
}

impl ComputeDevice {
    /// Picks CUDA ordinal 0 when `cuda_usable` reports a working device, otherwise the CPU.
    ///
    /// The check runs once; callers record the result instead of asking again per request.
    pub fn prefer_cuda<F: FnOnce(usize) -> bool>(cuda_usable: F) -> Self {
        if cuda_usable(0) {
            ComputeDevice::Cuda(0)
        } else {
            ComputeDevice::Cpu
        }
    }

    /// Whether this is an accelerator.
    pub fn is_accelerated(&self) -> bool {
        matches!(self, ComputeDevice::Cuda(_))
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Cpu => write!(f, "cpu"),
            ComputeDevice::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

/// Floating point precision used for model weights and encoded inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precision {
    /// 32-bit floats.
    F32,
    /// bfloat16, half the memory of F32.
    BF16,
}

impl Precision {
    /// Reduced precision on accelerators, full precision on the CPU.
    ///
    /// The CPU stays at F32 because candle's CPU kernels have no fast bf16 path.
    pub fn for_device(device: ComputeDevice) -> Self {
        if device.is_accelerated() {
            Precision::BF16
        } else {
            Precision::F32
        }
    }

    /// Returns the precision as a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::F32 => "f32",
            Precision::BF16 => "bf16",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
