use serde::Serialize;
use std::fmt;

/// Where speech inference runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComputeDevice {
    Cuda(u32),
    Cpu,
}

/// Numeric precision of the model weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Precision {
    Half,
    Full,
}

/// Device and precision chosen for one model load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComputePlan {
    pub device: ComputeDevice,
    pub precision: Precision,
}

impl ComputePlan {
    /// Half precision is only used together with an accelerator
    pub fn select(accelerator_available: bool) -> Self {
        if accelerator_available {
            Self {
                device: ComputeDevice::Cuda(0),
                precision: Precision::Half,
            }
        } else {
            Self {
                device: ComputeDevice::Cpu,
                precision: Precision::Full,
            }
        }
    }

    /// Probe the host for a usable CUDA device
    pub async fn detect() -> Self {
        let available =
            cfg!(feature = "cuda") && crate::utils::check_command_available("nvidia-smi").await;
        Self::select(available)
    }

    pub fn is_accelerated(&self) -> bool {
        matches!(self.device, ComputeDevice::Cuda(_))
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Cuda(index) => write!(f, "cuda:{}", index),
            ComputeDevice::Cpu => write!(f, "cpu"),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Half => write!(f, "float16"),
            Precision::Full => write!(f, "float32"),
        }
    }
}

impl fmt::Display for ComputePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.device, self.precision)
    }
}
