//! Scratch memory handed to the batch wrappers.

use candle_core::{DType, Device, Tensor};

use crate::core::AttentionError;

/// Workspace size used by the prefill wrappers.
pub const PREFILL_WORKSPACE_BYTES: usize = 16 * 1024 * 1024;
/// Workspace size used by the paged decode wrapper.
pub const DECODE_WORKSPACE_BYTES: usize = 32 * 1024 * 1024;

/// Opaque device buffer reserved for intermediate results.
///
/// The size is a contract of the wrapper, not a function of the workload.
#[derive(Debug, Clone)]
pub struct WorkspaceBuffer {
    buffer: Tensor,
}

impl WorkspaceBuffer {
    pub fn new(bytes: usize, device: &Device) -> Result<Self, AttentionError> {
        if bytes == 0 {
            return Err(AttentionError::shape("workspace buffer must not be empty"));
        }
        let buffer = Tensor::zeros(bytes, DType::U8, device)?;
        Ok(Self { buffer })
    }

    pub fn bytes(&self) -> usize {
        self.buffer.elem_count()
    }

    pub fn device(&self) -> &Device {
        self.buffer.device()
    }

    pub(crate) fn check_device(&self, tensor: &Tensor) -> Result<(), AttentionError> {
        if self.device().same_device(tensor.device()) {
            Ok(())
        } else {
            Err(AttentionError::shape(
                "inputs must reside on the workspace device",
            ))
        }
    }
}
