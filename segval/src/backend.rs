//! Backend selection for the evaluation binary.
//!
//! Feature flags pick the Burn backend at compile time; everything in
//! the library stays generic over `Backend`. Only the backend type and
//! its log name vary per feature — the device always comes from the
//! backend's associated type.

use burn::tensor::backend::Backend;
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        /// Backend selected by feature flags.
        pub type EvalBackend = burn::backend::Cuda;
        /// Backend name for logging.
        pub const BACKEND_NAME: &str = "CUDA (NVIDIA GPU)";
    } else if #[cfg(feature = "wgpu")] {
        /// Backend selected by feature flags.
        pub type EvalBackend = burn::backend::Wgpu;
        /// Backend name for logging.
        pub const BACKEND_NAME: &str = "WGPU (GPU)";
    } else {
        /// Backend selected by feature flags.
        pub type EvalBackend = burn::backend::NdArray;
        /// Backend name for logging.
        pub const BACKEND_NAME: &str = "NdArray (CPU)";
    }
}

/// Device type matching [`EvalBackend`].
pub type EvalDevice = <EvalBackend as Backend>::Device;

/// Creates the default device for the selected backend.
pub fn create_device() -> EvalDevice {
    EvalDevice::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_device_matches_the_selected_backend() {
        let device = create_device();
        assert_eq!(device, EvalDevice::default());
        assert!(!BACKEND_NAME.is_empty());
    }
}
