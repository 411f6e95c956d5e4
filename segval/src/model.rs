//! The model seam.
//!
//! The evaluator only needs logits; actual architectures live
//! downstream and implement [`Segmenter`]. [`PixelHead`] is the
//! bundled reference implementation — a per-pixel linear classifier —
//! so the binary and the integration tests run end to end.

use std::path::Path;

use burn::{
    module::Module,
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};

use crate::error::{EvalError, EvalResult};

/// A trained segmentation network, seen by the evaluator as a mapping
/// from images to class logits.
pub trait Segmenter<B: Backend> {
    /// Maps images `[n, c, h, w]` to logits `[n, num_classes, h, w]`.
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Per-pixel linear classifier: a single 1x1 convolution over the
/// input channels.
#[derive(Module, Debug)]
pub struct PixelHead<B: Backend> {
    conv: Conv2d<B>,
}

/// Configuration for [`PixelHead`].
#[derive(Config, Debug)]
pub struct PixelHeadConfig {
    /// Number of output classes.
    pub num_classes: usize,
    /// Input channels.
    #[config(default = 3)]
    pub in_channels: usize,
}

impl PixelHeadConfig {
    /// Initializes the head with random weights.
    pub fn init<B: Backend>(&self, device: &B::Device) -> PixelHead<B> {
        PixelHead {
            conv: Conv2dConfig::new([self.in_channels, self.num_classes], [1, 1]).init(device),
        }
    }
}

impl<B: Backend> PixelHead<B> {
    /// Replaces the head's weights with a recorded checkpoint.
    ///
    /// # Errors
    ///
    /// [`EvalError::WeightsLoadFailed`] when the file cannot be read or
    /// does not match the module structure.
    pub fn load_weights(self, path: &Path, device: &B::Device) -> EvalResult<Self> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.load_file(path.to_path_buf(), &recorder, device)
            .map_err(|source| EvalError::WeightsLoadFailed {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl<B: Backend> Segmenter<B> for PixelHead<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        self.conv.forward(images)
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn head_preserves_spatial_shape() {
        let device = NdArrayDevice::default();
        let head = PixelHeadConfig::new(5).init::<TestBackend>(&device);
        let images = Tensor::<TestBackend, 4>::zeros([2, 3, 8, 6], &device);
        assert_eq!(head.forward(images).dims(), [2, 5, 8, 6]);
    }

    #[test]
    fn weights_round_trip_through_recorder() {
        let device = NdArrayDevice::default();
        let head = PixelHeadConfig::new(2).init::<TestBackend>(&device);

        let path = std::env::temp_dir().join(format!(
            "segval-weights-{}-iter_10_model_state",
            std::process::id()
        ));
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        head.clone().save_file(path.clone(), &recorder).unwrap();

        let saved = path.with_extension("mpk");
        let restored = PixelHeadConfig::new(2)
            .init::<TestBackend>(&device)
            .load_weights(&saved, &device)
            .unwrap();

        let images = Tensor::<TestBackend, 4>::ones([1, 3, 2, 2], &device);
        let a: Vec<f32> = head
            .forward(images.clone())
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();
        let b: Vec<f32> = restored
            .forward(images)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();
        assert_eq!(a, b);

        let _ = std::fs::remove_file(saved);
    }
}
