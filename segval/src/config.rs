//! Evaluation run configuration.
//!
//! An explicit configuration struct passed by reference into the
//! evaluation entry point — no global config state. Loaded from a JSON
//! file via [`EvalConfig::load`] (Burn's `Config` trait).

use std::path::{Path, PathBuf};

use burn::prelude::*;

use crate::error::{EvalError, EvalResult};

/// Top-level configuration for one evaluation run.
#[derive(Config, Debug)]
pub struct EvalConfig {
    /// Dataset settings.
    pub data: DataConfig,
    /// Validation/inference settings.
    #[config(default = "ValConfig::new()")]
    pub val: ValConfig,
    /// Training-side settings needed to locate the checkpoint.
    #[config(default = "TrainConfig::new()")]
    pub train: TrainConfig,
    /// Directory holding training outputs, including model checkpoints.
    #[config(default = "\"./output\".to_string()")]
    pub save_dir: String,
}

/// Dataset settings.
#[derive(Config, Debug)]
pub struct DataConfig {
    /// Root directory holding `images/` and `annotations/`.
    pub dataset_root: String,
    /// Number of semantic classes.
    pub num_classes: usize,
    /// Samples per validation batch.
    #[config(default = 1)]
    pub batch_size_val: usize,
    /// Label value excluded from all statistics.
    #[config(default = 255)]
    pub ignore_index: i64,
}

/// Validation/inference settings.
#[derive(Config, Debug)]
pub struct ValConfig {
    /// Use the multi-scale/flip-augmented inference variant.
    #[config(default = false)]
    pub multi_scales_val: bool,
    /// Scale factors for augmented inference.
    #[config(default = "vec![0.75, 1.0, 1.25]")]
    pub scales: Vec<f64>,
    /// Add a horizontally flipped pass in augmented inference.
    #[config(default = true)]
    pub flip_horizontal: bool,
    /// Add a vertically flipped pass in augmented inference.
    #[config(default = false)]
    pub flip_vertical: bool,
    /// Sliding-window crop size as `[height, width]`.
    #[config(default = "[512, 512]")]
    pub crop_size: [usize; 2],
    /// Sliding-window stride as `[height, width]`.
    #[config(default = "[341, 341]")]
    pub stride: [usize; 2],
}

/// Training-side settings.
#[derive(Config, Debug)]
pub struct TrainConfig {
    /// Iteration count encoded in the checkpoint filename.
    #[config(default = 160000)]
    pub iters: usize,
}

impl EvalConfig {
    /// Checks the configuration before any batch is processed.
    ///
    /// # Errors
    ///
    /// [`EvalError::InvalidConfiguration`] naming the first violated
    /// constraint.
    pub fn validate(&self) -> EvalResult<()> {
        if self.data.num_classes == 0 {
            return Err(EvalError::InvalidConfiguration {
                reason: "num_classes must be greater than zero".to_owned(),
            });
        }
        if self.data.batch_size_val == 0 {
            return Err(EvalError::InvalidConfiguration {
                reason: "batch_size_val must be greater than zero".to_owned(),
            });
        }
        if self.val.stride[0] == 0 || self.val.stride[1] == 0 {
            return Err(EvalError::InvalidConfiguration {
                reason: "stride must be nonzero in both dimensions".to_owned(),
            });
        }
        if self.val.stride[0] > self.val.crop_size[0] || self.val.stride[1] > self.val.crop_size[1]
        {
            return Err(EvalError::InvalidConfiguration {
                reason: format!(
                    "stride {:?} must not exceed crop_size {:?}",
                    self.val.stride, self.val.crop_size
                ),
            });
        }
        if self.val.multi_scales_val && self.val.scales.is_empty() {
            return Err(EvalError::InvalidConfiguration {
                reason: "multi_scales_val requires at least one scale".to_owned(),
            });
        }
        Ok(())
    }

    /// Default checkpoint location derived from `save_dir` and the
    /// training iteration count.
    pub fn default_model_path(&self) -> PathBuf {
        Path::new(&self.save_dir).join(format!("iter_{}_model_state.mpk", self.train.iters))
    }

    /// Resolves the weights path: an explicit path wins, otherwise the
    /// derived default. The file must exist.
    ///
    /// # Errors
    ///
    /// [`EvalError::WeightsNotFound`] when the resolved file is absent;
    /// this aborts the run before any batch is processed.
    pub fn resolve_model_path(&self, explicit: Option<PathBuf>) -> EvalResult<PathBuf> {
        let path = explicit.unwrap_or_else(|| self.default_model_path());
        if path.is_file() {
            Ok(path)
        } else {
            Err(EvalError::WeightsNotFound { path })
        }
    }
}
