//! Error types for the evaluation harness.
//!
//! Nothing here is recoverable: configuration errors abort before any
//! batch is processed, shape mismatches and gather failures abort the
//! run, and there is no partial-results checkpointing. The binary
//! surfaces everything through `anyhow` at the process boundary.

use std::path::PathBuf;

use segval_metric::MetricError;
use thiserror::Error;

/// Top-level error type for an evaluation run.
#[derive(Error, Debug)]
pub enum EvalError {
    /// The configuration failed validation.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Why validation rejected the configuration.
        reason: String,
    },

    /// The model weights file does not exist.
    #[error("model weights not found: {path}")]
    WeightsNotFound {
        /// The resolved (explicit or derived) weights path.
        path: PathBuf,
    },

    /// The weights file exists but could not be deserialized.
    #[error("failed to load model weights from {path}")]
    WeightsLoadFailed {
        /// The weights file path.
        path: PathBuf,
        /// The underlying recorder error.
        #[source]
        source: burn::record::RecorderError,
    },

    /// Prediction and label tensors disagree on spatial shape.
    #[error("prediction/label shape mismatch: {pred:?} vs {label:?}")]
    BatchShapeMismatch {
        /// Prediction dims `[n, h, w]`.
        pred: [usize; 3],
        /// Label dims `[n, h, w]`.
        label: [usize; 3],
    },

    /// Area or metric computation failed.
    #[error(transparent)]
    Metric(#[from] MetricError),

    /// Cross-rank gather failed.
    #[error(transparent)]
    Gather(#[from] GatherError),

    /// The batch source failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// A specialized `Result` type for evaluation operations.
pub type EvalResult<T> = Result<T, EvalError>;

/// Error type for the cross-rank all-gather.
#[derive(Error, Debug)]
pub enum GatherError {
    /// The collective transport failed; fatal, no retry.
    #[error("all-gather failed: {reason}")]
    Communication {
        /// Transport-level failure description.
        reason: String,
    },

    /// The gather returned the wrong number of per-rank entries.
    #[error("gather returned {got} entries for {expected} ranks")]
    WrongWorldSize {
        /// Entries actually returned.
        got: usize,
        /// Configured rank count.
        expected: usize,
    },
}

/// Error type for the directory-backed batch source.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// The image directory is missing.
    #[error("image directory not found: {path}")]
    ImageDirectoryNotFound {
        /// The expected image directory.
        path: PathBuf,
    },

    /// The annotation directory is missing.
    #[error("annotation directory not found: {path}")]
    AnnotationDirectoryNotFound {
        /// The expected annotation directory.
        path: PathBuf,
    },

    /// Walking the image directory failed.
    #[error("failed to read directory: {path}")]
    DirectoryReadFailed {
        /// The directory being walked.
        path: PathBuf,
        /// The underlying walk error.
        #[source]
        source: walkdir::Error,
    },

    /// An image has no matching annotation map.
    #[error("annotation missing for image: {path}")]
    MissingAnnotation {
        /// The image whose annotation is absent.
        path: PathBuf,
    },

    /// No usable image/annotation pairs were found.
    #[error("no image/annotation pairs found under: {path}")]
    NoValidPairs {
        /// The dataset root that was scanned.
        path: PathBuf,
    },

    /// Opening or decoding an image failed.
    #[error("failed to open image: {path}")]
    ImageOpenFailed {
        /// The offending file.
        path: PathBuf,
        /// The underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// Samples within one batch must share spatial dimensions.
    #[error("images in one batch must share dimensions: got {got:?}, expected {expected:?}")]
    InconsistentBatchShape {
        /// Dimensions of the offending sample (width, height).
        got: (u32, u32),
        /// Dimensions of the first sample in the batch (width, height).
        expected: (u32, u32),
    },

    /// An image and its annotation disagree on size.
    #[error("annotation size {annotation:?} does not match image size {image:?}: {path}")]
    AnnotationSizeMismatch {
        /// The annotation file.
        path: PathBuf,
        /// Annotation dimensions (width, height).
        annotation: (u32, u32),
        /// Image dimensions (width, height).
        image: (u32, u32),
    },
}

/// A specialized `Result` type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;
