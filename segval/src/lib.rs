//! `segval`: streaming evaluation of semantic-segmentation checkpoints.
//!
//! The crate drives a trained segmentation model over a validation set
//! and reports per-class/mean IoU, pixel accuracy and Cohen's kappa.
//! Each batch is reduced to a per-class confusion-area triple
//! (see [`segval_metric`]) and folded into a running accumulator,
//! optionally gathered across worker ranks, so the full prediction set
//! never has to sit in memory.
//!
//! External collaborators stay behind traits: the model behind
//! [`model::Segmenter`], the batch stream behind
//! [`dataset::BatchSource`], and the cross-rank collective behind
//! [`reduce::AreaGather`].

pub mod backend;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod inference;
pub mod model;
pub mod reduce;

#[doc(inline)]
pub use config::EvalConfig;
#[doc(inline)]
pub use error::{EvalError, EvalResult};
#[doc(inline)]
pub use evaluate::{evaluate, run_evaluation, EvalReport};
