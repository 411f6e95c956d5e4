//! # segval-metric
//!
//! Streaming confusion-area accumulation and metric derivation for
//! semantic segmentation.
//!
//! Instead of materializing a full confusion matrix or holding raw
//! predictions, the evaluation loop reduces each batch to three
//! per-class pixel counts — intersection, prediction and label areas
//! ([`ClassAreas`]) — and sums them as it goes. The final aggregate
//! metrics (per-class/mean IoU, pixel accuracy, Cohen's kappa) are pure
//! functions of that accumulated triple, so any disjoint partition of
//! the dataset, summed in any order, produces identical results.
//!
//! The crate is deliberately independent of any tensor library: inputs
//! are flat `&[i64]` class maps and everything downstream is plain
//! vectors, which keeps the core usable from whatever inference backend
//! produced the predictions.
//!
//! ## Usage
//!
//! ```rust
//! use segval_metric::{accuracy, calculate_area, kappa, mean_iou, ClassAreas};
//!
//! let mut running = ClassAreas::zeros(2);
//! for (pred, label) in [([0i64, 1], [0i64, 1]), ([1, 1], [1, 0])] {
//!     let batch = calculate_area(&pred, &label, 2, None).unwrap();
//!     running.accumulate(&batch);
//! }
//! let iou = mean_iou(&running);
//! let acc = accuracy(&running);
//! let k = kappa(&running);
//! assert!(iou.mean_iou > 0.0 && acc.overall_acc > 0.0 && k < 1.0);
//! ```

pub mod accuracy;
pub mod area;
pub mod error;
pub mod iou;
pub mod kappa;

pub use accuracy::{accuracy, AccuracyReport};
pub use area::{calculate_area, ClassAreas};
pub use error::{MetricError, MetricResult};
pub use iou::{mean_iou, IouReport};
pub use kappa::kappa;
