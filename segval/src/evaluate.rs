//! The evaluation loop.
//!
//! Streams batches from a [`BatchSource`], predicts with an
//! [`InferenceProvider`], reduces each batch to a confusion-area
//! triple, folds it into the running accumulator across ranks, and
//! derives the final metrics once the stream is exhausted. Raw
//! predictions are dropped as soon as their areas are counted.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use burn::tensor::{backend::Backend, Int, Tensor};
use segval_metric::{accuracy, calculate_area, kappa, mean_iou, ClassAreas};

use crate::{
    config::EvalConfig,
    dataset::{BatchSource, DirectoryBatchSource, SegBatch},
    error::{EvalError, EvalResult},
    inference::{AugSlideProvider, InferenceProvider, SlideProvider, SlideSpec},
    model::PixelHeadConfig,
    reduce::{accumulate_gathered, AreaGather, LocalGather},
};

/// Final aggregate metrics for one evaluation run.
#[derive(Debug, Clone)]
pub struct EvalReport {
    /// Number of validated samples.
    pub num_images: usize,
    /// Mean intersection-over-union.
    pub miou: f64,
    /// Overall pixel accuracy.
    pub acc: f64,
    /// Cohen's kappa.
    pub kappa: f64,
    /// Per-class IoU.
    pub class_iou: Vec<f64>,
    /// Per-class accuracy.
    pub class_acc: Vec<f64>,
}

impl EvalReport {
    /// Derives the report from an accumulated area triple. Pure: any
    /// correct accumulation of the same run yields the same report.
    pub fn from_areas(num_images: usize, areas: &ClassAreas) -> Self {
        let iou = mean_iou(areas);
        let acc = accuracy(areas);
        Self {
            num_images,
            miou: iou.mean_iou,
            acc: acc.overall_acc,
            kappa: kappa(areas),
            class_iou: iou.class_iou,
            class_acc: acc.class_acc,
        }
    }

    /// Writes the summary lines to the log sink.
    pub fn log_summary(&self) {
        tracing::info!(
            "[EVAL] #Images: {} mIoU: {:.4} Acc: {:.4} Kappa: {:.4}",
            self.num_images,
            self.miou,
            self.acc,
            self.kappa,
        );
        tracing::info!("[EVAL] Class IoU: {:?}", round4(&self.class_iou));
        tracing::info!("[EVAL] Class Acc: {:?}", round4(&self.class_acc));
    }
}

fn round4(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| (v * 1e4).round() / 1e4).collect()
}

/// Running average of per-batch costs.
struct TimeAverager {
    total: Duration,
    count: usize,
}

impl TimeAverager {
    const fn new() -> Self {
        Self {
            total: Duration::ZERO,
            count: 0,
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.total += elapsed;
        self.count += 1;
    }

    fn average_secs(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total.as_secs_f64() / self.count as f64
        }
    }

    fn reset(&mut self) {
        self.total = Duration::ZERO;
        self.count = 0;
    }
}

/// Reduces one batch of prediction/label tensors to its area triple.
///
/// # Errors
///
/// [`EvalError::BatchShapeMismatch`] when the tensors disagree on
/// shape; metric errors for out-of-range class values.
pub fn batch_areas<B: Backend>(
    pred: &Tensor<B, 3, Int>,
    label: &Tensor<B, 3, Int>,
    num_classes: usize,
    ignore_index: i64,
) -> EvalResult<ClassAreas> {
    if pred.dims() != label.dims() {
        return Err(EvalError::BatchShapeMismatch {
            pred: pred.dims(),
            label: label.dims(),
        });
    }
    let pred = flatten_class_map(pred);
    let label = flatten_class_map(label);
    Ok(calculate_area(&pred, &label, num_classes, Some(ignore_index))?)
}

fn flatten_class_map<B: Backend>(map: &Tensor<B, 3, Int>) -> Vec<i64> {
    map.clone()
        .into_data()
        .convert::<i64>()
        .to_vec()
        .expect("converted class map holds i64 elements")
}

/// Runs the streaming evaluation loop to completion.
///
/// Batches are processed strictly in order; the accumulator is owned
/// exclusively by this rank and consumed exactly once at the end. Any
/// failure aborts the run — there is no retry or partial result.
pub fn evaluate<B, S, P, G>(
    source: &mut S,
    provider: &P,
    gather: &G,
    device: &B::Device,
) -> EvalResult<EvalReport>
where
    B: Backend,
    S: BatchSource<B>,
    P: InferenceProvider<B>,
    G: AreaGather,
{
    let num_classes = source.num_classes();
    let ignore_index = source.ignore_index();
    let total_samples = source.total_samples();

    tracing::info!(
        total_samples,
        num_classes,
        ranks = gather.num_ranks(),
        "starting evaluation"
    );

    let mut running = ClassAreas::zeros(num_classes);
    let mut reader_cost = TimeAverager::new();
    let mut batch_cost = TimeAverager::new();
    let mut iteration = 0;
    let mut batch_start = Instant::now();

    while let Some(batch) = source.next_batch(device) {
        let SegBatch { images, labels } = batch?;
        reader_cost.record(batch_start.elapsed());

        let [_, h, w] = labels.dims();
        let pred = provider.predict(images, [h, w])?;
        let areas = batch_areas(&pred, &labels, num_classes, ignore_index)?;
        accumulate_gathered(gather, &mut running, &areas, iteration, total_samples)?;

        batch_cost.record(batch_start.elapsed());
        if gather.rank() == 0 {
            tracing::info!(
                iter = iteration + 1,
                batch_cost = batch_cost.average_secs(),
                reader_cost = reader_cost.average_secs(),
                "batch evaluated"
            );
        }
        reader_cost.reset();
        batch_cost.reset();
        iteration += 1;
        batch_start = Instant::now();
    }

    Ok(EvalReport::from_areas(total_samples, &running))
}

/// Configuration-driven entry point: wires the directory batch source,
/// the checkpointed model, the provider variant selected by
/// `val.multi_scales_val`, and a single-process gather, then runs
/// [`evaluate`] and logs the summary.
pub fn run_evaluation<B: Backend>(
    config: &EvalConfig,
    model_path: Option<PathBuf>,
    device: &B::Device,
) -> EvalResult<EvalReport> {
    config.validate()?;
    let weights = config.resolve_model_path(model_path)?;

    tracing::info!(path = %weights.display(), "loading model weights");
    let model = PixelHeadConfig::new(config.data.num_classes)
        .init::<B>(device)
        .load_weights(&weights, device)?;
    tracing::info!("loaded trained params of model successfully");

    let mut source = DirectoryBatchSource::new(
        Path::new(&config.data.dataset_root),
        config.data.batch_size_val,
        config.data.num_classes,
        config.data.ignore_index,
    )?;

    let spec = SlideSpec {
        crop: config.val.crop_size,
        stride: config.val.stride,
    };

    let report = if config.val.multi_scales_val {
        let provider = AugSlideProvider::new(
            model,
            config.data.num_classes,
            spec,
            config.val.scales.clone(),
            config.val.flip_horizontal,
            config.val.flip_vertical,
        );
        evaluate(&mut source, &provider, &LocalGather, device)?
    } else {
        let provider = SlideProvider::new(model, config.data.num_classes, spec);
        evaluate(&mut source, &provider, &LocalGather, device)?
    };

    report.log_summary();
    Ok(report)
}
