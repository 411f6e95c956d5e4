//! Inference providers.
//!
//! [`InferenceProvider`] is the seam the evaluation loop calls into;
//! the bundled implementations wrap any [`Segmenter`] with the two
//! prediction procedures of the original evaluator: plain
//! sliding-window inference ([`SlideProvider`]) and its
//! multi-scale/flip-augmented variant ([`AugSlideProvider`]).

use std::marker::PhantomData;

use burn::tensor::{
    activation::softmax,
    backend::Backend,
    module::interpolate,
    ops::{InterpolateMode, InterpolateOptions},
    Int, Tensor,
};

use crate::{error::EvalResult, model::Segmenter};

/// Maps image batches to integer class maps.
pub trait InferenceProvider<B: Backend> {
    /// Predicts a class map `[n, h, w]` at `ori_shape` = `[h, w]`
    /// resolution.
    fn predict(&self, images: Tensor<B, 4>, ori_shape: [usize; 2]) -> EvalResult<Tensor<B, 3, Int>>;
}

/// Sliding-window tiling parameters, `[height, width]` each.
#[derive(Debug, Clone, Copy)]
pub struct SlideSpec {
    /// Window size.
    pub crop: [usize; 2],
    /// Step between window origins; at most `crop` per dimension.
    pub stride: [usize; 2],
}

/// Single-scale sliding-window inference over a [`Segmenter`].
pub struct SlideProvider<B: Backend, M: Segmenter<B>> {
    model: M,
    num_classes: usize,
    spec: SlideSpec,
    _backend: PhantomData<B>,
}

impl<B: Backend, M: Segmenter<B>> SlideProvider<B, M> {
    /// Wraps `model` with sliding-window prediction.
    pub fn new(model: M, num_classes: usize, spec: SlideSpec) -> Self {
        Self {
            model,
            num_classes,
            spec,
            _backend: PhantomData,
        }
    }
}

impl<B: Backend, M: Segmenter<B>> InferenceProvider<B> for SlideProvider<B, M> {
    fn predict(&self, images: Tensor<B, 4>, ori_shape: [usize; 2]) -> EvalResult<Tensor<B, 3, Int>> {
        let logits = slide_logits(&self.model, images, self.num_classes, self.spec);
        let logits = resize_logits(logits, ori_shape);
        Ok(logits.argmax(1).squeeze::<3>(1))
    }
}

/// Multi-scale and flip-augmented sliding-window inference.
///
/// Each scale/flip variant contributes a softmax probability map at
/// `ori_shape` resolution; the argmax of the summed probabilities is
/// the final prediction.
pub struct AugSlideProvider<B: Backend, M: Segmenter<B>> {
    model: M,
    num_classes: usize,
    spec: SlideSpec,
    scales: Vec<f64>,
    flip_horizontal: bool,
    flip_vertical: bool,
    _backend: PhantomData<B>,
}

impl<B: Backend, M: Segmenter<B>> AugSlideProvider<B, M> {
    /// Wraps `model` with augmented prediction. `scales` must not be
    /// empty (enforced by configuration validation upstream).
    pub fn new(
        model: M,
        num_classes: usize,
        spec: SlideSpec,
        scales: Vec<f64>,
        flip_horizontal: bool,
        flip_vertical: bool,
    ) -> Self {
        Self {
            model,
            num_classes,
            spec,
            scales,
            flip_horizontal,
            flip_vertical,
            _backend: PhantomData,
        }
    }

    fn variants(&self) -> Vec<Flip> {
        let mut variants = vec![Flip::None];
        if self.flip_horizontal {
            variants.push(Flip::Horizontal);
        }
        if self.flip_vertical {
            variants.push(Flip::Vertical);
        }
        variants
    }
}

impl<B: Backend, M: Segmenter<B>> InferenceProvider<B> for AugSlideProvider<B, M> {
    fn predict(&self, images: Tensor<B, 4>, ori_shape: [usize; 2]) -> EvalResult<Tensor<B, 3, Int>> {
        let [n, _, h, w] = images.dims();
        let device = images.device();
        let mut prob = Tensor::<B, 4>::zeros(
            [n, self.num_classes, ori_shape[0], ori_shape[1]],
            &device,
        );

        for &scale in &self.scales {
            let sh = ((h as f64 * scale).round() as usize).max(1);
            let sw = ((w as f64 * scale).round() as usize).max(1);
            let scaled = if [sh, sw] == [h, w] {
                images.clone()
            } else {
                interpolate(
                    images.clone(),
                    [sh, sw],
                    InterpolateOptions::new(InterpolateMode::Bilinear),
                )
            };

            for flip in self.variants() {
                let input = flip.apply(scaled.clone());
                let logits = slide_logits(&self.model, input, self.num_classes, self.spec);
                // Undo the flip so logits line up with the original
                // orientation before resizing.
                let logits = flip.apply(logits);
                let logits = resize_logits(logits, ori_shape);
                prob = prob + softmax(logits, 1);
            }
        }

        Ok(prob.argmax(1).squeeze::<3>(1))
    }
}

#[derive(Debug, Clone, Copy)]
enum Flip {
    None,
    Horizontal,
    Vertical,
}

impl Flip {
    fn apply<B: Backend>(self, tensor: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::None => tensor,
            Self::Horizontal => tensor.flip([3]),
            Self::Vertical => tensor.flip([2]),
        }
    }
}

/// Runs the model over sliding windows and averages logits where
/// windows overlap. Images no larger than the crop run in one forward
/// pass.
fn slide_logits<B: Backend, M: Segmenter<B>>(
    model: &M,
    images: Tensor<B, 4>,
    num_classes: usize,
    spec: SlideSpec,
) -> Tensor<B, 4> {
    let [n, channels, h, w] = images.dims();
    let [crop_h, crop_w] = spec.crop;
    if h <= crop_h && w <= crop_w {
        return model.forward(images);
    }

    let device = images.device();
    let mut logits = Tensor::<B, 4>::zeros([n, num_classes, h, w], &device);
    let mut counts = Tensor::<B, 4>::zeros([n, 1, h, w], &device);

    for y0 in window_starts(h, crop_h, spec.stride[0]) {
        for x0 in window_starts(w, crop_w, spec.stride[1]) {
            let (y1, x1) = (y0 + crop_h.min(h), x0 + crop_w.min(w));
            let window = images
                .clone()
                .slice([0..n, 0..channels, y0..y1, x0..x1]);
            let out = model.forward(window);

            let current = logits
                .clone()
                .slice([0..n, 0..num_classes, y0..y1, x0..x1]);
            logits = logits.slice_assign([0..n, 0..num_classes, y0..y1, x0..x1], current + out);

            let seen = counts.clone().slice([0..n, 0..1, y0..y1, x0..x1]);
            counts = counts.slice_assign([0..n, 0..1, y0..y1, x0..x1], seen.add_scalar(1.0));
        }
    }

    logits.div(counts.repeat_dim(1, num_classes))
}

/// Window origins covering `size` with `crop`-sized windows every
/// `stride` steps; the final window is shifted back to end exactly at
/// the boundary.
fn window_starts(size: usize, crop: usize, stride: usize) -> Vec<usize> {
    if crop >= size {
        return vec![0];
    }
    let mut starts = Vec::new();
    let mut origin = 0;
    loop {
        starts.push(origin.min(size - crop));
        if origin + crop >= size {
            break;
        }
        origin += stride;
    }
    starts.dedup();
    starts
}

fn resize_logits<B: Backend>(logits: Tensor<B, 4>, ori_shape: [usize; 2]) -> Tensor<B, 4> {
    let [_, _, h, w] = logits.dims();
    if [h, w] == ori_shape {
        logits
    } else {
        interpolate(
            logits,
            ori_shape,
            InterpolateOptions::new(InterpolateMode::Bilinear),
        )
    }
}
