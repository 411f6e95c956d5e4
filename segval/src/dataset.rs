//! Validation batch sources.
//!
//! [`BatchSource`] is the seam between the evaluation loop and whatever
//! produces image/label pairs: an ordered, finite, non-restartable
//! stream. [`DirectoryBatchSource`] is the bundled implementation,
//! pairing images with annotation maps on disk by file stem.

use std::path::{Path, PathBuf};

use burn::tensor::{backend::Backend, Int, Tensor, TensorData};
use walkdir::WalkDir;

use crate::error::{DatasetError, DatasetResult, EvalResult};

/// ImageNet channel means on the 0-255 scale, the fixed validation
/// normalization of the evaluated models.
const CHANNEL_MEAN: [f32; 3] = [123.675, 116.28, 103.53];
const CHANNEL_STD: [f32; 3] = [58.395, 57.12, 57.375];

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// One batch of validation samples.
#[derive(Debug, Clone)]
pub struct SegBatch<B: Backend> {
    /// Normalized images, `[n, 3, h, w]`.
    pub images: Tensor<B, 4>,
    /// Integer class maps, `[n, h, w]`.
    pub labels: Tensor<B, 3, Int>,
}

/// An ordered, finite stream of validation batches.
///
/// The stream cannot restart: once [`BatchSource::next_batch`] returns
/// `None` the source is exhausted for good.
pub trait BatchSource<B: Backend> {
    /// Total number of samples in the full validation set. Under
    /// multi-rank evaluation this is the dataset-wide count, not the
    /// size of this rank's shard; the reduction uses it to drop padded
    /// duplicates on the final batch.
    fn total_samples(&self) -> usize;

    /// Number of semantic classes in the label maps.
    fn num_classes(&self) -> usize;

    /// Label value excluded from all statistics.
    fn ignore_index(&self) -> i64;

    /// Yields the next batch, or `None` once exhausted.
    fn next_batch(&mut self, device: &B::Device) -> Option<EvalResult<SegBatch<B>>>;
}

/// Batch source over a dataset directory.
///
/// Expects `<root>/images/*.{jpg,jpeg,png}` and a matching
/// `<root>/annotations/<stem>.png` grayscale class map per image.
/// Samples are ordered by image filename; all images within one batch
/// must share spatial dimensions.
pub struct DirectoryBatchSource {
    pairs: Vec<(PathBuf, PathBuf)>,
    cursor: usize,
    batch_size: usize,
    num_classes: usize,
    ignore_index: i64,
}

impl DirectoryBatchSource {
    /// Scans `root` and pairs every image with its annotation map.
    ///
    /// # Errors
    ///
    /// Fails when either subdirectory is missing, an image has no
    /// annotation, or no pairs are found at all.
    pub fn new(
        root: &Path,
        batch_size: usize,
        num_classes: usize,
        ignore_index: i64,
    ) -> DatasetResult<Self> {
        let image_dir = root.join("images");
        let annotation_dir = root.join("annotations");
        if !image_dir.is_dir() {
            return Err(DatasetError::ImageDirectoryNotFound { path: image_dir });
        }
        if !annotation_dir.is_dir() {
            return Err(DatasetError::AnnotationDirectoryNotFound {
                path: annotation_dir,
            });
        }

        let mut pairs = Vec::new();
        for entry in WalkDir::new(&image_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| DatasetError::DirectoryReadFailed {
                path: image_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || !has_image_extension(path) {
                continue;
            }
            let stem = match path.file_stem() {
                Some(stem) => stem,
                None => continue,
            };
            let annotation = annotation_dir.join(stem).with_extension("png");
            if !annotation.is_file() {
                return Err(DatasetError::MissingAnnotation {
                    path: path.to_path_buf(),
                });
            }
            pairs.push((path.to_path_buf(), annotation));
        }

        if pairs.is_empty() {
            return Err(DatasetError::NoValidPairs {
                path: root.to_path_buf(),
            });
        }

        Ok(Self {
            pairs,
            cursor: 0,
            batch_size,
            num_classes,
            ignore_index,
        })
    }

    fn load_pair<B: Backend>(
        image_path: &Path,
        annotation_path: &Path,
        device: &B::Device,
    ) -> DatasetResult<(Tensor<B, 3>, Tensor<B, 2, Int>)> {
        let image = image::open(image_path)
            .map_err(|source| DatasetError::ImageOpenFailed {
                path: image_path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        let annotation = image::open(annotation_path)
            .map_err(|source| DatasetError::ImageOpenFailed {
                path: annotation_path.to_path_buf(),
                source,
            })?
            .to_luma8();

        if annotation.dimensions() != image.dimensions() {
            return Err(DatasetError::AnnotationSizeMismatch {
                path: annotation_path.to_path_buf(),
                annotation: annotation.dimensions(),
                image: image.dimensions(),
            });
        }

        let (width, height) = image.dimensions();
        let (h, w) = (height as usize, width as usize);

        let mut image_data = Vec::with_capacity(h * w * 3);
        for pixel in image.pixels() {
            for c in 0..3 {
                image_data.push((f32::from(pixel[c]) - CHANNEL_MEAN[c]) / CHANNEL_STD[c]);
            }
        }
        let image_tensor = Tensor::<B, 3>::from_data(TensorData::new(image_data, [h, w, 3]), device)
            .permute([2, 0, 1]);

        let label_data: Vec<i64> = annotation.pixels().map(|p| i64::from(p[0])).collect();
        let label_tensor =
            Tensor::<B, 2, Int>::from_data(TensorData::new(label_data, [h, w]), device);

        Ok((image_tensor, label_tensor))
    }
}

impl<B: Backend> BatchSource<B> for DirectoryBatchSource {
    fn total_samples(&self) -> usize {
        self.pairs.len()
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn ignore_index(&self) -> i64 {
        self.ignore_index
    }

    fn next_batch(&mut self, device: &B::Device) -> Option<EvalResult<SegBatch<B>>> {
        if self.cursor >= self.pairs.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.pairs.len());
        let span = &self.pairs[self.cursor..end];
        self.cursor = end;

        let mut images = Vec::with_capacity(span.len());
        let mut labels = Vec::with_capacity(span.len());
        let mut reference_dims: Option<(u32, u32)> = None;

        for (image_path, annotation_path) in span {
            let dims = match image::image_dimensions(image_path) {
                Ok(dims) => dims,
                Err(source) => {
                    return Some(Err(DatasetError::ImageOpenFailed {
                        path: image_path.clone(),
                        source,
                    }
                    .into()))
                }
            };
            match reference_dims {
                None => reference_dims = Some(dims),
                Some(expected) if expected != dims => {
                    return Some(Err(DatasetError::InconsistentBatchShape {
                        got: dims,
                        expected,
                    }
                    .into()))
                }
                Some(_) => {}
            }

            match Self::load_pair::<B>(image_path, annotation_path, device) {
                Ok((image, label)) => {
                    images.push(image);
                    labels.push(label);
                }
                Err(err) => return Some(Err(err.into())),
            }
        }

        Some(Ok(SegBatch {
            images: Tensor::stack(images, 0),
            labels: Tensor::stack(labels, 0),
        }))
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::*;

    type TestBackend = NdArray<f32>;

    fn write_dataset(name: &str, samples: &[(&str, [u8; 4])]) -> PathBuf {
        let root = std::env::temp_dir().join(format!("segval-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("images")).unwrap();
        fs::create_dir_all(root.join("annotations")).unwrap();

        for (stem, classes) in samples {
            let mut image = RgbImage::new(2, 2);
            for pixel in image.pixels_mut() {
                *pixel = Rgb([128, 64, 32]);
            }
            image.save(root.join("images").join(format!("{stem}.png"))).unwrap();

            let mut annotation = GrayImage::new(2, 2);
            for (i, pixel) in annotation.pixels_mut().enumerate() {
                *pixel = Luma([classes[i]]);
            }
            annotation
                .save(root.join("annotations").join(format!("{stem}.png")))
                .unwrap();
        }
        root
    }

    #[test]
    fn yields_ordered_batches_then_exhausts() {
        let root = write_dataset(
            "ordered",
            &[
                ("a", [0, 0, 1, 1]),
                ("b", [1, 1, 1, 1]),
                ("c", [0, 1, 0, 1]),
            ],
        );
        let mut source = DirectoryBatchSource::new(&root, 2, 2, 255).unwrap();
        let device = NdArrayDevice::default();

        assert_eq!(BatchSource::<TestBackend>::total_samples(&source), 3);

        let first = BatchSource::<TestBackend>::next_batch(&mut source, &device)
            .unwrap()
            .unwrap();
        assert_eq!(first.images.dims(), [2, 3, 2, 2]);
        assert_eq!(first.labels.dims(), [2, 2, 2]);
        let labels: Vec<i64> = first.labels.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(labels, vec![0, 0, 1, 1, 1, 1, 1, 1]);

        let second = BatchSource::<TestBackend>::next_batch(&mut source, &device)
            .unwrap()
            .unwrap();
        assert_eq!(second.labels.dims(), [1, 2, 2]);

        assert!(BatchSource::<TestBackend>::next_batch(&mut source, &device).is_none());
        // Non-restartable: still exhausted.
        assert!(BatchSource::<TestBackend>::next_batch(&mut source, &device).is_none());

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn images_are_normalized() {
        let root = write_dataset("normalized", &[("a", [0, 0, 0, 0])]);
        let mut source = DirectoryBatchSource::new(&root, 1, 2, 255).unwrap();
        let device = NdArrayDevice::default();

        let batch = BatchSource::<TestBackend>::next_batch(&mut source, &device)
            .unwrap()
            .unwrap();
        let values: Vec<f32> = batch.images.into_data().convert::<f32>().to_vec().unwrap();
        // Channel 0 of every pixel is 128.
        let expected = (128.0 - CHANNEL_MEAN[0]) / CHANNEL_STD[0];
        assert!((values[0] - expected).abs() < 1e-5);

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn missing_annotation_fails_upfront() {
        let root = write_dataset("missing-ann", &[("a", [0, 0, 0, 0])]);
        fs::remove_file(root.join("annotations/a.png")).unwrap();
        match DirectoryBatchSource::new(&root, 1, 2, 255) {
            Err(DatasetError::MissingAnnotation { path }) => {
                assert!(path.ends_with("a.png"));
            }
            other => panic!("expected MissingAnnotation, got {:?}", other.err()),
        }
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn missing_directories_fail_upfront() {
        let root = std::env::temp_dir().join(format!("segval-absent-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        assert!(matches!(
            DirectoryBatchSource::new(&root, 1, 2, 255),
            Err(DatasetError::ImageDirectoryNotFound { .. })
        ));
    }
}
