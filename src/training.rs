//! Trainer boundary: labeled image buckets and the classifier collaborator
//!
//! The downloader only produces files on disk; training happens elsewhere.
//! [`LabeledImages`] is the hand-off format, built either from the records of a
//! session or by scanning an existing `DataSet` tree.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

use crate::error::{Error, Result, StorageError};
use crate::record::{Finding, Record};
use crate::store::folder_name_for;

/// One image file with its label
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct LabeledImage {
    /// Label the image is filed under
    pub finding: Finding,
    /// Location of the image file
    #[schema(value_type = String)]
    pub path: PathBuf,
    /// Patient the image belongs to (unknown when scanned from disk)
    pub patient_id: Option<String>,
}

/// Image count for one label
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LabelCount {
    /// Label
    pub finding: Finding,
    /// Folder name under the dataset directory
    pub folder: String,
    /// Number of images
    pub count: usize,
}

/// Images grouped by label, each bucket in a stable order
#[derive(Clone, Debug, Default)]
pub struct LabeledImages {
    buckets: BTreeMap<Finding, Vec<LabeledImage>>,
}

impl LabeledImages {
    /// Group the images of `records` that are present under `dataset_dir`
    ///
    /// Records are taken in order; records without a usable filename or whose file
    /// is missing are left out, and a path shared by several records is listed once.
    pub fn from_records(records: &[Record], dataset_dir: &Path) -> Self {
        let mut images = Self::default();
        let mut seen = HashSet::new();

        for record in records {
            let Some(path) = record.local_image_path(dataset_dir) else {
                continue;
            };
            if !path.is_file() || !seen.insert(path.clone()) {
                continue;
            }
            images.push(LabeledImage {
                finding: record.finding,
                path,
                patient_id: Some(record.patient_id.clone()),
            });
        }
        images
    }

    /// Scan the label folders of an existing dataset directory
    ///
    /// Missing label folders are empty buckets. Hidden files and subdirectories are
    /// ignored; each bucket is sorted by path.
    pub async fn from_directory(dataset_dir: &Path) -> Result<Self> {
        let mut images = Self::default();

        for finding in Finding::ALL {
            let dir = dataset_dir.join(folder_name_for(finding));
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::Io(e)),
            };

            let mut bucket = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                if !entry.file_type().await?.is_file() {
                    continue;
                }
                bucket.push(LabeledImage {
                    finding,
                    path: entry.path(),
                    patient_id: None,
                });
            }
            bucket.sort_by(|a, b| a.path.cmp(&b.path));

            tracing::debug!(
                folder = %dir.display(),
                images = bucket.len(),
                "scanned label folder"
            );
            for image in bucket {
                images.push(image);
            }
        }

        Ok(images)
    }

    fn push(&mut self, image: LabeledImage) {
        self.buckets.entry(image.finding).or_default().push(image);
    }

    /// Images filed under `finding`
    pub fn images(&self, finding: Finding) -> &[LabeledImage] {
        self.buckets.get(&finding).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of images filed under `finding`
    pub fn count(&self, finding: Finding) -> usize {
        self.images(finding).len()
    }

    /// Count per label, every label included
    pub fn counts(&self) -> Vec<LabelCount> {
        Finding::ALL
            .into_iter()
            .map(|finding| LabelCount {
                finding,
                folder: folder_name_for(finding).to_string(),
                count: self.count(finding),
            })
            .collect()
    }

    /// Total number of images
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Whether there are no images at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All images, label by label
    pub fn iter(&self) -> impl Iterator<Item = &LabeledImage> {
        self.buckets.values().flatten()
    }
}

/// Per-label evaluation counts
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct LabelMetrics {
    /// Images whose true label is this one
    pub support: usize,
    /// Of those, how many were predicted correctly
    pub correct: usize,
    /// Images predicted as this label
    pub predicted: usize,
}

impl LabelMetrics {
    /// Fraction of predictions of this label that were right
    pub fn precision(&self) -> Option<f64> {
        (self.predicted > 0).then(|| self.correct as f64 / self.predicted as f64)
    }

    /// Fraction of this label's images that were found
    pub fn recall(&self) -> Option<f64> {
        (self.support > 0).then(|| self.correct as f64 / self.support as f64)
    }
}

/// Outcome of evaluating a classifier on labeled images
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct EvaluationMetrics {
    /// Images evaluated
    pub total: usize,
    /// Images predicted correctly
    pub correct: usize,
    /// Breakdown by label
    pub per_label: BTreeMap<Finding, LabelMetrics>,
}

impl EvaluationMetrics {
    /// Tally `(expected, predicted)` pairs
    pub fn from_predictions<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Finding, Finding)>,
    {
        let mut metrics = Self::default();
        for (expected, predicted) in pairs {
            metrics.total += 1;
            metrics.per_label.entry(expected).or_default().support += 1;
            metrics.per_label.entry(predicted).or_default().predicted += 1;
            if expected == predicted {
                metrics.correct += 1;
                metrics.per_label.entry(expected).or_default().correct += 1;
            }
        }
        metrics
    }

    /// Fraction of correct predictions (`None` when nothing was evaluated)
    pub fn accuracy(&self) -> Option<f64> {
        (self.total > 0).then(|| self.correct as f64 / self.total as f64)
    }
}

/// Image classifier trained on the downloaded dataset
///
/// Implementations wrap whatever model runtime is available; this crate never
/// inspects image contents itself.
///
/// # Examples
///
/// ```no_run
/// use chestxray_dl::training::{ImageClassifier, LabeledImages};
///
/// # async fn example(classifier: &mut dyn ImageClassifier) -> chestxray_dl::Result<()> {
/// let images = LabeledImages::from_directory("/data/DataSet".as_ref()).await?;
/// classifier.train(&images).await?;
/// let metrics = classifier.evaluate(&images).await?;
/// println!("accuracy: {:?}", metrics.accuracy());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Fit the model to the labeled images
    async fn train(&mut self, images: &LabeledImages) -> Result<()>;

    /// Predict the label of one image file
    async fn predict(&self, image: &Path) -> Result<Finding>;

    /// Score the model against labeled images
    ///
    /// The default implementation predicts every image in turn.
    async fn evaluate(&self, images: &LabeledImages) -> Result<EvaluationMetrics> {
        let mut pairs = Vec::with_capacity(images.len());
        for image in images.iter() {
            let predicted = self.predict(&image.path).await?;
            pairs.push((image.finding, predicted));
        }
        Ok(EvaluationMetrics::from_predictions(pairs))
    }
}

/// Check that a dataset directory exists before scanning or training on it
pub async fn require_dataset_dir(dataset_dir: &Path) -> Result<()> {
    match tokio::fs::metadata(dataset_dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::Storage(StorageError::CreateDir {
            path: dataset_dir.to_path_buf(),
            reason: "exists but is not a directory".to_string(),
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
            "dataset directory {} does not exist",
            dataset_dir.display()
        ))),
        Err(e) => Err(Error::Io(e)),
    }
}
