//! Label encoding for the target column.
//!
//! Maps class label strings to integer codes `0..n_classes`. Classes are
//! sorted lexicographically, so `candidate` encodes to 0 and `non-candidate`
//! to 1 regardless of the order the labels appear in.

use crate::preprocessing::error::PreprocessingError;
use crate::serialization::SerializableParams;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Label encoder for string targets.
///
/// # Example
/// ```rust
/// use koi_classifier::preprocessing::LabelEncoder;
///
/// let labels = ["FALSE POSITIVE", "CONFIRMED", "CANDIDATE", "CONFIRMED"];
/// let fitted = LabelEncoder::new().fit(&labels).unwrap();
///
/// assert_eq!(fitted.classes(), &["CANDIDATE", "CONFIRMED", "FALSE POSITIVE"]);
/// assert_eq!(fitted.transform(&labels).unwrap(), vec![2, 1, 0, 1]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct LabelEncoder;

impl LabelEncoder {
    /// Create a new LabelEncoder.
    pub fn new() -> Self {
        Self
    }

    /// Fit the encoder to the labels and return the fitted encoder.
    pub fn fit<S: AsRef<str>>(&self, labels: &[S]) -> Result<FittedLabelEncoder, PreprocessingError> {
        if labels.is_empty() {
            return Err(PreprocessingError::EmptyData(
                "Cannot fit LabelEncoder on empty data".to_string(),
            ));
        }

        let classes: BTreeSet<&str> = labels.iter().map(AsRef::as_ref).collect();
        FittedLabelEncoder::from_params(LabelEncoderParams {
            classes: classes.into_iter().map(str::to_string).collect(),
        })
    }

    /// Fit and transform in one step.
    pub fn fit_transform<S: AsRef<str>>(
        &self,
        labels: &[S],
    ) -> Result<(FittedLabelEncoder, Vec<usize>), PreprocessingError> {
        let fitted = self.fit(labels)?;
        let encoded = fitted.transform(labels)?;
        Ok((fitted, encoded))
    }
}

/// Serializable parameters for a fitted LabelEncoder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LabelEncoderParams {
    /// Unique classes in sorted order.
    pub classes: Vec<String>,
}

/// Fitted LabelEncoder ready for inference.
#[derive(Clone, Debug)]
pub struct FittedLabelEncoder {
    classes: Vec<String>,
    class_to_idx: HashMap<String, usize>,
}

impl FittedLabelEncoder {
    /// Unique classes in code order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Code of a single label.
    pub fn encode(&self, label: &str) -> Result<usize, PreprocessingError> {
        self.class_to_idx
            .get(label)
            .copied()
            .ok_or_else(|| PreprocessingError::UnknownLabel(label.to_string()))
    }

    /// Transform labels to codes.
    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>, PreprocessingError> {
        labels.iter().map(|label| self.encode(label.as_ref())).collect()
    }

    /// Map codes back to their labels.
    pub fn inverse_transform(&self, codes: &[usize]) -> Result<Vec<String>, PreprocessingError> {
        codes
            .iter()
            .map(|&code| {
                self.classes.get(code).cloned().ok_or_else(|| {
                    PreprocessingError::InvalidParameter(format!(
                        "Index {} out of bounds for {} classes",
                        code,
                        self.classes.len()
                    ))
                })
            })
            .collect()
    }

    /// Extract parameters for serialization.
    pub fn extract_params(&self) -> LabelEncoderParams {
        LabelEncoderParams {
            classes: self.classes.clone(),
        }
    }

    /// Reconstruct from parameters.
    pub fn from_params(params: LabelEncoderParams) -> Result<Self, PreprocessingError> {
        if params.classes.is_empty() {
            return Err(PreprocessingError::EmptyData(
                "LabelEncoder has no classes".to_string(),
            ));
        }
        let mut class_to_idx = HashMap::with_capacity(params.classes.len());
        for (idx, class) in params.classes.iter().enumerate() {
            if class_to_idx.insert(class.clone(), idx).is_some() {
                return Err(PreprocessingError::InvalidParameter(format!(
                    "duplicate class {:?}",
                    class
                )));
            }
        }
        Ok(Self {
            classes: params.classes,
            class_to_idx,
        })
    }

    /// Save to file.
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> std::io::Result<()> {
        crate::serialization::write_params(&self.extract_params(), path)
    }

    /// Load from file.
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, PreprocessingError> {
        let bytes = std::fs::read(path)?;
        let params = LabelEncoderParams::from_bytes(&bytes)
            .map_err(|e| PreprocessingError::SerializationError(e.to_string()))?;
        Self::from_params(params)
    }
}
