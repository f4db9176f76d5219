use crate::dataset::error::DatasetError;
use ndarray::{Array2, Axis};

/// Dense design matrix with integer class labels.
///
/// Rows of `x` are samples; `y[i]` is the encoded class of row `i`.
#[derive(Clone, Debug)]
pub struct InMemoryDataset {
    x: Array2<f64>,
    y: Vec<usize>,
}

impl InMemoryDataset {
    /// Pair a matrix with its labels.
    ///
    /// ```
    /// use koi_classifier::dataset::InMemoryDataset;
    /// use ndarray::array;
    ///
    /// let ds = InMemoryDataset::new(array![[0.5, 1.0], [2.0, 3.0]], vec![1, 0]).unwrap();
    /// assert_eq!((ds.n_samples(), ds.n_features(), ds.n_classes()), (2, 2, 2));
    /// assert!(InMemoryDataset::new(array![[0.5, 1.0]], vec![1, 0]).is_err());
    /// ```
    ///
    /// # Errors
    /// [`DatasetError::LengthMismatch`] when `y` does not have one label per
    /// row, [`DatasetError::Empty`] when there are no rows.
    pub fn new(x: Array2<f64>, y: Vec<usize>) -> Result<Self, DatasetError> {
        if x.nrows() != y.len() {
            return Err(DatasetError::LengthMismatch {
                column: "<labels>".to_string(),
                expected: x.nrows(),
                got: y.len(),
            });
        }
        if x.nrows() == 0 {
            return Err(DatasetError::Empty("dataset has no rows".to_string()));
        }
        Ok(Self { x, y })
    }

    /// Feature matrix, one row per sample.
    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    /// Encoded class labels.
    pub fn y(&self) -> &[usize] {
        &self.y
    }

    /// Number of rows.
    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    /// Number of columns of `x`.
    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Number of classes, taken as `max(y) + 1`.
    pub fn n_classes(&self) -> usize {
        self.y.iter().max().map_or(0, |&m| m + 1)
    }

    /// Rows at `indices`, in order.
    pub fn subset(&self, indices: &[usize]) -> InMemoryDataset {
        InMemoryDataset {
            x: self.x.select(Axis(0), indices),
            y: indices.iter().map(|&i| self.y[i]).collect(),
        }
    }

    /// Give back the matrix and labels without copying.
    pub fn into_parts(self) -> (Array2<f64>, Vec<usize>) {
        (self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_new_rejects_mismatch() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(matches!(
            InMemoryDataset::new(x, vec![0]),
            Err(DatasetError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_new_rejects_empty() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(matches!(
            InMemoryDataset::new(x, vec![]),
            Err(DatasetError::Empty(_))
        ));
    }

    #[test]
    fn test_subset_and_classes() {
        let x = array![[1.0], [2.0], [3.0]];
        let ds = InMemoryDataset::new(x, vec![0, 2, 1]).unwrap();
        assert_eq!(ds.n_classes(), 3);

        let sub = ds.subset(&[2, 0]);
        assert_eq!(sub.n_samples(), 2);
        assert_eq!(sub.x()[[0, 0]], 3.0);
        assert_eq!(sub.y(), &[1, 0]);
    }
}
