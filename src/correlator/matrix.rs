//! Bin x lag result matrix.

/// Dense `bins x lags` matrix of g2 values.
///
/// Row `b` holds bin `b + 1`; column `lag - 1` holds lag `lag`, so a stack of
/// `N` frames produces `N - 1` columns.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationMatrix {
    bins: usize,
    lags: usize,
    data: Vec<f64>,
}

impl CorrelationMatrix {
    pub(crate) fn from_vec(bins: usize, lags: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), bins * lags);
        Self { bins, lags, data }
    }

    /// Returns the number of bins (rows).
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Returns the number of lags (columns).
    pub fn lags(&self) -> usize {
        self.lags
    }

    /// Returns the g2 curve of bin row `row`.
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row >= self.bins {
            return None;
        }
        self.data.get(row * self.lags..(row + 1) * self.lags)
    }

    /// Iterates over rows in bin order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.lags.max(1)).take(self.bins)
    }

    /// Returns g2 for bin row `row` at `lag` (1-based).
    pub fn get(&self, row: usize, lag: usize) -> Option<f64> {
        if lag == 0 || lag > self.lags {
            return None;
        }
        self.row(row).map(|r| r[lag - 1])
    }

    /// Returns the row-major values.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Consumes the matrix and returns the row-major values.
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Maximum absolute elementwise difference per bin against `other`.
    ///
    /// Returns `None` when the shapes differ.
    pub fn max_abs_diff_per_bin(&self, other: &CorrelationMatrix) -> Option<Vec<f64>> {
        if self.bins != other.bins || self.lags != other.lags {
            return None;
        }
        Some(
            self.rows()
                .zip(other.rows())
                .map(|(a, b)| {
                    a.iter()
                        .zip(b)
                        .map(|(x, y)| (x - y).abs())
                        .fold(0.0f64, f64::max)
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::CorrelationMatrix;

    #[test]
    fn lag_indexing_is_one_based() {
        let m = CorrelationMatrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(m.get(0, 1), Some(1.0));
        assert_eq!(m.get(1, 3), Some(6.0));
        assert_eq!(m.get(1, 0), None);
        assert_eq!(m.get(1, 4), None);
        assert_eq!(m.row(2), None);
        assert_eq!(m.rows().count(), 2);
    }

    #[test]
    fn max_abs_diff_reports_each_bin() {
        let a = CorrelationMatrix::from_vec(2, 2, vec![1.0, 1.0, 2.0, 2.0]);
        let b = CorrelationMatrix::from_vec(2, 2, vec![1.5, 0.9, 2.0, 1.75]);
        let diff = a.max_abs_diff_per_bin(&b).unwrap();
        assert!((diff[0] - 0.5).abs() < 1e-12);
        assert!((diff[1] - 0.25).abs() < 1e-12);

        let c = CorrelationMatrix::from_vec(1, 2, vec![0.0, 0.0]);
        assert!(a.max_abs_diff_per_bin(&c).is_none());
    }
}
