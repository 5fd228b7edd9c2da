//! Per-pixel q-bin labels.

use crate::util::{CorrError, CorrResult};

/// Row-major `height x width` grid of bin labels.
///
/// Label 0 excludes a pixel; labels `1..=num_bins()` identify q-bins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinMask {
    labels: Vec<u32>,
    height: usize,
    width: usize,
}

impl BinMask {
    /// Creates a mask from row-major labels.
    pub fn new(labels: Vec<u32>, height: usize, width: usize) -> CorrResult<Self> {
        if height == 0 || width == 0 {
            return Err(CorrError::InvalidDimensions {
                frames: 1,
                height,
                width,
            });
        }
        let needed = height
            .checked_mul(width)
            .ok_or(CorrError::InvalidDimensions {
                frames: 1,
                height,
                width,
            })?;
        if labels.len() != needed {
            return Err(CorrError::BufferLength {
                expected: needed,
                got: labels.len(),
            });
        }
        Ok(Self {
            labels,
            height,
            width,
        })
    }

    /// Creates a mask from signed labels, rejecting negative values.
    pub fn from_signed(labels: &[i64], height: usize, width: usize) -> CorrResult<Self> {
        let converted = labels
            .iter()
            .enumerate()
            .map(|(index, &label)| {
                u32::try_from(label).map_err(|_| CorrError::InvalidLabel { index, label })
            })
            .collect::<CorrResult<Vec<u32>>>()?;
        Self::new(converted, height, width)
    }

    /// Builds a mask by evaluating `f(y, x)` for every pixel.
    pub fn from_fn(height: usize, width: usize, mut f: impl FnMut(usize, usize) -> u32) -> CorrResult<Self> {
        let mut labels = Vec::with_capacity(height.saturating_mul(width));
        for y in 0..height {
            for x in 0..width {
                labels.push(f(y, x));
            }
        }
        Self::new(labels, height, width)
    }

    /// Returns the mask height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the mask width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns `(height, width)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Returns the row-major labels.
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Returns the label at `(y, x)` if it is within bounds.
    pub fn get(&self, y: usize, x: usize) -> Option<u32> {
        if y >= self.height || x >= self.width {
            return None;
        }
        self.labels.get(y * self.width + x).copied()
    }

    /// Returns the number of bins, i.e. the largest label.
    pub fn num_bins(&self) -> usize {
        self.labels.iter().copied().max().unwrap_or(0) as usize
    }

    /// Returns the pixels carrying label `bin`, which may be empty.
    pub fn selection(&self, bin: u32) -> PixelSelection {
        let indices = self
            .labels
            .iter()
            .enumerate()
            .filter_map(|(idx, &label)| (label == bin).then_some(idx))
            .collect();
        PixelSelection { bin, indices }
    }

    /// Returns the selections of every bin `1..=num_bins()` in one pass.
    ///
    /// Fails with `NoBins` for an all-zero mask and with `EmptyBin` for the
    /// first label in range that selects no pixel.
    pub fn selections(&self) -> CorrResult<Vec<PixelSelection>> {
        let bins = self.num_bins();
        if bins == 0 {
            return Err(CorrError::NoBins);
        }
        let mut selections: Vec<PixelSelection> = (1..=bins as u32)
            .map(|bin| PixelSelection {
                bin,
                indices: Vec::new(),
            })
            .collect();
        for (idx, &label) in self.labels.iter().enumerate() {
            if label > 0 {
                selections[label as usize - 1].indices.push(idx);
            }
        }
        if let Some(empty) = selections.iter().find(|sel| sel.is_empty()) {
            return Err(CorrError::EmptyBin { bin: empty.bin });
        }
        Ok(selections)
    }
}

/// Linear pixel indices that carry one bin label, in ascending order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelSelection {
    bin: u32,
    indices: Vec<usize>,
}

impl PixelSelection {
    /// Returns the bin label.
    pub fn bin(&self) -> u32 {
        self.bin
    }

    /// Returns the selected linear pixel indices.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Returns the number of selected pixels.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns true if no pixel is selected.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::BinMask;
    use crate::util::CorrError;

    #[test]
    fn selections_group_pixels_by_label() {
        let mask = BinMask::new(vec![0, 1, 2, 1, 2, 2], 2, 3).unwrap();
        assert_eq!(mask.num_bins(), 2);
        let selections = mask.selections().unwrap();
        assert_eq!(selections[0].indices(), &[1, 3]);
        assert_eq!(selections[1].indices(), &[2, 4, 5]);
        assert_eq!(mask.selection(2), selections[1]);
        assert_eq!(mask.selection(0).indices(), &[0]);
    }

    #[test]
    fn gap_in_labels_is_an_empty_bin() {
        let mask = BinMask::new(vec![1, 3, 3, 0], 2, 2).unwrap();
        assert_eq!(mask.selections().err(), Some(CorrError::EmptyBin { bin: 2 }));
    }

    #[test]
    fn all_zero_mask_has_no_bins() {
        let mask = BinMask::new(vec![0; 4], 2, 2).unwrap();
        assert_eq!(mask.selections().err(), Some(CorrError::NoBins));
    }

    #[test]
    fn negative_labels_are_rejected() {
        let err = BinMask::from_signed(&[0, 1, -1, 2], 2, 2).err().unwrap();
        assert_eq!(err, CorrError::InvalidLabel { index: 2, label: -1 });
    }

    #[test]
    fn signed_labels_must_fit_u32() {
        let too_large = i64::from(u32::MAX) + 1;
        let err = BinMask::from_signed(&[1, too_large], 1, 2).err().unwrap();
        assert_eq!(
            err,
            CorrError::InvalidLabel {
                index: 1,
                label: too_large,
            }
        );

        let mask = BinMask::from_signed(&[2, 0, 1, 70_000], 2, 2).unwrap();
        assert_eq!(mask.labels(), &[2, 0, 1, 70_000]);
    }
}
