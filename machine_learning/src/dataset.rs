use std::num::NonZeroUsize;

use crate::{MlErr, Result, evaluation::argmax};

/// Maps a raw byte intensity into `[-1, 1]`.
pub fn normalize(byte: u8) -> f32 {
    byte as f32 / 127.5 - 1.
}

/// An in-memory labeled dataset.
///
/// Samples and one-hot labels are stored back to back in two flat buffers, `x_size` and `y_size`
/// values per record respectively.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    x_size: usize,
    y_size: usize,
    xs: Vec<f32>,
    ys: Vec<f32>,
    classes: Vec<usize>,
}

impl Dataset {
    /// Creates a new `Dataset` from already normalized samples and one-hot labels.
    ///
    /// # Arguments
    /// * `xs` - The flattened samples.
    /// * `ys` - The flattened labels.
    /// * `x_size` - The width of a single sample.
    /// * `y_size` - The width of a single label.
    ///
    /// # Returns
    /// A new `Dataset` or a `ShapeMismatch` if the buffers don't hold the same amount of records.
    pub fn new(xs: Vec<f32>, ys: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        check_record_size("sample width", x_size)?;
        check_record_size("label width", y_size)?;

        let len = xs.len() / x_size;

        if xs.len() % x_size != 0 {
            return Err(MlErr::ShapeMismatch {
                what: "samples buffer",
                got: xs.len(),
                expected: len * x_size,
            });
        }

        if ys.len() != len * y_size {
            return Err(MlErr::ShapeMismatch {
                what: "labels buffer",
                got: ys.len(),
                expected: len * y_size,
            });
        }

        let classes = ys.chunks_exact(y_size).map(argmax).collect();

        Ok(Self {
            x_size,
            y_size,
            xs,
            ys,
            classes,
        })
    }

    /// Creates a new `Dataset` from raw byte intensities and class indices.
    ///
    /// # Arguments
    /// * `pixels` - `x_size` bytes per record, normalized with `normalize`.
    /// * `labels` - One class index per record, one-hot encoded into `y_size` values.
    /// * `x_size` - The width of a single sample.
    /// * `y_size` - The amount of classes.
    ///
    /// # Returns
    /// A new `Dataset`, or an error if the amount of records differ or a class is out of range.
    pub fn from_raw(pixels: &[u8], labels: &[u8], x_size: usize, y_size: usize) -> Result<Self> {
        check_record_size("sample width", x_size)?;
        check_record_size("label width", y_size)?;

        if pixels.len() != labels.len() * x_size {
            return Err(MlErr::ShapeMismatch {
                what: "pixels buffer",
                got: pixels.len(),
                expected: labels.len() * x_size,
            });
        }

        let mut ys = vec![0.; labels.len() * y_size];

        for (one_hot, &class) in ys.chunks_exact_mut(y_size).zip(labels) {
            let class = class as usize;

            if class >= y_size {
                return Err(MlErr::InvalidClass {
                    class,
                    classes: y_size,
                });
            }

            one_hot[class] = 1.;
        }

        Ok(Self {
            x_size,
            y_size,
            xs: pixels.iter().copied().map(normalize).collect(),
            ys,
            classes: labels.iter().map(|&c| c as usize).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn x_size(&self) -> usize {
        self.x_size
    }

    pub fn y_size(&self) -> usize {
        self.y_size
    }

    /// Returns the `i`-th sample and its label.
    ///
    /// # Panics
    /// If `i` is out of bounds.
    pub fn sample(&self, i: usize) -> (&[f32], &[f32]) {
        let x = &self.xs[i * self.x_size..(i + 1) * self.x_size];
        let y = &self.ys[i * self.y_size..(i + 1) * self.y_size];
        (x, y)
    }

    /// Returns the class index of the `i`-th sample.
    pub fn class(&self, i: usize) -> usize {
        self.classes[i]
    }

    pub fn xs(&self) -> &[f32] {
        &self.xs
    }

    /// The samples buffer, for in place augmentation. Labels are never modified.
    pub fn xs_mut(&mut self) -> &mut [f32] {
        &mut self.xs
    }

    pub fn ys(&self) -> &[f32] {
        &self.ys
    }

    /// Iterates the dataset in consecutive batches, the last one may be shorter.
    ///
    /// # Arguments
    /// * `batch_size` - The maximum amount of records per batch.
    pub fn batches(&self, batch_size: NonZeroUsize) -> impl Iterator<Item = Batch<'_>> {
        let batch_size = batch_size.get();

        self.xs
            .chunks(batch_size * self.x_size)
            .zip(self.ys.chunks(batch_size * self.y_size))
            .map(|(xs, ys)| Batch {
                xs,
                ys,
                x_size: self.x_size,
                y_size: self.y_size,
            })
    }

    /// The amount of batches `batches` yields.
    pub fn n_batches(&self, batch_size: NonZeroUsize) -> usize {
        self.len().div_ceil(batch_size.get())
    }
}

/// Borrowed batch view (zero-copy).
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    xs: &'a [f32],
    ys: &'a [f32],
    x_size: usize,
    y_size: usize,
}

impl<'a> Batch<'a> {
    pub fn len(&self) -> usize {
        self.xs.len() / self.x_size
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Iterates the `(sample, label)` pairs of this batch.
    pub fn iter(&self) -> impl Iterator<Item = (&'a [f32], &'a [f32])> + use<'a> {
        self.xs
            .chunks_exact(self.x_size)
            .zip(self.ys.chunks_exact(self.y_size))
    }
}

fn check_record_size(what: &'static str, size: usize) -> Result<()> {
    if size == 0 {
        return Err(MlErr::ShapeMismatch {
            what,
            got: 0,
            expected: 1,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_into_unit_range() {
        assert_eq!(normalize(0), -1.);
        assert_eq!(normalize(255), 1.);
        assert!(normalize(128) > 0.);
    }

    #[test]
    fn from_raw_one_hot_encodes() {
        let ds = Dataset::from_raw(&[0, 255, 255, 0], &[2, 0], 2, 3).unwrap();

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.sample(0), (&[-1., 1.][..], &[0., 0., 1.][..]));
        assert_eq!(ds.sample(1), (&[1., -1.][..], &[1., 0., 0.][..]));
        assert_eq!(ds.class(0), 2);
    }

    #[test]
    fn from_raw_rejects_unknown_class() {
        assert!(matches!(
            Dataset::from_raw(&[0, 0], &[3], 2, 3),
            Err(MlErr::InvalidClass {
                class: 3,
                classes: 3
            })
        ));
    }

    #[test]
    fn new_derives_classes_from_labels() {
        let ds = Dataset::new(vec![0.; 4], vec![0., 1., 1., 0.], 2, 2).unwrap();
        assert_eq!((ds.class(0), ds.class(1)), (1, 0));

        assert!(Dataset::new(vec![0.; 4], vec![0.; 3], 2, 2).is_err());
    }

    #[test]
    fn last_batch_is_short() {
        let xs: Vec<f32> = (0..5).map(|i| i as f32).collect();
        let ds = Dataset::new(xs, vec![1.; 5], 1, 1).unwrap();
        let batch_size = NonZeroUsize::new(2).unwrap();

        let lens: Vec<_> = ds.batches(batch_size).map(|b| b.len()).collect();
        assert_eq!(lens, vec![2, 2, 1]);
        assert_eq!(ds.n_batches(batch_size), 3);

        let last = ds.batches(batch_size).last().unwrap();
        assert_eq!(last.iter().next(), Some((&[4.][..], &[1.][..])));
    }
}
