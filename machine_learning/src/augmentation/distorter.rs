/// A randomized, shape preserving transformation of a single sample.
pub trait Distorter {
    /// Should distort `sample` in place.
    ///
    /// # Arguments
    /// * `sample` - A single sample, its length must not change.
    fn distort(&mut self, sample: &mut [f32]);
}
