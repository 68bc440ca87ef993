use std::f32::consts::PI;

use ndarray::{ArrayView2, ArrayViewMut2};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::Distorter;

/// The value pixels sampled from outside the image take, black after normalization.
const BACKGROUND: f32 = -1.;

const MAX_ROTATION: f32 = PI / 12.;
const MAX_SCALING: f32 = 0.15;
const MAX_SHEARING: f32 = 0.15;
const MAX_TRANSLATION: f32 = 5.;

/// A single affine transformation applied around the center of a square image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Distortion {
    /// Rotation by an angle in radians.
    Rotate(f32),
    /// Uniform scaling by a factor.
    Scale(f32),
    /// Shearing by the same factor on both axes.
    Shear(f32),
    /// Translation by `(dx, dy)` pixels.
    Translate(f32, f32),
}

impl Distortion {
    /// Picks one of the four transformations with the same probability, with parameters uniformly
    /// sampled in: rotation `[-π/12, π/12)`, scaling `[0.85, 1.15)`, shearing `[-0.15, 0.15)` and
    /// translation `[-5, 5)` pixels on each axis.
    pub fn sample<R: Rng>(rng: &mut R) -> Self {
        let mut signed = || 2. * rng.random::<f32>() - 1.;
        let kind = signed();

        match kind {
            k if k < -0.5 => Self::Rotate(signed() * MAX_ROTATION),
            k if k < 0. => Self::Scale(1. + signed() * MAX_SCALING),
            k if k < 0.5 => Self::Shear(signed() * MAX_SHEARING),
            _ => Self::Translate(signed() * MAX_TRANSLATION, signed() * MAX_TRANSLATION),
        }
    }

    /// The linear part and the translation of the transformation, mapping source pixels to
    /// destination pixels relative to the image center.
    fn affine(&self) -> ([[f32; 2]; 2], [f32; 2]) {
        match *self {
            Self::Rotate(angle) => {
                let (sin, cos) = angle.sin_cos();
                ([[cos, -sin], [sin, cos]], [0., 0.])
            }
            Self::Scale(s) => ([[s, 0.], [0., s]], [0., 0.]),
            Self::Shear(k) => ([[1., k], [k, 1.]], [0., 0.]),
            Self::Translate(dx, dy) => ([[1., 0.], [0., 1.]], [dx, dy]),
        }
    }

    /// Renders `src` transformed into `dst` using bilinear interpolation.
    ///
    /// Every destination pixel is mapped back into the source image, destination pixels that fall
    /// outside of it take the background value.
    ///
    /// # Arguments
    /// * `src` - The original image, row-major.
    /// * `dst` - Where to write the transformed image, same shape as `src`.
    pub fn apply(&self, src: ArrayView2<f32>, mut dst: ArrayViewMut2<f32>) {
        let ([[a, b], [c, d]], [tx, ty]) = self.affine();
        let det = a * d - b * c;

        if det == 0. {
            dst.assign(&src);
            return;
        }

        let (rows, cols) = src.dim();
        let cy = (rows as f32 - 1.) / 2.;
        let cx = (cols as f32 - 1.) / 2.;

        for ((y, x), px) in dst.indexed_iter_mut() {
            let u = x as f32 - cx - tx;
            let v = y as f32 - cy - ty;

            let sx = (d * u - b * v) / det + cx;
            let sy = (a * v - c * u) / det + cy;

            *px = bilinear(&src, sx, sy);
        }
    }
}

fn bilinear(src: &ArrayView2<f32>, x: f32, y: f32) -> f32 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let at = |yy: f32, xx: f32| {
        if yy < 0. || xx < 0. {
            return BACKGROUND;
        }

        src.get((yy as usize, xx as usize))
            .copied()
            .unwrap_or(BACKGROUND)
    };

    let top = at(y0, x0) * (1. - fx) + at(y0, x0 + 1.) * fx;
    let bottom = at(y0 + 1., x0) * (1. - fx) + at(y0 + 1., x0 + 1.) * fx;
    top * (1. - fy) + bottom * fy
}

/// Applies a random affine `Distortion` onto square images.
pub struct ImageDistorter<R: Rng> {
    side: usize,
    rng: R,
    scratch: Vec<f32>,
}

impl<R: Rng> ImageDistorter<R> {
    /// Creates a new `ImageDistorter`.
    ///
    /// # Arguments
    /// * `side` - The width and height of the images.
    /// * `rng` - The random number generator to sample distortions with.
    ///
    /// # Returns
    /// A new `ImageDistorter` instance.
    pub fn new(side: usize, rng: R) -> Self {
        Self {
            side,
            rng,
            scratch: vec![0.; side * side],
        }
    }

    pub fn side(&self) -> usize {
        self.side
    }
}

impl ImageDistorter<StdRng> {
    /// Creates a new reproducible `ImageDistorter`.
    pub fn seeded(side: usize, seed: u64) -> Self {
        Self::new(side, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Distorter for ImageDistorter<R> {
    /// # Panics
    /// If the sample isn't a `side × side` image.
    fn distort(&mut self, sample: &mut [f32]) {
        let shape = (self.side, self.side);
        let distortion = Distortion::sample(&mut self.rng);

        self.scratch.copy_from_slice(sample);

        // SAFETY: `copy_from_slice` above already asserted the sample has `side²` values.
        let src = ArrayView2::from_shape(shape, &self.scratch).unwrap();
        let dst = ArrayViewMut2::from_shape(shape, sample).unwrap();
        distortion.apply(src, dst);
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    const SIDE: usize = 5;

    fn dot() -> Array2<f32> {
        let mut image = Array2::from_elem((SIDE, SIDE), BACKGROUND);
        image[[2, 2]] = 1.;
        image
    }

    fn render(distortion: Distortion) -> Array2<f32> {
        let src = dot();
        let mut dst = Array2::zeros((SIDE, SIDE));
        distortion.apply(src.view(), dst.view_mut());
        dst
    }

    #[test]
    fn neutral_transformations_keep_the_image() {
        assert_eq!(render(Distortion::Rotate(0.)), dot());
        assert_eq!(render(Distortion::Scale(1.)), dot());
        assert_eq!(render(Distortion::Shear(0.)), dot());
        assert_eq!(render(Distortion::Translate(0., 0.)), dot());
    }

    #[test]
    fn translation_moves_pixels() {
        let image = render(Distortion::Translate(1., -2.));

        assert_eq!(image[[0, 3]], 1.);
        assert_eq!(image[[2, 2]], BACKGROUND);
    }

    #[test]
    fn out_of_bounds_is_background() {
        let image = render(Distortion::Translate(SIDE as f32, 0.));
        assert!(image.iter().all(|&px| px == BACKGROUND));
    }

    #[test]
    fn sampled_parameters_are_bounded() {
        let mut rng = StdRng::seed_from_u64(0);

        for _ in 0..1000 {
            match Distortion::sample(&mut rng) {
                Distortion::Rotate(a) => assert!(a.abs() <= MAX_ROTATION),
                Distortion::Scale(s) => assert!((s - 1.).abs() <= MAX_SCALING + 1e-6),
                Distortion::Shear(k) => assert!(k.abs() <= MAX_SHEARING),
                Distortion::Translate(dx, dy) => {
                    assert!(dx.abs() <= MAX_TRANSLATION && dy.abs() <= MAX_TRANSLATION)
                }
            }
        }
    }

    #[test]
    fn distorter_keeps_the_shape() {
        let mut distorter = ImageDistorter::seeded(SIDE, 4);
        let mut sample = dot().into_raw_vec_and_offset().0;

        distorter.distort(&mut sample);
        assert_eq!(sample.len(), SIDE * SIDE);
        assert!(sample.iter().all(|px| px.is_finite()));
    }
}
