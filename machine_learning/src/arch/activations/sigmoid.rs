/// The logistic activation `1 / (1 + e^-z)`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sigmoid;

impl Sigmoid {
    pub fn new() -> Self {
        Self
    }

    pub fn f(&self, z: f32) -> f32 {
        1. / (1. + (-z).exp())
    }

    /// The derivative of the sigmoid written in terms of its own output.
    ///
    /// # Arguments
    /// * `a` - An already activated value, that is `f(z)`.
    pub fn df(&self, a: f32) -> f32 {
        a * (1. - a)
    }
}
