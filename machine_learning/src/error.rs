use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    InvalidLayerSizes(String),
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    CheckpointSizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidClass {
        class: usize,
        classes: usize,
    },
    InvalidRange(String),
    Io(io::Error),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::InvalidLayerSizes(reason) => write!(f, "invalid layer sizes: {reason}"),
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a shape mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::CheckpointSizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "The {what} checkpoint has {got} bytes but the network needs {expected}"
            ),
            MlErr::InvalidClass { class, classes } => {
                write!(f, "label {class} is out of range for {classes} classes")
            }
            MlErr::InvalidRange(reason) => write!(f, "invalid sampling range: {reason}"),
            MlErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rand_distr::uniform::Error> for MlErr {
    fn from(value: rand_distr::uniform::Error) -> Self {
        Self::InvalidRange(value.to_string())
    }
}
