use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use crate::{MlErr, NetworkLayout, NetworkState, Result};

pub const WEIGHTS_FILE: &str = "weights.bin";
pub const BIASES_FILE: &str = "biases.bin";

const F32_SIZE: usize = size_of::<f32>();

/// Persists networks as two raw `f32` streams, one for the weights and one for the biases.
///
/// Both streams have no header, they hold the values in export order using the host's `f32` byte
/// layout. The network's shape is never stored, it has to be known when loading.
#[derive(Clone, Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Creates a new `CheckpointStore`.
    ///
    /// # Arguments
    /// * `dir` - The directory holding `weights.bin` and `biases.bin`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(WEIGHTS_FILE)
    }

    pub fn biases_path(&self) -> PathBuf {
        self.dir.join(BIASES_FILE)
    }

    /// Whether both checkpoint files are present.
    pub fn exists(&self) -> bool {
        self.weights_path().is_file() && self.biases_path().is_file()
    }

    /// Writes the network's parameters, creating the directory if needed.
    ///
    /// # Arguments
    /// * `state` - The network to persist.
    ///
    /// # Returns
    /// An `Io` error if any of the files can't be written.
    pub fn save(&self, state: &NetworkState) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let weights = BufWriter::new(File::create(self.weights_path())?);
        let biases = BufWriter::new(File::create(self.biases_path())?);
        save_to(state, weights, biases)
    }

    /// Reads a network of the given shape.
    ///
    /// # Arguments
    /// * `sizes` - The amount of neurons in each layer of the stored network.
    ///
    /// # Returns
    /// The stored network, an `Io` error if any of the files can't be opened or a
    /// `CheckpointSizeMismatch` if their lengths don't match `sizes`.
    pub fn load(&self, sizes: &[usize]) -> Result<NetworkState> {
        let weights = BufReader::new(File::open(self.weights_path())?);
        let biases = BufReader::new(File::open(self.biases_path())?);
        load_from(sizes, weights, biases)
    }
}

/// Writes the network's weights and biases into two writers.
pub fn save_to<W, B>(state: &NetworkState, mut weights: W, mut biases: B) -> Result<()>
where
    W: Write,
    B: Write,
{
    weights.write_all(bytemuck::cast_slice(state.weights()))?;
    weights.flush()?;

    biases.write_all(bytemuck::cast_slice(state.biases()))?;
    biases.flush()?;
    Ok(())
}

/// Reads a network of the given shape from two readers.
///
/// The readers must hold exactly as many values as the network needs, a single byte more or less
/// fails with `CheckpointSizeMismatch`.
pub fn load_from<W, B>(sizes: &[usize], weights: W, biases: B) -> Result<NetworkState>
where
    W: Read,
    B: Read,
{
    let layout = NetworkLayout::new(sizes)?;
    let weights = read_values("weights", weights, layout.n_weights())?;
    let biases = read_values("biases", biases, layout.n_biases())?;

    NetworkState::from_parts(sizes, &weights, &biases)
}

fn read_values<R: Read>(what: &'static str, mut reader: R, n: usize) -> Result<Vec<f32>> {
    let mut bytes = Vec::with_capacity(n * F32_SIZE);
    reader.read_to_end(&mut bytes)?;

    if bytes.len() != n * F32_SIZE {
        return Err(MlErr::CheckpointSizeMismatch {
            what,
            got: bytes.len(),
            expected: n * F32_SIZE,
        });
    }

    let mut values = vec![0.; n];
    bytemuck::cast_slice_mut(&mut values).copy_from_slice(&bytes);
    Ok(values)
}

#[cfg(test)]
mod tests {
    use std::{env, io::Cursor, process};

    use super::*;

    const SIZES: [usize; 3] = [4, 3, 2];

    fn temp_dir(name: &str) -> PathBuf {
        env::temp_dir().join(format!("checkpoint-{name}-{}", process::id()))
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let dir = temp_dir("round-trip");
        let store = CheckpointStore::new(&dir);
        let state = NetworkState::seeded(&SIZES, 17).unwrap();

        store.save(&state).unwrap();
        assert!(store.exists());

        let loaded = store.load(&SIZES).unwrap();
        let bits = |xs: &[f32]| xs.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(loaded.params()), bits(state.params()));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn streams_are_raw_values() {
        let state = NetworkState::from_parts(&[1, 1], &[1.5], &[-2.]).unwrap();
        let (mut weights, mut biases) = (Vec::new(), Vec::new());

        save_to(&state, &mut weights, &mut biases).unwrap();
        assert_eq!(weights, 1.5f32.to_ne_bytes());
        assert_eq!(biases, (-2f32).to_ne_bytes());
    }

    #[test]
    fn truncated_stream_is_a_size_mismatch() {
        let state = NetworkState::seeded(&SIZES, 17).unwrap();
        let (mut weights, mut biases) = (Vec::new(), Vec::new());
        save_to(&state, &mut weights, &mut biases).unwrap();

        weights.pop();
        let err = load_from(&SIZES, Cursor::new(&weights), Cursor::new(&biases)).unwrap_err();

        assert!(matches!(
            err,
            MlErr::CheckpointSizeMismatch {
                what: "weights",
                got: 71,
                expected: 72
            }
        ));
    }

    #[test]
    fn missing_files_are_io_errors() {
        let store = CheckpointStore::new(temp_dir("missing"));

        assert!(!store.exists());
        assert!(matches!(store.load(&SIZES), Err(MlErr::Io(_))));
    }
}
