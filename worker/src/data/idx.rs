use std::{
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom},
    path::Path,
};

use machine_learning::dataset::Dataset;

use super::ShardSpec;
use crate::{Result, config::DatasetFiles};

/// Bytes before the first image: magic number, count, rows and columns.
pub const IMAGES_HEADER: u64 = 16;
/// Bytes before the first label: magic number and count.
pub const LABELS_HEADER: u64 = 8;

/// Reads a rank's shard of an IDX dataset.
///
/// # Arguments
/// * `files` - The images and labels files and the amount of records to split.
/// * `x_size` - The amount of pixels per image.
/// * `y_size` - The amount of classes.
/// * `shard` - The rank whose records to read.
///
/// # Returns
/// The normalized shard, an `Io` error if the files are missing or too short.
pub fn read_shard(
    files: &DatasetFiles,
    x_size: usize,
    y_size: usize,
    shard: ShardSpec,
) -> Result<Dataset> {
    let range = shard.range(files.samples);
    read_records(files, x_size, y_size, range.start, range.len())
}

/// Reads every record of an IDX dataset, used for held-out evaluation.
pub fn read_dataset(files: &DatasetFiles, x_size: usize, y_size: usize) -> Result<Dataset> {
    read_records(files, x_size, y_size, 0, files.samples)
}

fn read_records(
    files: &DatasetFiles,
    x_size: usize,
    y_size: usize,
    start: usize,
    count: usize,
) -> Result<Dataset> {
    let pixels = read_block(&files.images, IMAGES_HEADER, x_size, start, count)?;
    let labels = read_block(&files.labels, LABELS_HEADER, 1, start, count)?;
    Ok(Dataset::from_raw(&pixels, &labels, x_size, y_size)?)
}

fn read_block(
    path: &Path,
    header: u64,
    record_len: usize,
    start: usize,
    count: usize,
) -> io::Result<Vec<u8>> {
    let mut reader = BufReader::new(File::open(path)?);
    read_at(&mut reader, header, record_len, start, count)
}

/// Reads `count` fixed size records starting at the `start`-th one, after a header.
pub fn read_at<R: Read + Seek>(
    reader: &mut R,
    header: u64,
    record_len: usize,
    start: usize,
    count: usize,
) -> io::Result<Vec<u8>> {
    let offset = header + (start * record_len) as u64;
    reader.seek(SeekFrom::Start(offset))?;

    let mut buf = vec![0; count * record_len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn skips_header_and_previous_shards() {
        let mut file: Vec<u8> = vec![0xff; 8];
        file.extend(0..12);

        let got = read_at(&mut Cursor::new(file), 8, 3, 2, 2).unwrap();
        assert_eq!(got, vec![6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn short_file_is_unexpected_eof() {
        let file = vec![0; 10];
        let err = read_at(&mut Cursor::new(file), 8, 2, 0, 2).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
