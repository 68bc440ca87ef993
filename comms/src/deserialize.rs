use std::io;

/// Builds a value borrowing from a received frame.
pub trait Deserialize<'a>: Sized {
    /// Should deserialize a value from the bytes of a frame.
    ///
    /// # Arguments
    /// * `buf` - The frame without its length prefix.
    ///
    /// # Returns
    /// The value or an `io::Error` of kind `InvalidData` if the frame is malformed.
    fn deserialize(buf: &'a mut [u8]) -> io::Result<Self>;
}
