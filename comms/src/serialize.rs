/// Turns a value into bytes ready to be framed.
pub trait Serialize<'a> {
    /// Should write the serialized value into `buf`.
    ///
    /// # Arguments
    /// * `buf` - The buffer to write the serialized value into.
    ///
    /// # Returns
    /// An optional trailing slice to be sent right after `buf` without copying it.
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]>;
}
