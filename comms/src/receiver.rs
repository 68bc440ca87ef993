use std::io;

use bytemuck::Zeroable;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Deserialize, LEN_TYPE_SIZE, LenType};

/// Buffer element types aligned enough to view a frame's payload as `f32`s in place.
pub trait FrameWord: bytemuck::Pod {}

impl FrameWord for u32 {}
impl FrameWord for f32 {}

/// Reads length prefixed frames from a rank.
pub struct FrameReceiver<R: AsyncRead + Unpin> {
    rx: R,
}

impl<R: AsyncRead + Unpin> FrameReceiver<R> {
    pub(super) fn new(rx: R) -> Self {
        Self { rx }
    }

    /// Reads the next frame into `buf` and decodes it in place.
    ///
    /// `buf` is reused across rounds, it only grows when a frame is larger than every previous
    /// one.
    ///
    /// # Arguments
    /// * `buf` - Storage for the frame, the decoded message borrows from it.
    ///
    /// # Returns
    /// The message, or an `io::Error` if the connection dropped or the frame is malformed.
    pub async fn recv_into<'buf, T, B>(&mut self, buf: &'buf mut Vec<B>) -> io::Result<T>
    where
        T: Deserialize<'buf>,
        B: FrameWord,
    {
        let mut prefix = [0; LEN_TYPE_SIZE];
        self.rx.read_exact(&mut prefix).await?;
        let frame_len = LenType::from_be_bytes(prefix) as usize;

        buf.clear();
        buf.resize(frame_len.div_ceil(size_of::<B>()), B::zeroed());

        let frame = &mut bytemuck::cast_slice_mut(buf)[..frame_len];
        self.rx.read_exact(frame).await?;

        T::deserialize(frame)
    }
}
