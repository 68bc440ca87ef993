//! Framing for the messages ranks exchange while reducing gradients.
//!
//! A frame is a big endian `u64` byte count followed by the message. Gradient payloads are
//! written straight from the caller's slice and read back as `f32` views into the receive
//! buffer, so a reduction round copies each gradient once per hop.

mod deserialize;
pub mod msg;
mod receiver;
mod sender;
mod serialize;

use tokio::io::{AsyncRead, AsyncWrite};

pub use deserialize::Deserialize;
pub use receiver::{FrameReceiver, FrameWord};
pub use sender::FrameSender;
pub use serialize::Serialize;

type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();

/// Wraps the two halves of a connection between ranks.
///
/// # Arguments
/// * `rx` - The half frames are read from.
/// * `tx` - The half frames are written to.
///
/// # Returns
/// The receiving and sending ends of the connection.
pub fn channel<R, W>(rx: R, tx: W) -> (FrameReceiver<R>, FrameSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (FrameReceiver::new(rx), FrameSender::new(tx))
}
