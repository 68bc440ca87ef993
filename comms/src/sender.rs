use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{LEN_TYPE_SIZE, LenType, Serialize};

/// Writes length prefixed frames to a rank.
pub struct FrameSender<W: AsyncWrite + Unpin> {
    tx: W,
    /// Length prefix, message header and any non zero copy body.
    head: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> FrameSender<W> {
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx,
            head: Vec::new(),
        }
    }

    /// Writes `msg` as a single frame and flushes it.
    ///
    /// A gradient's values follow the head directly from the caller's slice, they are never
    /// copied into `head`.
    pub async fn send<'a, T: Serialize<'a>>(&mut self, msg: &'a T) -> io::Result<()> {
        let Self { tx, head } = self;

        head.clear();
        head.resize(LEN_TYPE_SIZE, 0);
        let body = msg.serialize(head);

        let frame_len = head.len() - LEN_TYPE_SIZE + body.map_or(0, <[u8]>::len);
        head[..LEN_TYPE_SIZE].copy_from_slice(&(frame_len as LenType).to_be_bytes());

        tx.write_all(head).await?;
        if let Some(body) = body {
            tx.write_all(body).await?;
        }

        tx.flush().await
    }
}
