use std::{borrow::Cow, time::Duration};

use comms::{
    FrameReceiver, FrameSender,
    msg::{Command, Msg, Payload},
};
use log::{debug, info, warn};
use tokio::{
    net::{
        TcpListener, TcpStream, ToSocketAddrs,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time,
};

use super::AllReduce;
use crate::{Result, WorkerErr};

const CONNECT_ATTEMPTS: usize = 50;
const CONNECT_BACKOFF: Duration = Duration::from_millis(100);

struct Peer {
    rank: usize,
    rx: FrameReceiver<OwnedReadHalf>,
    tx: FrameSender<OwnedWriteHalf>,
}

impl Peer {
    fn new(rank: usize, stream: TcpStream) -> Self {
        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);
        Self { rank, rx, tx }
    }
}

enum Role {
    /// Rank 0, sums the contributions in rank order and broadcasts the result.
    Root { peers: Vec<Peer> },
    Leaf { root: Peer },
}

/// Sum reduction among ranks in different processes, in a star around rank 0.
pub struct TcpAllReduce {
    rank: usize,
    world_size: usize,
    role: Role,
    rx_buf: Vec<f32>,
}

impl TcpAllReduce {
    /// Binds the root rank and waits until every other rank connected and introduced itself.
    ///
    /// # Arguments
    /// * `addr` - The address to listen at.
    /// * `world_size` - The amount of ranks of the job.
    ///
    /// # Returns
    /// The root's handle or an error if a rank introduced itself wrongly.
    pub async fn bind<A: ToSocketAddrs>(addr: A, world_size: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Self::root(listener, world_size).await
    }

    /// Same as `TcpAllReduce::bind` but with an already bound listener.
    pub async fn root(listener: TcpListener, world_size: usize) -> Result<Self> {
        let addr = listener.local_addr()?;
        info!(world_size = world_size; "waiting for {} ranks at {addr}", world_size - 1);

        let mut rx_buf = Vec::new();
        let mut peers: Vec<Peer> = Vec::with_capacity(world_size - 1);

        while peers.len() < world_size - 1 {
            let (stream, addr) = listener.accept().await?;
            stream.set_nodelay(true)?;
            let mut peer = Peer::new(0, stream);

            let rank = match peer.rx.recv_into(&mut rx_buf).await? {
                Msg::Control(Command::Hello {
                    rank,
                    world_size: theirs,
                }) if theirs == world_size => rank,
                Msg::Control(Command::Hello { world_size: theirs, .. }) => {
                    return Err(WorkerErr::Collective(format!(
                        "a rank at {addr} believes the world has {theirs} ranks instead of {world_size}"
                    )));
                }
                other => {
                    return Err(WorkerErr::Collective(format!(
                        "expected a hello from {addr}, got {other:?}"
                    )));
                }
            };

            if rank == 0 || rank >= world_size || peers.iter().any(|p| p.rank == rank) {
                return Err(WorkerErr::Collective(format!(
                    "{addr} introduced itself with an invalid rank {rank}"
                )));
            }

            info!(rank = rank; "rank connected from {addr}");
            peer.rank = rank;
            peers.push(peer);
        }

        peers.sort_by_key(|p| p.rank);

        Ok(Self {
            rank: 0,
            world_size,
            role: Role::Root { peers },
            rx_buf,
        })
    }

    /// Connects a non root rank, retrying while the root is not up yet.
    ///
    /// # Arguments
    /// * `addr` - The root's address.
    /// * `rank` - This rank, in `1..world_size`.
    /// * `world_size` - The amount of ranks of the job.
    pub async fn connect<A>(addr: A, rank: usize, world_size: usize) -> Result<Self>
    where
        A: ToSocketAddrs + Clone,
    {
        let mut attempt = 0;

        let stream = loop {
            match TcpStream::connect(addr.clone()).await {
                Ok(stream) => break stream,
                Err(e) if attempt + 1 < CONNECT_ATTEMPTS => {
                    debug!(rank = rank, attempt = attempt; "root not reachable yet: {e}");
                    attempt += 1;
                    time::sleep(CONNECT_BACKOFF).await;
                }
                Err(e) => return Err(e.into()),
            }
        };

        stream.set_nodelay(true)?;
        let mut root = Peer::new(0, stream);
        let hello = Msg::Control(Command::Hello { rank, world_size });
        root.tx.send(&hello).await?;

        Ok(Self {
            rank,
            world_size,
            role: Role::Leaf { root },
            rx_buf: Vec::new(),
        })
    }

    /// Ends the job for this rank.
    ///
    /// Non root ranks say goodbye, the root waits until every other rank did so.
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            role, mut rx_buf, ..
        } = self;

        match role {
            Role::Root { mut peers } => {
                for peer in &mut peers {
                    match peer.rx.recv_into(&mut rx_buf).await? {
                        Msg::Control(Command::Disconnect) => {
                            debug!(rank = peer.rank; "rank disconnected")
                        }
                        other => {
                            return Err(WorkerErr::Collective(format!(
                                "expected rank {} to disconnect, got {other:?}",
                                peer.rank
                            )));
                        }
                    }
                }
            }
            Role::Leaf { mut root } => {
                root.tx.send(&Msg::Control(Command::Disconnect)).await?;
            }
        }

        Ok(())
    }
}

impl AllReduce for TcpAllReduce {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    async fn reduce_sum(&mut self, buf: &mut [f32]) -> Result<()> {
        let Self { role, rx_buf, .. } = self;

        match role {
            Role::Root { peers } => {
                match gather(peers, rx_buf, buf).await {
                    Err(WorkerErr::Collective(reason)) => {
                        abort(peers, &reason).await;
                        return Err(WorkerErr::Collective(reason));
                    }
                    other => other?,
                }

                let reduced = Msg::Data(Payload::Reduced(buf));
                for peer in peers.iter_mut() {
                    peer.tx.send(&reduced).await?;
                }
            }
            Role::Leaf { root } => {
                root.tx.send(&Msg::Data(Payload::Gradient(buf))).await?;

                match root.rx.recv_into(rx_buf).await? {
                    Msg::Data(Payload::Reduced(sum)) if sum.len() == buf.len() => {
                        buf.copy_from_slice(sum);
                    }
                    Msg::Err(reason) => return Err(WorkerErr::Collective(reason.into_owned())),
                    other => {
                        return Err(WorkerErr::Collective(format!(
                            "expected the reduced sum, got {other:?}"
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Adds the contribution of every peer onto `buf`, in rank order.
async fn gather(peers: &mut [Peer], rx_buf: &mut Vec<f32>, buf: &mut [f32]) -> Result<()> {
    for peer in peers {
        match peer.rx.recv_into(rx_buf).await? {
            Msg::Data(Payload::Gradient(grad)) if grad.len() == buf.len() => {
                for (acc, g) in buf.iter_mut().zip(grad.iter()) {
                    *acc += g;
                }
            }
            Msg::Data(Payload::Gradient(grad)) => {
                return Err(WorkerErr::Collective(format!(
                    "rank {} sent {} values, expected {}",
                    peer.rank,
                    grad.len(),
                    buf.len()
                )));
            }
            other => {
                return Err(WorkerErr::Collective(format!(
                    "rank {} sent {other:?}",
                    peer.rank
                )));
            }
        }
    }

    Ok(())
}

/// Best effort notification of a failed round to every rank.
async fn abort(peers: &mut [Peer], reason: &str) {
    let msg = Msg::Err(Cow::Borrowed(reason));

    for peer in peers {
        if let Err(e) = peer.tx.send(&msg).await {
            warn!(rank = peer.rank; "couldn't notify the failure: {e}");
        }
    }
}
