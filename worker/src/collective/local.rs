use std::{num::NonZeroUsize, sync::Arc};

use parking_lot::{Mutex, RwLock};
use tokio::sync::Barrier;

use super::AllReduce;
use crate::{Result, WorkerErr};

/// The outcome of the last round.
#[derive(Default)]
struct Round {
    sum: Vec<f32>,
    mismatch: Option<String>,
}

impl Round {
    /// Sums the contributions in rank order.
    fn reduce(&mut self, slots: &[Mutex<Vec<f32>>]) {
        self.sum.clear();
        self.mismatch = None;

        let len = {
            let first = slots[0].lock();
            self.sum.extend_from_slice(&first);
            first.len()
        };

        for (rank, slot) in slots.iter().enumerate().skip(1) {
            let slot = slot.lock();

            if slot.len() != len {
                self.mismatch = Some(format!(
                    "rank 0 sent {len} values but rank {rank} sent {}",
                    slot.len()
                ));
                return;
            }

            for (sum, x) in self.sum.iter_mut().zip(slot.iter()) {
                *sum += x;
            }
        }
    }
}

struct Shared {
    slots: Vec<Mutex<Vec<f32>>>,
    result: RwLock<Round>,
    barrier: Barrier,
}

/// Sum reduction among ranks living in the same process, one per task.
///
/// Each round every rank copies its buffer into its own slot and waits on a barrier, the barrier's
/// leader publishes the sum of the slots, a second wait releases everyone to read it. The next
/// round can't overwrite the sum until every rank arrives at its first barrier, after having read
/// it.
pub struct LocalAllReduce {
    rank: usize,
    world_size: usize,
    shared: Arc<Shared>,
}

impl LocalAllReduce {
    /// Creates the handles of every rank of a local world.
    ///
    /// # Arguments
    /// * `world_size` - The amount of ranks.
    ///
    /// # Returns
    /// One handle per rank, ordered by rank.
    pub fn group(world_size: NonZeroUsize) -> Vec<Self> {
        let n = world_size.get();
        let shared = Arc::new(Shared {
            slots: (0..n).map(|_| Mutex::new(Vec::new())).collect(),
            result: RwLock::new(Round::default()),
            barrier: Barrier::new(n),
        });

        (0..n)
            .map(|rank| Self {
                rank,
                world_size: n,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl AllReduce for LocalAllReduce {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    async fn reduce_sum(&mut self, buf: &mut [f32]) -> Result<()> {
        let shared = &self.shared;

        {
            let mut slot = shared.slots[self.rank].lock();
            slot.clear();
            slot.extend_from_slice(buf);
        }

        if shared.barrier.wait().await.is_leader() {
            shared.result.write().reduce(&shared.slots);
        }

        shared.barrier.wait().await;

        let result = shared.result.read();
        if let Some(reason) = &result.mismatch {
            return Err(WorkerErr::Collective(reason.clone()));
        }

        buf.copy_from_slice(&result.sum);
        Ok(())
    }
}
