//! Registry of clients waiting for a lease holder's tenure to end.
//!
//! A block names the holder it is watching. It is released (replied `Ok`)
//! as soon as the cache stops showing that holder for the key: the lease
//! expired, was revoked, or changed hands. Cancelled waiters are pruned
//! without disturbing their siblings; release order is registration order.

use super::request::Reply;
use crate::lease::{Info, Key};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

pub(crate) struct Block {
    /// The holder whose tenure is being watched.
    pub holder: String,
    pub reply: Reply,
    pub cancel: CancellationToken,
}

impl Block {
    fn is_dead(&self) -> bool {
        self.cancel.is_cancelled() || self.reply.is_closed()
    }

    /// True once the cache no longer shows the watched holder for the key.
    fn is_satisfied(&self, current: Option<&Info>) -> bool {
        match current {
            Some(info) => info.holder != self.holder,
            None => true,
        }
    }
}

/// Key-addressed waiter lists, owned by the dispatcher.
#[derive(Default)]
pub(crate) struct BlockRegistry {
    blocks: HashMap<Key, Vec<Block>>,
}

impl BlockRegistry {
    pub fn register(&mut self, key: Key, block: Block) {
        self.blocks.entry(key).or_default().push(block);
    }

    /// Replies to every block whose watched holder is gone from `leases`,
    /// in registration order, and prunes cancelled waiters.
    pub fn release_satisfied(&mut self, leases: &HashMap<Key, Info>) {
        let keys: Vec<Key> = self.blocks.keys().cloned().collect();
        for key in keys {
            let waiters = self.blocks.remove(&key).unwrap_or_default();
            let current = leases.get(&key);
            let mut kept = Vec::new();
            for block in waiters {
                if block.is_dead() {
                    continue;
                }
                if block.is_satisfied(current) {
                    let _ = block.reply.send(Ok(()));
                } else {
                    kept.push(block);
                }
            }
            if !kept.is_empty() {
                self.blocks.insert(key, kept);
            }
        }
    }

    /// Drops every block. Waiters observe their reply channel closing.
    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    #[cfg(test)]
    pub fn waiting(&self, key: &Key) -> usize {
        self.blocks.get(key).map_or(0, |w| w.len())
    }
}
