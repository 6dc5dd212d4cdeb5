use crate::gatt::peer::PeerId;
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub peer: PeerId,
    pub attribute: Uuid,
    pub value: Vec<u8>,
}

/// Per-peer outbound notification queues. Each queue is FIFO; nothing is
/// ordered across peers beyond the stable peer order of `drain`.
#[derive(Debug, Default)]
pub struct Notifier {
    queues: BTreeMap<PeerId, VecDeque<Notification>>,
}

impl Notifier {
    pub fn new() -> Self {
        Notifier::default()
    }

    /// Queues one notification per subscriber and returns how many were
    /// queued.
    pub fn notify<'a, I>(&mut self, subscribers: I, attribute: Uuid, value: &[u8]) -> usize
    where
        I: IntoIterator<Item = &'a PeerId>,
    {
        let mut queued = 0;
        for peer in subscribers {
            self.queues
                .entry(peer.clone())
                .or_default()
                .push_back(Notification {
                    peer: peer.clone(),
                    attribute,
                    value: value.to_vec(),
                });
            queued += 1;
        }
        log::debug!("Queued {queued} notification(s) for {attribute}");
        queued
    }

    /// Drops everything still queued for a peer that went away.
    pub fn forget(&mut self, peer: &PeerId) {
        if let Some(dropped) = self.queues.remove(peer) {
            if !dropped.is_empty() {
                log::debug!("Dropped {} pending notification(s) for {peer}", dropped.len());
            }
        }
    }

    /// Takes every queued notification, peer by peer, each peer in FIFO order.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.queues)
            .into_values()
            .flatten()
            .collect()
    }
}
