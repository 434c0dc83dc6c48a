use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::types::Hand;

/// Creates the one-deep handoff between the recognizer thread and the frame loop.
///
/// The writer overwrites whatever the reader has not consumed yet; the reader
/// keeps the last list it saw so every frame has something to track, even
/// when detection runs slower than rendering.
pub fn latest_hands() -> (HandsWriter, HandsReader) {
    let (tx, rx) = bounded(1);
    (
        HandsWriter {
            tx,
            evict: rx.clone(),
        },
        HandsReader {
            rx,
            hands: Vec::new(),
        },
    )
}

#[derive(Clone)]
pub struct HandsWriter {
    tx: Sender<Vec<Hand>>,
    evict: Receiver<Vec<Hand>>,
}

impl HandsWriter {
    /// Publishes a detection result, dropping an unread older one.
    pub fn publish(&self, mut hands: Vec<Hand>) {
        // The writer holds a receiver for eviction, so the channel never disconnects.
        while let Err(TrySendError::Full(rejected)) = self.tx.try_send(hands) {
            let _ = self.evict.try_recv();
            hands = rejected;
        }
    }
}

pub struct HandsReader {
    rx: Receiver<Vec<Hand>>,
    hands: Vec<Hand>,
}

impl HandsReader {
    /// Pulls the newest published list, if any. Returns whether it changed.
    pub fn poll(&mut self) -> bool {
        let mut fresh = None;
        while let Ok(hands) = self.rx.try_recv() {
            fresh = Some(hands);
        }
        match fresh {
            Some(hands) => {
                self.hands = hands;
                true
            }
            None => false,
        }
    }

    pub fn hands(&self) -> &[Hand] {
        &self.hands
    }
}
