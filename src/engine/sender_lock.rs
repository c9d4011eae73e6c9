//! Per-sender critical section
//!
//! Nonce fetch, build, sign and submit for one sending account run under a
//! single async mutex, so two swaps from the same account can never be built
//! with the same nonce. The slot also remembers the last nonce this process
//! broadcast, which covers nodes whose pending count has not caught up yet.

use std::sync::Arc;

use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// State guarded by a sender's lock
#[derive(Debug, Default)]
pub struct SenderSlot {
    last_submitted: Option<u64>,
}

impl SenderSlot {
    /// Lowest nonce the next transaction may use, if any was broadcast before
    pub fn nonce_floor(&self) -> Option<u64> {
        self.last_submitted.map(|n| n.saturating_add(1))
    }

    /// Remember a nonce that a node may now hold
    pub fn record_submitted(&mut self, nonce: u64) {
        self.last_submitted = Some(self.last_submitted.map_or(nonce, |n| n.max(nonce)));
    }

    pub fn last_submitted(&self) -> Option<u64> {
        self.last_submitted
    }
}

/// Lock table keyed by sending account
#[derive(Default)]
pub struct SenderLocks {
    slots: DashMap<Pubkey, Arc<Mutex<SenderSlot>>>,
}

impl SenderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `sender`'s slot
    ///
    /// The owned guard can move into a spawned task, so the section survives
    /// the caller's future being dropped.
    pub async fn acquire(&self, sender: &Pubkey) -> OwnedMutexGuard<SenderSlot> {
        let slot = self
            .slots
            .entry(*sender)
            .or_insert_with(|| Arc::new(Mutex::new(SenderSlot::default())))
            .clone();
        slot.lock_owned().await
    }

    pub fn tracked_senders(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_nonce_floor() {
        let mut slot = SenderSlot::default();
        assert_eq!(slot.nonce_floor(), None);
        slot.record_submitted(4);
        slot.record_submitted(2);
        assert_eq!(slot.last_submitted(), Some(4));
        assert_eq!(slot.nonce_floor(), Some(5));
    }

    #[tokio::test]
    async fn test_same_sender_serialized() {
        let locks = Arc::new(SenderLocks::new());
        let sender = Pubkey::new_unique();

        let guard = locks.acquire(&sender).await;
        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let mut slot = locks2.acquire(&sender).await;
            slot.record_submitted(1);
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();

        assert_eq!(locks.acquire(&sender).await.last_submitted(), Some(1));
    }

    #[tokio::test]
    async fn test_distinct_senders_independent() {
        let locks = SenderLocks::new();
        let _a = locks.acquire(&Pubkey::new_unique()).await;
        let _b = locks.acquire(&Pubkey::new_unique()).await;
        assert_eq!(locks.tracked_senders(), 2);
    }
}
