//! The cross-subsystem hash handoff (§5 "Shared-resource policy", §9
//! "Cross-subsystem hash handoff → one-shot synchronized slot"): the PK MITM
//! task and the HTTP join-patcher task live in separate connections and
//! separate task-groups. `set` always overwrites (a new encryption request
//! supersedes a stale, unconsumed one); `get` awaits a value and clears it.

use parking_lot::Mutex;
use tokio::sync::Notify;

/// A single-writer/single-reader handoff slot, set-with-overwrite,
/// get-with-await-and-clear.
#[derive(Default)]
pub struct ReplacementSlot {
    value: Mutex<Option<String>>,
    notify: Notify,
}

impl ReplacementSlot {
    /// An empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, overwriting (and discarding) any value not yet
    /// consumed by [`Self::get`].
    pub fn set(&self, value: String) {
        *self.value.lock() = Some(value);
        self.notify.notify_one();
    }

    /// Await a value and clear the slot. If a value is already present this
    /// returns immediately.
    pub async fn get(&self) -> String {
        loop {
            if let Some(value) = self.value.lock().take() {
                return value;
            }
            self.notify.notified().await;
        }
    }

    /// Await a value, clearing the slot, but give up after `timeout` if none
    /// ever arrives (§4.K step 5 "Require a non-empty replacement hash
    /// slot"). Returns `None` on timeout.
    pub async fn get_timeout(&self, timeout: std::time::Duration) -> Option<String> {
        tokio::time::timeout(timeout, self.get()).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn get_returns_a_value_set_before_it_was_called() {
        let slot = ReplacementSlot::new();
        slot.set("digest-a".to_string());
        assert_eq!(slot.get().await, "digest-a");
    }

    #[tokio::test]
    async fn get_awaits_a_value_set_afterwards() {
        let slot = Arc::new(ReplacementSlot::new());
        let reader = Arc::clone(&slot);
        let task = tokio::spawn(async move { reader.get().await });
        tokio::task::yield_now().await;
        slot.set("digest-b".to_string());
        assert_eq!(task.await.unwrap(), "digest-b");
    }

    #[tokio::test]
    async fn a_second_set_before_get_overwrites_the_first() {
        let slot = ReplacementSlot::new();
        slot.set("stale".to_string());
        slot.set("fresh".to_string());
        assert_eq!(slot.get().await, "fresh");
    }

    #[tokio::test]
    async fn get_timeout_returns_none_when_nothing_arrives() {
        let slot = ReplacementSlot::new();
        let result = slot.get_timeout(std::time::Duration::from_millis(20)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn get_timeout_returns_a_value_set_before_it_was_called() {
        let slot = ReplacementSlot::new();
        slot.set("digest-c".to_string());
        let result = slot.get_timeout(std::time::Duration::from_millis(20)).await;
        assert_eq!(result, Some("digest-c".to_string()));
    }

    #[tokio::test]
    async fn get_clears_the_slot() {
        let slot = Arc::new(ReplacementSlot::new());
        slot.set("once".to_string());
        assert_eq!(slot.get().await, "once");

        let reader = Arc::clone(&slot);
        let task = tokio::spawn(async move {
            tokio::time::timeout(std::time::Duration::from_millis(20), reader.get()).await
        });
        assert!(task.await.unwrap().is_err(), "slot should still be empty");
    }
}
