//! Post-commit change notifications.

use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};
use tracing::trace;
use upll_types::{ConfigKeyVal, DataType, Operation};

/// Fire-and-forget sink for committed changes.
pub trait ConfigNotifier: Send + Sync {
    fn buffer_notification(&self, op: Operation, dt: DataType, ckv: &ConfigKeyVal);
}

/// One buffered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub op: Operation,
    pub dt: DataType,
    pub ckv: ConfigKeyVal,
    pub timestamp: DateTime<Utc>,
}

/// Notifier that keeps every notification until drained.
#[derive(Debug, Default)]
pub struct BufferedNotifier {
    pending: Mutex<Vec<Notification>>,
}

impl BufferedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every buffered notification, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *pending)
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConfigNotifier for BufferedNotifier {
    fn buffer_notification(&self, op: Operation, dt: DataType, ckv: &ConfigKeyVal) {
        trace!(op = %op, dt = %dt, key = %ckv.key, "buffering notification");
        let mut stripped = ckv.clone();
        stripped.strip_user_data();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Notification {
                op,
                dt,
                ckv: stripped,
                timestamp: Utc::now(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upll_types::KeyVtn;

    #[test]
    fn test_drain_empties_buffer() {
        let notifier = BufferedNotifier::new();
        let ckv = ConfigKeyVal::new(KeyVtn::new("vtn1")).on_ctrlr("c1", "d1");
        notifier.buffer_notification(Operation::Create, DataType::Running, &ckv);
        notifier.buffer_notification(Operation::Delete, DataType::Running, &ckv);
        assert_eq!(notifier.len(), 2);

        let drained = notifier.drain();
        assert!(notifier.is_empty());
        assert_eq!(drained[0].op, Operation::Create);
        assert_eq!(drained[1].op, Operation::Delete);
        assert_eq!(drained[0].ckv.ctrlr_id(), None);
        assert!(drained[0].timestamp <= drained[1].timestamp);
    }
}
