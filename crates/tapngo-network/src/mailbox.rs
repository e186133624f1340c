//! Single-slot, last-write-wins handoff between the channel task and the
//! tick loop.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tapngo_core::ClassificationUpdate;

/// Holds at most one pending classification update.
///
/// Writing replaces whatever was there; reading empties the slot. Both are a
/// single short critical section, so the tick loop never waits on the
/// network task for longer than an `Option::take`.
///
/// # Examples
///
/// ```
/// use tapngo_core::{ClassificationUpdate, ItemLabel, Timestamp};
/// use tapngo_network::LabelMailbox;
///
/// let mailbox = LabelMailbox::new();
/// let bento = ItemLabel::new("bento").unwrap();
/// let bowl = ItemLabel::new("rice-bowl").unwrap();
///
/// mailbox.post(ClassificationUpdate::new(bento, Timestamp::from_millis(10)));
/// mailbox.post(ClassificationUpdate::new(bowl.clone(), Timestamp::from_millis(20)));
///
/// let update = mailbox.try_take().unwrap();
/// assert_eq!(update.label, bowl);
/// assert!(mailbox.try_take().is_none());
/// ```
#[derive(Debug, Default)]
pub struct LabelMailbox {
    slot: Mutex<Option<ClassificationUpdate>>,
}

impl LabelMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `update`, returning the one it overwrote.
    pub fn post(&self, update: ClassificationUpdate) -> Option<ClassificationUpdate> {
        self.lock().replace(update)
    }

    /// Take the pending update, leaving the slot empty.
    pub fn try_take(&self) -> Option<ClassificationUpdate> {
        self.lock().take()
    }

    /// Returns `true` if an update is waiting.
    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    // A panic while holding the lock cannot leave the Option half-written.
    fn lock(&self) -> MutexGuard<'_, Option<ClassificationUpdate>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tapngo_core::{ItemLabel, Timestamp};

    fn update(label: &str, at: u64) -> ClassificationUpdate {
        ClassificationUpdate::new(ItemLabel::new(label).unwrap(), Timestamp::from_millis(at))
    }

    #[test]
    fn test_empty_mailbox() {
        let mailbox = LabelMailbox::new();
        assert!(!mailbox.is_pending());
        assert!(mailbox.try_take().is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let mailbox = LabelMailbox::new();

        assert!(mailbox.post(update("bento", 10)).is_none());
        let replaced = mailbox.post(update("rice-bowl", 20)).unwrap();
        assert_eq!(replaced.label.as_str(), "bento");

        let taken = mailbox.try_take().unwrap();
        assert_eq!(taken.label.as_str(), "rice-bowl");
        assert_eq!(taken.received_at, Timestamp::from_millis(20));
    }

    #[test]
    fn test_take_is_destructive() {
        let mailbox = LabelMailbox::new();
        mailbox.post(update("bento", 1));

        assert!(mailbox.is_pending());
        assert!(mailbox.try_take().is_some());
        assert!(mailbox.try_take().is_none());
    }

    #[test]
    fn test_survives_poisoned_lock() {
        let mailbox = Arc::new(LabelMailbox::new());
        let poisoner = mailbox.clone();

        let _ = std::thread::spawn(move || {
            let _guard = poisoner.slot.lock().unwrap();
            panic!("poison the mailbox");
        })
        .join();

        mailbox.post(update("bento", 5));
        assert_eq!(mailbox.try_take().unwrap().label.as_str(), "bento");
    }

    #[test]
    fn test_concurrent_writers_leave_one_update() {
        let mailbox = Arc::new(LabelMailbox::new());

        let writers: Vec<_> = (0..4)
            .map(|i| {
                let mailbox = mailbox.clone();
                std::thread::spawn(move || {
                    for t in 0..100 {
                        mailbox.post(update("bento", i * 1000 + t));
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }

        assert!(mailbox.try_take().is_some());
        assert!(mailbox.try_take().is_none());
    }
}
