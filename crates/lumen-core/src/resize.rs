//! Resize notification channel.
//!
//! The windowing layer owns a [`ResizeNotifier`] and posts the new framebuffer
//! size whenever it changes. The renderer owns the matching [`ResizeEvents`]
//! and drains it once per frame, so platform callback mechanics never reach
//! into the frame loop.

use crossbeam::channel::{self, Receiver, Sender};

use crate::extent::Extent;

/// Create a connected notifier/receiver pair.
pub fn resize_channel() -> (ResizeNotifier, ResizeEvents) {
    let (tx, rx) = channel::unbounded();
    (ResizeNotifier { tx }, ResizeEvents { rx })
}

/// Sending half, held by the windowing layer.
#[derive(Clone, Debug)]
pub struct ResizeNotifier {
    tx: Sender<Extent>,
}

impl ResizeNotifier {
    /// Post a framebuffer size change.
    ///
    /// Returns `false` if the renderer side has been dropped.
    pub fn notify(&self, extent: Extent) -> bool {
        self.tx.send(extent).is_ok()
    }
}

/// Receiving half, held by the renderer.
#[derive(Debug)]
pub struct ResizeEvents {
    rx: Receiver<Extent>,
}

impl ResizeEvents {
    /// Drain every pending notification, returning the most recent extent.
    pub fn drain_latest(&self) -> Option<Extent> {
        self.rx.try_iter().last()
    }

    /// Number of notifications not yet drained.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no notifications are waiting.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_latest_extent() {
        let (notifier, events) = resize_channel();
        assert_eq!(events.drain_latest(), None);

        notifier.notify(Extent::new(640, 480));
        notifier.notify(Extent::new(1024, 768));
        assert_eq!(events.len(), 2);

        assert_eq!(events.drain_latest(), Some(Extent::new(1024, 768)));
        assert!(events.is_empty());
        assert_eq!(events.drain_latest(), None);
    }

    #[test]
    fn notifier_reports_disconnect() {
        let (notifier, events) = resize_channel();
        assert!(notifier.notify(Extent::new(1, 1)));
        drop(events);
        assert!(!notifier.notify(Extent::new(2, 2)));
    }

    #[test]
    fn notifications_cross_threads() {
        let (notifier, events) = resize_channel();
        let handle = std::thread::spawn(move || {
            notifier.notify(Extent::new(300, 200));
        });
        handle.join().unwrap();
        assert_eq!(events.drain_latest(), Some(Extent::new(300, 200)));
    }
}
