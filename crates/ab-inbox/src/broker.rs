use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use ab_core::types::Message;
use tracing::debug;

use crate::inbox::InboxStore;

/// Banner listeners receive the new message, or `None` when the banner is
/// dismissed.
pub type BannerListener = Arc<dyn Fn(Option<&Message>) + Send + Sync>;
/// Badge listeners receive the current unread count.
pub type BadgeListener = Arc<dyn Fn(usize) + Send + Sync>;

/// Channel-side mirror of the callback notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum InboxEvent {
    Banner(Option<Message>),
    Badge(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerKind {
    Banner,
    Badge,
}

#[derive(Default)]
struct Listeners {
    banner: Mutex<Vec<(u64, BannerListener)>>,
    badge: Mutex<Vec<(u64, BadgeListener)>>,
}

impl Listeners {
    fn remove(&self, kind: ListenerKind, id: u64) -> bool {
        fn take<T>(list: &Mutex<Vec<(u64, T)>>, id: u64) -> bool {
            let mut list = list.lock().unwrap_or_else(|e| e.into_inner());
            let before = list.len();
            list.retain(|(lid, _)| *lid != id);
            list.len() != before
        }
        match kind {
            ListenerKind::Banner => take(&self.banner, id),
            ListenerKind::Badge => take(&self.badge, id),
        }
    }
}

/// Handle returned by the `subscribe_*` methods.
///
/// Dropping it leaves the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove exactly this listener.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    listeners: Weak<Listeners>,
    kind: ListenerKind,
    id: u64,
}

impl Subscription {
    /// Remove the listener. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.listeners.upgrade() {
            Some(listeners) => listeners.remove(self.kind, self.id),
            None => false,
        }
    }
}

/// In-process publish/subscribe hub for inbox notifications.
///
/// Keeps banner and badge listeners in separate lists. Listeners are called
/// synchronously, outside the list lock, so a listener may unsubscribe
/// itself or others while being notified.
pub struct NotificationBroker {
    inbox: Arc<InboxStore>,
    listeners: Arc<Listeners>,
    next_id: AtomicU64,
    channels: Mutex<Vec<flume::Sender<InboxEvent>>>,
}

impl NotificationBroker {
    pub fn new(inbox: Arc<InboxStore>) -> Self {
        Self {
            inbox,
            listeners: Arc::new(Listeners::default()),
            next_id: AtomicU64::new(1),
            channels: Mutex::new(Vec::new()),
        }
    }

    pub fn inbox(&self) -> &Arc<InboxStore> {
        &self.inbox
    }

    pub fn subscribe_to_notifications<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Option<&Message>) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .banner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(listener)));
        self.subscription(ListenerKind::Banner, id)
    }

    pub fn subscribe_to_badge<F>(&self, listener: F) -> Subscription
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .badge
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(listener)));
        self.subscription(ListenerKind::Badge, id)
    }

    /// Register a channel receiver that gets every [`InboxEvent`] published
    /// from this point forward. Dropped receivers are pruned on publish.
    pub fn subscribe_events(&self) -> flume::Receiver<InboxEvent> {
        let (tx, rx) = flume::unbounded();
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Announce a new message: banner listeners get the message, badge
    /// listeners get the unread count read from the inbox right now.
    pub fn notify_new_message(&self, message: &Message) {
        self.emit_banner(Some(message));
        self.notify_badge();
    }

    /// Dismiss the banner: every banner listener receives `None`.
    pub fn clear_notification(&self) {
        self.emit_banner(None);
    }

    /// Push the current unread count to badge listeners and return it.
    pub fn notify_badge(&self) -> usize {
        let count = self.inbox.unread_count();
        let listeners: Vec<BadgeListener> = self
            .listeners
            .badge
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        debug!(count, listeners = listeners.len(), "badge update");
        for listener in listeners {
            listener(count);
        }
        self.publish(InboxEvent::Badge(count));
        count
    }

    pub fn banner_listener_count(&self) -> usize {
        self.listeners.banner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn badge_listener_count(&self) -> usize {
        self.listeners.badge.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn subscription(&self, kind: ListenerKind, id: u64) -> Subscription {
        Subscription {
            listeners: Arc::downgrade(&self.listeners),
            kind,
            id,
        }
    }

    fn emit_banner(&self, message: Option<&Message>) {
        let listeners: Vec<BannerListener> = self
            .listeners
            .banner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        debug!(
            message_id = ?message.map(|m| m.id),
            listeners = listeners.len(),
            "banner update"
        );
        for listener in listeners {
            listener(message);
        }
        self.publish(InboxEvent::Banner(message.cloned()));
    }

    fn publish(&self, event: InboxEvent) {
        let mut senders = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use ab_core::types::Insight;
    use std::sync::atomic::AtomicUsize;

    fn broker() -> NotificationBroker {
        let inbox = Arc::new(InboxStore::new(Arc::new(MemoryStore::new())));
        NotificationBroker::new(inbox)
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let b = broker();
        let hits = Arc::new(AtomicUsize::new(0));
        let h1 = hits.clone();
        let h2 = hits.clone();
        let s1 = b.subscribe_to_badge(move |_| {
            h1.fetch_add(1, Ordering::SeqCst);
        });
        let _s2 = b.subscribe_to_badge(move |_| {
            h2.fetch_add(10, Ordering::SeqCst);
        });
        assert!(s1.unsubscribe());
        b.notify_badge();
        assert_eq!(hits.load(Ordering::SeqCst), 10);
        assert_eq!(b.badge_listener_count(), 1);
    }

    #[test]
    fn banner_and_badge_lists_are_independent() {
        let b = broker();
        let _banner = b.subscribe_to_notifications(|_| {});
        assert_eq!(b.banner_listener_count(), 1);
        assert_eq!(b.badge_listener_count(), 0);
    }

    #[test]
    fn clear_notification_sends_none() {
        let b = broker();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _s = b.subscribe_to_notifications(move |m| {
            sink.lock().unwrap().push(m.map(|m| m.id));
        });
        let msg = b.inbox().add_message(Insight::new("i", "t", "s", 1.0), None);
        b.notify_new_message(&msg);
        b.clear_notification();
        assert_eq!(*seen.lock().unwrap(), vec![Some(msg.id), None]);
    }

    #[test]
    fn dropped_event_receiver_is_pruned() {
        let b = broker();
        let rx1 = b.subscribe_events();
        let rx2 = b.subscribe_events();
        drop(rx1);
        b.clear_notification();
        assert_eq!(b.channel_count(), 1);
        assert_eq!(rx2.try_recv().unwrap(), InboxEvent::Banner(None));
    }

    #[test]
    fn unsubscribe_after_broker_dropped_is_false() {
        let b = broker();
        let s = b.subscribe_to_badge(|_| {});
        drop(b);
        assert!(!s.unsubscribe());
    }
}
