//! Publish/subscribe bus keyed by lead id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use futures::Stream;
use log::{debug, warn};
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};

use super::RelayEvent;

/// Events buffered per lead for a listener that is momentarily busy.
const LEAD_CHANNEL_CAPACITY: usize = 64;

/// Soft ceiling on concurrently registered listeners across all leads.
pub const DEFAULT_MAX_LISTENERS: usize = 100;

/// Fans out [`RelayEvent`]s to the listeners registered for a lead.
///
/// Delivery is at-most-once to whoever is subscribed at publish time; nothing
/// is queued for listeners that have not connected yet. Cloning is cheap and
/// every clone shares the same registry.
#[derive(Clone)]
pub struct EventRelay {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    channels: Mutex<HashMap<String, broadcast::Sender<RelayEvent>>>,
    max_listeners: usize,
}

impl RelayInner {
    fn channels(&self) -> std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<RelayEvent>>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EventRelay {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LISTENERS)
    }
}

impl EventRelay {
    pub fn new(max_listeners: usize) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                channels: Mutex::new(HashMap::new()),
                max_listeners,
            }),
        }
    }

    /// Delivers `event` to every current listener of `lead_id` and returns how
    /// many were reached. Zero means nobody was listening.
    pub fn publish(&self, lead_id: &str, event: RelayEvent) -> usize {
        let channels = self.inner.channels();
        match channels.get(lead_id) {
            // Send only fails when every receiver is gone.
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Registers a listener for `lead_id`.
    ///
    /// Going over the listener ceiling is logged but never refused.
    pub fn subscribe(&self, lead_id: &str) -> Subscription {
        let mut channels = self.inner.channels();
        let total: usize = channels.values().map(|s| s.receiver_count()).sum();
        if total >= self.inner.max_listeners {
            warn!(
                "Relay listener count {} reached the limit of {} (subscribing lead {})",
                total + 1,
                self.inner.max_listeners,
                lead_id
            );
        }
        let receiver = channels
            .entry(lead_id.to_string())
            .or_insert_with(|| broadcast::channel(LEAD_CHANNEL_CAPACITY).0)
            .subscribe();
        debug!("Relay listener registered for lead {}", lead_id);

        Subscription {
            lead_id: lead_id.to_string(),
            receiver: Some(receiver),
            relay: Arc::downgrade(&self.inner),
        }
    }

    /// Removes a listener. Dropping the subscription has the same effect.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Total listeners across every lead.
    pub fn listener_count(&self) -> usize {
        self.inner
            .channels()
            .values()
            .map(|s| s.receiver_count())
            .sum()
    }

    pub fn listener_count_for(&self, lead_id: &str) -> usize {
        self.inner
            .channels()
            .get(lead_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

/// A registered listener. Unregisters itself when dropped.
pub struct Subscription {
    lead_id: String,
    receiver: Option<broadcast::Receiver<RelayEvent>>,
    relay: Weak<RelayInner>,
}

impl Subscription {
    pub fn lead_id(&self) -> &str {
        &self.lead_id
    }

    /// Waits for the next event. Returns `None` once the relay is gone.
    pub async fn recv(&mut self) -> Option<RelayEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Relay listener for lead {} lagged, {} events skipped",
                        self.lead_id, skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-delivered event, if any.
    pub fn try_recv(&mut self) -> Option<RelayEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(
                        "Relay listener for lead {} lagged, {} events skipped",
                        self.lead_id, skipped
                    );
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Turns the subscription into a stream of live events. The listener stays
    /// registered for as long as the stream is alive.
    pub fn into_stream(self) -> impl Stream<Item = RelayEvent> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            let event = subscription.recv().await?;
            Some((event, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        drop(self.receiver.take());
        let Some(relay) = self.relay.upgrade() else {
            return;
        };
        let mut channels = relay.channels();
        if channels
            .get(&self.lead_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&self.lead_id);
        }
        debug!("Relay listener removed for lead {}", self.lead_id);
    }
}
