use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use shared::protocol::{Channel, ChannelValue};
use tracing::debug;

use crate::lock;

pub type Handler = Arc<dyn Fn(&ChannelValue) + Send + Sync>;

/// In-process publish/subscribe hub.
///
/// Delivery is run-to-completion: a value published from inside a handler is
/// queued and delivered once the current dispatch has reached every
/// subscriber, so all subscribers observe values on a channel in the same
/// order.
#[derive(Default)]
pub struct EventBus {
    subscribers: std::sync::Mutex<HashMap<Channel, Vec<Handler>>>,
    pending: std::sync::Mutex<VecDeque<(Channel, ChannelValue)>>,
    dispatching: AtomicBool,
}

struct DispatchGuard<'a>(&'a AtomicBool);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `handler` on `channel`. Subscriptions live as long as the bus.
    pub fn subscribe<F>(&self, channel: Channel, handler: F)
    where
        F: Fn(&ChannelValue) + Send + Sync + 'static,
    {
        lock(&self.subscribers)
            .entry(channel)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Like [`subscribe`](Self::subscribe), but holds `target` weakly so the
    /// bus does not keep the component alive.
    pub fn subscribe_weak<T, F>(&self, channel: Channel, target: &Arc<T>, handler: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &ChannelValue) + Send + Sync + 'static,
    {
        let target = Arc::downgrade(target);
        self.subscribe(channel, move |value| {
            if let Some(target) = target.upgrade() {
                handler(&target, value);
            }
        });
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        lock(&self.subscribers).get(&channel).map_or(0, Vec::len)
    }

    /// Delivers `value` to every subscriber of `channel`.
    ///
    /// Values that fail the channel guard are dropped, as are values published
    /// to a channel nobody listens on.
    pub fn publish(&self, channel: Channel, value: ChannelValue) {
        if !channel.accepts(&value) {
            debug!(%channel, ?value, "dropping value rejected by channel guard");
            return;
        }
        if self.subscriber_count(channel) == 0 {
            debug!(%channel, "no subscribers");
            return;
        }
        lock(&self.pending).push_back((channel, value));
        self.drain();
    }

    fn drain(&self) {
        loop {
            if self.dispatching.swap(true, Ordering::AcqRel) {
                return;
            }
            {
                let _guard = DispatchGuard(&self.dispatching);
                while let Some((channel, value)) = self.next_pending() {
                    self.deliver(channel, &value);
                }
            }
            // Another thread may have queued after our last pop but before the
            // flag was released.
            if lock(&self.pending).is_empty() {
                return;
            }
        }
    }

    fn next_pending(&self) -> Option<(Channel, ChannelValue)> {
        lock(&self.pending).pop_front()
    }

    fn deliver(&self, channel: Channel, value: &ChannelValue) {
        let handlers = lock(&self.subscribers)
            .get(&channel)
            .cloned()
            .unwrap_or_default();
        debug!(%channel, ?value, subscribers = handlers.len(), "publish");
        for handler in handlers {
            handler(value);
        }
    }
}

#[cfg(test)]
#[path = "tests/bus_tests.rs"]
mod tests;
