use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::lock;

/// Handle returned by [`Mediator::subscribe`], used to cancel a single
/// subscription.
///
/// Tokens are unique per mediator instance. Unsubscribing a token that was
/// never issued (or was already consumed) is a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type Handler<P> = Box<dyn FnMut(&P) + Send>;

struct Subscription<P> {
    token: SubscriptionToken,
    handler: Handler<P>,
    once: bool,
}

/// A channel-based publish/subscribe registry.
///
/// The mediator decouples publishers from subscribers through named string
/// channels. It has no dependencies on the rest of the crate and can carry
/// any payload type `P`.
///
/// # Semantics
///
/// * Subscriptions on a channel are invoked in insertion order.
/// * Duplicate handlers are allowed; each registration fires independently.
/// * Publishing to a channel with no subscribers is a silent no-op, as is
///   unsubscribing an unknown token. Loosely-coupled callers unsubscribe
///   unconditionally on teardown and rely on this.
/// * A `once` subscription is invoked at most one time and removed during
///   the publish pass that fired it.
/// * A channel key, once created, persists even when its subscription list
///   empties ([`clear_channel`](Mediator::clear_channel) keeps the key;
///   only [`clear`](Mediator::clear) replaces the whole map).
///
/// Publish snapshots the channel's subscription list before invoking it, so
/// removing a subscription mid-pass never skips or double-invokes another:
/// every non-once subscription present at publish start runs exactly once.
///
/// # Example
///
/// ```rust,ignore
/// use trellis_core::Mediator;
///
/// let mediator: Mediator<String> = Mediator::new();
/// let token = mediator.subscribe("greeting", |name: &String| {
///     println!("hello, {name}");
/// });
/// mediator.publish("greeting", &"world".to_string());
/// mediator.unsubscribe(token);
/// ```
pub struct Mediator<P> {
    channels: Mutex<HashMap<String, Vec<Subscription<P>>>>,
    /// Tokens currently checked out of the map by an in-progress publish.
    in_flight: Mutex<HashSet<u64>>,
    /// Tokens unsubscribed while their subscription was checked out.
    tombstones: Mutex<HashSet<u64>>,
    /// Channels with a publish pass currently in flight.
    publishing: Mutex<HashSet<String>>,
    /// Channels emptied by [`clear_channel`](Mediator::clear_channel) while
    /// their pass was in flight; the pass discards its survivors.
    cleared: Mutex<HashSet<String>>,
    /// Bumped by [`clear`](Mediator::clear); a pass that spans a bump
    /// discards its survivors instead of merging them back.
    generation: AtomicU64,
    next_token: AtomicU64,
}

impl<P> Default for Mediator<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Mediator<P> {
    /// Create an empty mediator.
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            tombstones: Mutex::new(HashSet::new()),
            publishing: Mutex::new(HashSet::new()),
            cleared: Mutex::new(HashSet::new()),
            generation: AtomicU64::new(0),
            next_token: AtomicU64::new(1),
        }
    }

    /// Subscribe to a channel. The handler fires on every publish until it
    /// is unsubscribed.
    pub fn subscribe(
        &self,
        channel: impl Into<String>,
        handler: impl FnMut(&P) + Send + 'static,
    ) -> SubscriptionToken {
        self.register(channel.into(), Box::new(handler), false)
    }

    /// Subscribe to a channel for a single publish. The subscription is
    /// removed right after its first invocation.
    pub fn subscribe_once(
        &self,
        channel: impl Into<String>,
        handler: impl FnMut(&P) + Send + 'static,
    ) -> SubscriptionToken {
        self.register(channel.into(), Box::new(handler), true)
    }

    fn register(&self, channel: String, handler: Handler<P>, once: bool) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        lock(&self.channels)
            .entry(channel)
            .or_default()
            .push(Subscription {
                token,
                handler,
                once,
            });
        token
    }

    /// Invoke every subscription on `channel`, in insertion order, with a
    /// reference to `payload`. Unknown channels are a silent no-op.
    pub fn publish(&self, channel: &str, payload: &P) {
        // The generation read shares the snapshot's critical section: clear
        // bumps it under the same lock, so a bump observed at merge time
        // means the clear happened after this snapshot was taken.
        let (mut snapshot, pass_generation) = {
            let mut channels = lock(&self.channels);
            let subs = match channels.get_mut(channel) {
                Some(subs) if !subs.is_empty() => mem::take(subs),
                _ => return,
            };
            lock(&self.publishing).insert(channel.to_string());
            (subs, self.generation.load(Ordering::Relaxed))
        };
        let checked_out: Vec<u64> = snapshot.iter().map(|s| s.token.0).collect();
        lock(&self.in_flight).extend(checked_out.iter().copied());

        let mut survivors = Vec::with_capacity(snapshot.len());
        for mut sub in snapshot.drain(..) {
            (sub.handler)(payload);
            if !sub.once {
                survivors.push(sub);
            }
        }

        let mut channels = lock(&self.channels);
        let mut in_flight = lock(&self.in_flight);
        let mut tombstones = lock(&self.tombstones);
        survivors.retain(|s| !tombstones.remove(&s.token.0));
        for id in checked_out {
            in_flight.remove(&id);
            tombstones.remove(&id);
        }
        lock(&self.publishing).remove(channel);

        // A clear (wholesale or of this channel) during the pass takes the
        // checked-out subscriptions with it; registrations made after the
        // clear are already in the map and stay.
        let channel_cleared = lock(&self.cleared).remove(channel);
        if channel_cleared || self.generation.load(Ordering::Relaxed) != pass_generation {
            return;
        }

        // Handlers may have subscribed to this channel mid-pass; those
        // registrations land after the survivors.
        let entry = channels.entry(channel.to_string()).or_default();
        let appended = mem::replace(entry, survivors);
        entry.extend(appended);
    }

    /// Remove the subscription identified by `token`, wherever it lives.
    /// Unknown tokens are a silent no-op.
    pub fn unsubscribe(&self, token: SubscriptionToken) {
        {
            let mut channels = lock(&self.channels);
            for subs in channels.values_mut() {
                if let Some(pos) = subs.iter().position(|s| s.token == token) {
                    subs.remove(pos);
                    return;
                }
            }
        }
        // The subscription may be checked out by a publish in progress;
        // tombstone it so it does not get merged back.
        if lock(&self.in_flight).contains(&token.0) {
            lock(&self.tombstones).insert(token.0);
        }
    }

    /// Empty a channel's subscription list. The channel key is retained.
    /// Subscriptions checked out by a publish in progress on the channel
    /// are cleared with it and do not come back.
    pub fn clear_channel(&self, channel: &str) {
        let mut channels = lock(&self.channels);
        if let Some(subs) = channels.get_mut(channel) {
            subs.clear();
        }
        if lock(&self.publishing).contains(channel) {
            lock(&self.cleared).insert(channel.to_string());
        }
    }

    /// Drop every channel and subscription, replacing the whole map. Covers
    /// subscriptions checked out by publishes in progress too.
    pub fn clear(&self) {
        let mut channels = lock(&self.channels);
        self.generation.fetch_add(1, Ordering::Relaxed);
        *channels = HashMap::new();
        lock(&self.cleared).clear();
    }

    /// Number of subscriptions currently registered on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        lock(&self.channels)
            .get(channel)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Whether the channel key exists (possibly with an empty list).
    pub fn has_channel(&self, channel: &str) -> bool {
        lock(&self.channels).contains_key(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn FnMut(&i32) + Send>) {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = log.clone();
            move |name: &str| -> Box<dyn FnMut(&i32) + Send> {
                let log = log.clone();
                let name = name.to_string();
                Box::new(move |payload: &i32| {
                    log.lock().unwrap().push(format!("{name}:{payload}"));
                })
            }
        };
        (log, make)
    }

    #[test]
    fn publish_invokes_in_subscription_order() {
        let mediator: Mediator<i32> = Mediator::new();
        let (log, make) = recorder();
        mediator.subscribe("ch", make("f1"));
        mediator.subscribe("ch", make("f2"));

        mediator.publish("ch", &7);

        assert_eq!(*log.lock().unwrap(), vec!["f1:7", "f2:7"]);
    }

    #[test]
    fn duplicate_handlers_both_fire() {
        let mediator: Mediator<i32> = Mediator::new();
        let (log, make) = recorder();
        mediator.subscribe("ch", make("f"));
        mediator.subscribe("ch", make("f"));

        mediator.publish("ch", &1);

        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn once_subscription_fires_exactly_once() {
        let mediator: Mediator<i32> = Mediator::new();
        let (log, make) = recorder();
        mediator.subscribe_once("ch", make("once"));
        mediator.subscribe("ch", make("always"));

        mediator.publish("ch", &1);
        mediator.publish("ch", &2);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["once:1", "always:1", "always:2"]
        );
        assert_eq!(mediator.subscriber_count("ch"), 1);
    }

    #[test]
    fn once_removal_mid_pass_does_not_skip_others() {
        let mediator: Mediator<i32> = Mediator::new();
        let (log, make) = recorder();
        mediator.subscribe_once("ch", make("a"));
        mediator.subscribe("ch", make("b"));
        mediator.subscribe("ch", make("c"));

        mediator.publish("ch", &1);
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1", "c:1"]);

        mediator.publish("ch", &2);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:1", "b:1", "c:1", "b:2", "c:2"]
        );
    }

    #[test]
    fn publish_unknown_channel_is_noop() {
        let mediator: Mediator<i32> = Mediator::new();
        mediator.publish("nobody-home", &1);
    }

    #[test]
    fn unsubscribe_unknown_token_is_noop() {
        let mediator: Mediator<i32> = Mediator::new();
        let (log, make) = recorder();
        let token = mediator.subscribe("ch", make("f"));
        mediator.unsubscribe(token);
        mediator.unsubscribe(token);

        mediator.publish("ch", &1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn unsubscribe_leaves_other_subscriptions_alone() {
        let mediator: Mediator<i32> = Mediator::new();
        let (log, make) = recorder();
        let token = mediator.subscribe("ch", make("gone"));
        mediator.subscribe("ch", make("kept"));
        mediator.unsubscribe(token);

        mediator.publish("ch", &1);
        assert_eq!(*log.lock().unwrap(), vec!["kept:1"]);
    }

    #[test]
    fn unsubscribe_during_publish_still_runs_current_pass() {
        // A subscription present at publish start is invoked exactly once in
        // that pass, even if another handler unsubscribes it mid-pass; the
        // removal takes effect on the next publish.
        let mediator: Arc<Mediator<i32>> = Arc::new(Mediator::new());
        let (log, make) = recorder();
        let victim = mediator.subscribe("ch", make("victim"));
        {
            let mediator = mediator.clone();
            let log = log.clone();
            mediator.clone().subscribe("ch", move |payload: &i32| {
                log.lock().unwrap().push(format!("killer:{payload}"));
                mediator.unsubscribe(victim);
            });
        }

        mediator.publish("ch", &1);
        assert_eq!(*log.lock().unwrap(), vec!["victim:1", "killer:1"]);

        mediator.publish("ch", &2);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["victim:1", "killer:1", "killer:2"]
        );
    }

    #[test]
    fn subscribe_during_publish_fires_on_next_pass() {
        let mediator: Arc<Mediator<i32>> = Arc::new(Mediator::new());
        let (log, make) = recorder();
        {
            let mediator = mediator.clone();
            let make = {
                let log = log.clone();
                move || {
                    let log = log.clone();
                    move |payload: &i32| {
                        log.lock().unwrap().push(format!("late:{payload}"));
                    }
                }
            };
            mediator.clone().subscribe_once("ch", move |_: &i32| {
                mediator.subscribe("ch", make());
            });
        }
        mediator.subscribe("ch", make("base"));

        mediator.publish("ch", &1);
        assert_eq!(*log.lock().unwrap(), vec!["base:1"]);

        mediator.publish("ch", &2);
        assert_eq!(*log.lock().unwrap(), vec!["base:1", "base:2", "late:2"]);
    }

    #[test]
    fn clear_channel_retains_key() {
        let mediator: Mediator<i32> = Mediator::new();
        let (log, make) = recorder();
        mediator.subscribe("ch", make("f"));

        mediator.clear_channel("ch");
        assert!(mediator.has_channel("ch"));
        assert_eq!(mediator.subscriber_count("ch"), 0);

        mediator.publish("ch", &1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn clear_replaces_everything() {
        let mediator: Mediator<i32> = Mediator::new();
        let (_log, make) = recorder();
        mediator.subscribe("a", make("f"));
        mediator.subscribe("b", make("g"));

        mediator.clear();
        assert!(!mediator.has_channel("a"));
        assert!(!mediator.has_channel("b"));
    }

    #[test]
    fn clear_during_publish_does_not_resurrect_subscriptions() {
        let mediator: Arc<Mediator<i32>> = Arc::new(Mediator::new());
        let (log, make) = recorder();
        mediator.subscribe("ch", make("a"));
        {
            let mediator = mediator.clone();
            mediator.clone().subscribe("ch", move |_: &i32| {
                mediator.clear();
            });
        }
        mediator.subscribe("ch", make("b"));

        // Everyone present at publish start still runs this pass.
        mediator.publish("ch", &1);
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1"]);

        // The wholesale clear won; nothing merged back.
        assert!(!mediator.has_channel("ch"));
        mediator.publish("ch", &2);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn clear_channel_during_publish_does_not_resurrect_subscriptions() {
        let mediator: Arc<Mediator<i32>> = Arc::new(Mediator::new());
        let (log, make) = recorder();
        mediator.subscribe("ch", make("a"));
        {
            let mediator = mediator.clone();
            mediator.clone().subscribe("ch", move |_: &i32| {
                mediator.clear_channel("ch");
            });
        }

        mediator.publish("ch", &1);
        assert_eq!(*log.lock().unwrap(), vec!["a:1"]);

        assert!(mediator.has_channel("ch"));
        assert_eq!(mediator.subscriber_count("ch"), 0);
        mediator.publish("ch", &2);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn clearing_another_channel_mid_pass_keeps_current_survivors() {
        let mediator: Arc<Mediator<i32>> = Arc::new(Mediator::new());
        let (log, make) = recorder();
        mediator.subscribe("other", make("elsewhere"));
        mediator.subscribe("ch", make("kept"));
        {
            let mediator = mediator.clone();
            mediator.clone().subscribe("ch", move |_: &i32| {
                mediator.clear_channel("other");
            });
        }

        mediator.publish("ch", &1);
        mediator.publish("ch", &2);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["kept:1", "kept:2"]
        );
        assert_eq!(mediator.subscriber_count("other"), 0);
    }
}
