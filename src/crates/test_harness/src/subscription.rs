use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Notification delivered from a producer to its subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<V, E> {
    Value(V),
    Finished,
    Failed(E),
}

impl<V, E> Event<V, E> {
    /// True for `Finished` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Event::Value(_))
    }
}

type Teardown = Box<dyn FnOnce() + Send>;

struct SubscriptionInner {
    cancelled: AtomicBool,
    teardown: Mutex<Vec<Teardown>>,
}

/// Cancel handle shared by every stage of a subscribed pipeline.
///
/// Cancelling is idempotent: only the first call runs the registered teardown
/// work, later calls (including calls after the producer terminated) are no-ops.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    /// Fresh, uncancelled subscription with no teardown work.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                cancelled: AtomicBool::new(false),
                teardown: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Stop further notifications and run teardown work.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        let pending = match self.inner.teardown.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => Vec::new(),
        };
        for work in pending {
            work();
        }
    }

    /// True once [`Subscription::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register work to run on cancellation. Runs immediately if already cancelled.
    pub fn on_cancel(&self, work: impl FnOnce() + Send + 'static) {
        if let Ok(mut guard) = self.inner.teardown.lock() {
            // Checked under the lock so a concurrent cancel cannot miss this entry.
            if !self.is_cancelled() {
                guard.push(Box::new(work));
                return;
            }
        }
        work();
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

type Observer<V, E> = Box<dyn FnMut(Event<V, E>) + Send>;

struct Delivery<V, E> {
    observer: Option<Observer<V, E>>,
    pending: VecDeque<Event<V, E>>,
    delivering: bool,
    terminated: bool,
}

/// Delivery handle a producer uses to notify its downstream.
///
/// Only one notification is in flight at a time. An emit that arrives while
/// another is being delivered, from another thread or from inside the observer
/// itself, is queued and handed over in order by the emitter already running.
/// After the first terminal event, or once the subscription is cancelled,
/// every further notification is dropped.
pub struct Subscriber<V, E> {
    delivery: Arc<Mutex<Delivery<V, E>>>,
    subscription: Subscription,
}

impl<V, E> Subscriber<V, E> {
    /// Create a subscriber with a fresh subscription.
    pub fn new<F>(observer: F) -> Self
    where
        F: FnMut(Event<V, E>) + Send + 'static,
    {
        Self::with_subscription(observer, Subscription::new())
    }

    /// Create a subscriber sharing an existing subscription, used by operators
    /// so that cancelling downstream also silences every upstream stage.
    pub fn with_subscription<F>(observer: F, subscription: Subscription) -> Self
    where
        F: FnMut(Event<V, E>) + Send + 'static,
    {
        Self {
            delivery: Arc::new(Mutex::new(Delivery {
                observer: Some(Box::new(observer)),
                pending: VecDeque::new(),
                delivering: false,
                terminated: false,
            })),
            subscription,
        }
    }

    /// Cancel handle shared with every stage of the pipeline.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// True once cancelled or after a terminal event was accepted.
    pub fn is_closed(&self) -> bool {
        if self.subscription.is_cancelled() {
            return true;
        }
        match self.delivery.lock() {
            Ok(delivery) => delivery.terminated,
            Err(_) => true,
        }
    }

    /// Deliver a value. Returns false when the subscriber no longer accepts events.
    pub fn send(&self, value: V) -> bool {
        self.emit(Event::Value(value))
    }

    /// Deliver successful completion.
    pub fn finish(&self) -> bool {
        self.emit(Event::Finished)
    }

    /// Deliver a failure.
    pub fn fail(&self, error: E) -> bool {
        self.emit(Event::Failed(error))
    }

    /// Deliver `event`, or queue it behind the delivery already in progress.
    ///
    /// Returns false when the event was refused: the subscription is cancelled
    /// or a terminal event was accepted before.
    pub fn emit(&self, event: Event<V, E>) -> bool {
        let mut observer = {
            let Ok(mut delivery) = self.delivery.lock() else {
                return false;
            };
            if delivery.terminated || self.subscription.is_cancelled() {
                return false;
            }
            delivery.terminated = event.is_terminal();
            if delivery.delivering {
                delivery.pending.push_back(event);
                return true;
            }
            let Some(observer) = delivery.observer.take() else {
                return false;
            };
            delivery.delivering = true;
            observer
        };

        let mut event = event;
        loop {
            observer(event);

            let Ok(mut delivery) = self.delivery.lock() else {
                return true;
            };
            let cancelled = self.subscription.is_cancelled();
            if cancelled {
                delivery.pending.clear();
            }
            match delivery.pending.pop_front() {
                Some(queued) => event = queued,
                None => {
                    delivery.delivering = false;
                    if delivery.terminated || cancelled {
                        // The observer is released outside the lock.
                        drop(delivery);
                        drop(observer);
                    } else {
                        delivery.observer = Some(observer);
                    }
                    return true;
                }
            }
        }
    }
}

impl<V, E> Clone for Subscriber<V, E> {
    fn clone(&self) -> Self {
        Self {
            delivery: Arc::clone(&self.delivery),
            subscription: self.subscription.clone(),
        }
    }
}

impl<V, E> fmt::Debug for Subscriber<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("closed", &self.is_closed())
            .field("subscription", &self.subscription)
            .finish()
    }
}
