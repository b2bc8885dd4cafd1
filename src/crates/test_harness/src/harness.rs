use std::convert::Infallible;
use std::sync::{mpsc, Mutex};
use std::time::{Duration, Instant};

use crate::config::HarnessConfig;
use crate::producer::Producer;
use crate::subscription::{Event, Subscriber, Subscription};

/// How a captured producer ended, as far as the harness could tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<E> {
    /// The producer finished successfully.
    Finished,
    /// The producer failed with this error.
    Failed(E),
    /// The deadline passed without a terminal notification.
    TimedOut,
    /// Every handle to the subscriber was dropped without a terminal
    /// notification, so none could arrive any more.
    Abandoned,
}

/// Snapshot of everything a producer emitted during one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedResult<V, E> {
    /// Values in emission order.
    pub values: Vec<V>,
    outcome: Outcome<E>,
}

impl<V, E> CapturedResult<V, E> {
    /// Result from already collected values and an outcome.
    pub fn new(values: Vec<V>, outcome: Outcome<E>) -> Self {
        Self { values, outcome }
    }

    /// True iff the producer finished successfully before the deadline.
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, Outcome::Finished)
    }

    /// The terminal error, if the producer failed.
    pub fn failure(&self) -> Option<&E> {
        match &self.outcome {
            Outcome::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self.outcome, Outcome::TimedOut)
    }

    pub fn outcome(&self) -> &Outcome<E> {
        &self.outcome
    }

    /// First captured value, if any.
    pub fn first(&self) -> Option<&V> {
        self.values.first()
    }

    /// Drop the outcome and keep the values.
    pub fn into_values(self) -> Vec<V> {
        self.values
    }

    /// Split into values and outcome.
    pub fn into_parts(self) -> (Vec<V>, Outcome<E>) {
        (self.values, self.outcome)
    }
}

/// Owner of every subscription made during one test.
///
/// Captures block until their producer terminates or times out. Whatever was
/// subscribed through the scope is cancelled by [`TestScope::cancel_all`] and
/// again when the scope is dropped, so no timer or request outlives the test.
pub struct TestScope {
    config: HarnessConfig,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl TestScope {
    /// Scope using [`HarnessConfig::default`].
    pub fn new() -> Self {
        Self::with_config(HarnessConfig::default())
    }

    /// Scope using `config` for default timeouts.
    pub fn with_config(config: HarnessConfig) -> Self {
        Self {
            config,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Configuration this scope was built with.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Capture using the configured default timeout.
    pub fn capture<P: Producer>(&self, producer: P) -> CapturedResult<P::Output, P::Failure> {
        self.capture_within(producer, self.config.default_timeout)
    }

    /// Subscribe once and block until the producer terminates or `timeout` elapses.
    ///
    /// Returns as soon as a terminal notification arrives; the subscription is
    /// cancelled before returning in every case.
    pub fn capture_within<P: Producer>(
        &self,
        producer: P,
        timeout: Duration,
    ) -> CapturedResult<P::Output, P::Failure> {
        let (tx, rx) = mpsc::channel();
        let subscriber = Subscriber::new(move |event| {
            let _ = tx.send(event);
        });
        let subscription = subscriber.subscription().clone();
        self.track(subscription.clone());

        tracing::debug!(?timeout, "capturing producer");
        let start = Instant::now();
        producer.subscribe(subscriber);

        let mut values = Vec::new();
        let outcome = loop {
            let remaining = timeout.saturating_sub(start.elapsed());
            match rx.recv_timeout(remaining) {
                Ok(Event::Value(value)) => values.push(value),
                Ok(Event::Finished) => break Outcome::Finished,
                Ok(Event::Failed(error)) => break Outcome::Failed(error),
                Err(mpsc::RecvTimeoutError::Timeout) => break Outcome::TimedOut,
                Err(mpsc::RecvTimeoutError::Disconnected) => break Outcome::Abandoned,
            }
        };
        subscription.cancel();

        let elapsed = start.elapsed();
        match &outcome {
            Outcome::Finished => {
                tracing::debug!(values = values.len(), ?elapsed, "producer finished")
            }
            Outcome::Failed(_) => {
                tracing::debug!(values = values.len(), ?elapsed, "producer failed")
            }
            Outcome::TimedOut => {
                tracing::warn!(values = values.len(), ?timeout, "producer timed out")
            }
            Outcome::Abandoned => {
                tracing::warn!(values = values.len(), "producer dropped its subscriber")
            }
        }

        CapturedResult::new(values, outcome)
    }

    /// Capture a producer that cannot fail.
    ///
    /// Only notifications delivered while subscribing are observed; the result
    /// is always reported as completed.
    pub fn capture_infallible<P>(&self, producer: P) -> CapturedResult<P::Output, Infallible>
    where
        P: Producer<Failure = Infallible>,
    {
        let (tx, rx) = mpsc::channel();
        let subscriber = Subscriber::new(move |event| {
            let _ = tx.send(event);
        });
        let subscription = subscriber.subscription().clone();
        self.track(subscription.clone());
        producer.subscribe(subscriber);

        let mut values = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                Event::Value(value) => values.push(value),
                Event::Finished => break,
                Event::Failed(never) => match never {},
            }
        }
        subscription.cancel();

        CapturedResult::new(values, Outcome::Finished)
    }

    /// Subscribe with a value callback; the subscription lives until cancelled
    /// or until the scope ends.
    pub fn sink<P, F>(&self, producer: P, mut on_value: F) -> Subscription
    where
        P: Producer,
        F: FnMut(P::Output) + Send + 'static,
    {
        let subscriber = Subscriber::new(move |event| {
            if let Event::Value(value) = event {
                on_value(value);
            }
        });
        let subscription = subscriber.subscription().clone();
        self.track(subscription.clone());
        producer.subscribe(subscriber);
        subscription
    }

    /// Hand a subscription made elsewhere to the scope for teardown.
    pub fn track(&self, subscription: Subscription) {
        if let Ok(mut guard) = self.subscriptions.lock() {
            guard.push(subscription);
        }
    }

    /// Number of tracked subscriptions not yet cancelled.
    pub fn active_subscriptions(&self) -> usize {
        match self.subscriptions.lock() {
            Ok(guard) => guard.iter().filter(|entry| !entry.is_cancelled()).count(),
            Err(_) => 0,
        }
    }

    /// Cancel every tracked subscription, including already terminated ones.
    pub fn cancel_all(&self) {
        let drained = match self.subscriptions.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        if !drained.is_empty() {
            tracing::trace!(count = drained.len(), "cancelling scope subscriptions");
        }
        for subscription in drained {
            subscription.cancel();
        }
    }
}

impl Default for TestScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestScope {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
