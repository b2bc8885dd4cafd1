//! Composition operators. Each adapter subscribes to its upstream with a
//! subscriber that shares the downstream [`Subscription`], so a single cancel
//! silences the whole pipeline.

use std::convert::Infallible;
use std::marker::PhantomData;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::producer::{BoxProducer, Producer};
use crate::subject::Subject;
use crate::subscription::{Event, Subscriber, Subscription};

fn stage<V, E>(
    subscription: Subscription,
    observer: impl FnMut(Event<V, E>) + Send + 'static,
) -> Subscriber<V, E> {
    Subscriber::with_subscription(observer, subscription)
}

/// Fluent operator methods available on every [`Producer`].
pub trait ProducerExt: Producer + Sized {
    /// Transform each value.
    fn map<U, F>(self, transform: F) -> Map<Self, F>
    where
        F: FnMut(Self::Output) -> U + Send + 'static,
        U: Send + 'static,
    {
        Map {
            upstream: self,
            transform,
        }
    }

    /// Translate the failure.
    fn map_err<E, F>(self, transform: F) -> MapErr<Self, F>
    where
        F: FnMut(Self::Failure) -> E + Send + 'static,
        E: Send + 'static,
    {
        MapErr {
            upstream: self,
            transform,
        }
    }

    /// Forward only the values matching `predicate`.
    fn filter<F>(self, predicate: F) -> Filter<Self, F>
    where
        F: FnMut(&Self::Output) -> bool + Send + 'static,
    {
        Filter {
            upstream: self,
            predicate,
        }
    }

    /// Transform each value, dropping those mapped to `None`.
    fn filter_map<U, F>(self, transform: F) -> FilterMap<Self, F>
    where
        F: FnMut(Self::Output) -> Option<U> + Send + 'static,
        U: Send + 'static,
    {
        FilterMap {
            upstream: self,
            transform,
        }
    }

    /// Skip the first `count` values.
    fn drop_first(self, count: usize) -> DropFirst<Self> {
        DropFirst {
            upstream: self,
            count,
        }
    }

    /// Buffer every value and emit them as one batch when the upstream finishes.
    fn collect(self) -> Collect<Self> {
        Collect { upstream: self }
    }

    /// On failure, continue with the producer returned by `handler`.
    fn catch<Q, F>(self, handler: F) -> Catch<Self, F>
    where
        F: FnOnce(Self::Failure) -> Q + Send + 'static,
        Q: Producer<Output = Self::Output>,
    {
        Catch {
            upstream: self,
            handler,
        }
    }

    /// Subscribe to the producer returned by `transform` for every value and
    /// merge their output. Finishes once the upstream and every inner producer
    /// have finished.
    fn flat_map<Q, F>(self, transform: F) -> FlatMap<Self, F>
    where
        F: FnMut(Self::Output) -> Q + Send + 'static,
        Q: Producer<Failure = Self::Failure>,
    {
        FlatMap {
            upstream: self,
            transform,
        }
    }

    /// Forward every notification, terminal ones included, after `delay`.
    fn delay(self, delay: Duration) -> Delay<Self> {
        Delay {
            upstream: self,
            delay,
        }
    }

    /// Perform the upstream subscription on a worker thread.
    fn subscribe_on_thread(self) -> SubscribeOn<Self> {
        SubscribeOn { upstream: self }
    }

    /// Give a producer that cannot fail an arbitrary failure type.
    fn set_failure<E>(self) -> SetFailure<Self, E>
    where
        Self: Producer<Failure = Infallible>,
        E: Send + 'static,
    {
        SetFailure {
            upstream: self,
            _failure: PhantomData,
        }
    }

    /// Erase the concrete producer type.
    fn boxed(self) -> BoxProducer<Self::Output, Self::Failure> {
        BoxProducer::new(self)
    }

    /// Subscribe with a raw event callback.
    fn sink<F>(self, on_event: F) -> Subscription
    where
        F: FnMut(Event<Self::Output, Self::Failure>) + Send + 'static,
    {
        let subscriber = Subscriber::new(on_event);
        let subscription = subscriber.subscription().clone();
        self.subscribe(subscriber);
        subscription
    }

    /// Feed every notification into `subject`.
    fn forward_to(self, subject: &Subject<Self::Output, Self::Failure>) -> Subscription
    where
        Self::Output: Clone,
        Self::Failure: Clone,
    {
        let subject = subject.clone();
        self.sink(move |event| match event {
            Event::Value(value) => {
                subject.send(value);
            }
            Event::Finished => subject.finish(),
            Event::Failed(error) => subject.fail(error),
        })
    }
}

impl<P: Producer> ProducerExt for P {}

pub struct Map<P, F> {
    upstream: P,
    transform: F,
}

impl<P, F, U> Producer for Map<P, F>
where
    P: Producer,
    F: FnMut(P::Output) -> U + Send + 'static,
    U: Send + 'static,
{
    type Output = U;
    type Failure = P::Failure;

    fn subscribe(self, downstream: Subscriber<U, P::Failure>) {
        let mut transform = self.transform;
        let upstream = stage(downstream.subscription().clone(), move |event| match event {
            Event::Value(value) => {
                downstream.send(transform(value));
            }
            Event::Finished => {
                downstream.finish();
            }
            Event::Failed(error) => {
                downstream.fail(error);
            }
        });
        self.upstream.subscribe(upstream);
    }
}

pub struct MapErr<P, F> {
    upstream: P,
    transform: F,
}

impl<P, F, E> Producer for MapErr<P, F>
where
    P: Producer,
    F: FnMut(P::Failure) -> E + Send + 'static,
    E: Send + 'static,
{
    type Output = P::Output;
    type Failure = E;

    fn subscribe(self, downstream: Subscriber<P::Output, E>) {
        let mut transform = self.transform;
        let upstream = stage(downstream.subscription().clone(), move |event| match event {
            Event::Value(value) => {
                downstream.send(value);
            }
            Event::Finished => {
                downstream.finish();
            }
            Event::Failed(error) => {
                downstream.fail(transform(error));
            }
        });
        self.upstream.subscribe(upstream);
    }
}

pub struct Filter<P, F> {
    upstream: P,
    predicate: F,
}

impl<P, F> Producer for Filter<P, F>
where
    P: Producer,
    F: FnMut(&P::Output) -> bool + Send + 'static,
{
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe(self, downstream: Subscriber<P::Output, P::Failure>) {
        let mut predicate = self.predicate;
        let upstream = stage(downstream.subscription().clone(), move |event| match event {
            Event::Value(value) => {
                if predicate(&value) {
                    downstream.send(value);
                }
            }
            other => {
                downstream.emit(other);
            }
        });
        self.upstream.subscribe(upstream);
    }
}

pub struct FilterMap<P, F> {
    upstream: P,
    transform: F,
}

impl<P, F, U> Producer for FilterMap<P, F>
where
    P: Producer,
    F: FnMut(P::Output) -> Option<U> + Send + 'static,
    U: Send + 'static,
{
    type Output = U;
    type Failure = P::Failure;

    fn subscribe(self, downstream: Subscriber<U, P::Failure>) {
        let mut transform = self.transform;
        let upstream = stage(downstream.subscription().clone(), move |event| match event {
            Event::Value(value) => {
                if let Some(mapped) = transform(value) {
                    downstream.send(mapped);
                }
            }
            Event::Finished => {
                downstream.finish();
            }
            Event::Failed(error) => {
                downstream.fail(error);
            }
        });
        self.upstream.subscribe(upstream);
    }
}

pub struct DropFirst<P> {
    upstream: P,
    count: usize,
}

impl<P: Producer> Producer for DropFirst<P> {
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe(self, downstream: Subscriber<P::Output, P::Failure>) {
        let mut remaining = self.count;
        let upstream = stage(downstream.subscription().clone(), move |event| match event {
            Event::Value(_) if remaining > 0 => remaining -= 1,
            other => {
                downstream.emit(other);
            }
        });
        self.upstream.subscribe(upstream);
    }
}

pub struct Collect<P> {
    upstream: P,
}

impl<P: Producer> Producer for Collect<P> {
    type Output = Vec<P::Output>;
    type Failure = P::Failure;

    fn subscribe(self, downstream: Subscriber<Vec<P::Output>, P::Failure>) {
        let mut batch = Vec::new();
        let upstream = stage(downstream.subscription().clone(), move |event| match event {
            Event::Value(value) => batch.push(value),
            Event::Finished => {
                if downstream.send(std::mem::take(&mut batch)) {
                    downstream.finish();
                }
            }
            Event::Failed(error) => {
                downstream.fail(error);
            }
        });
        self.upstream.subscribe(upstream);
    }
}

pub struct Catch<P, F> {
    upstream: P,
    handler: F,
}

impl<P, F, Q> Producer for Catch<P, F>
where
    P: Producer,
    F: FnOnce(P::Failure) -> Q + Send + 'static,
    Q: Producer<Output = P::Output>,
{
    type Output = P::Output;
    type Failure = Q::Failure;

    fn subscribe(self, downstream: Subscriber<P::Output, Q::Failure>) {
        let mut handler = Some(self.handler);
        let upstream = stage(downstream.subscription().clone(), move |event| match event {
            Event::Value(value) => {
                downstream.send(value);
            }
            Event::Finished => {
                downstream.finish();
            }
            Event::Failed(error) => {
                if let Some(handler) = handler.take() {
                    tracing::debug!("upstream failed, switching to fallback producer");
                    handler(error).subscribe(downstream.clone());
                }
            }
        });
        self.upstream.subscribe(upstream);
    }
}

pub struct FlatMap<P, F> {
    upstream: P,
    transform: F,
}

#[derive(Default)]
struct Merge {
    upstream_done: bool,
    active: usize,
}

impl Merge {
    /// Apply `update` and report whether the merged stream is now complete.
    fn settle(state: &Mutex<Merge>, update: impl FnOnce(&mut Merge)) -> bool {
        match state.lock() {
            Ok(mut merge) => {
                update(&mut merge);
                merge.upstream_done && merge.active == 0
            }
            Err(_) => false,
        }
    }
}

impl<P, F, Q> Producer for FlatMap<P, F>
where
    P: Producer,
    F: FnMut(P::Output) -> Q + Send + 'static,
    Q: Producer<Failure = P::Failure>,
{
    type Output = Q::Output;
    type Failure = P::Failure;

    fn subscribe(self, downstream: Subscriber<Q::Output, P::Failure>) {
        let mut transform = self.transform;
        let state = Arc::new(Mutex::new(Merge::default()));
        let outer = downstream;
        let upstream = stage(outer.subscription().clone(), move |event| match event {
            Event::Value(value) => {
                if let Ok(mut merge) = state.lock() {
                    merge.active += 1;
                }
                let inner_down = outer.clone();
                let inner_state = Arc::clone(&state);
                let inner = stage(outer.subscription().clone(), move |event| match event {
                    Event::Value(value) => {
                        inner_down.send(value);
                    }
                    Event::Finished => {
                        let done = Merge::settle(&inner_state, |merge| {
                            merge.active = merge.active.saturating_sub(1)
                        });
                        if done {
                            inner_down.finish();
                        }
                    }
                    Event::Failed(error) => {
                        inner_down.fail(error);
                    }
                });
                transform(value).subscribe(inner);
            }
            Event::Finished => {
                if Merge::settle(&state, |merge| merge.upstream_done = true) {
                    outer.finish();
                }
            }
            Event::Failed(error) => {
                outer.fail(error);
            }
        });
        self.upstream.subscribe(upstream);
    }
}

pub struct Delay<P> {
    upstream: P,
    delay: Duration,
}

enum Delayed<V, E> {
    Due(Instant, Event<V, E>),
    Stop,
}

impl<P: Producer> Producer for Delay<P> {
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe(self, downstream: Subscriber<P::Output, P::Failure>) {
        let (tx, rx) = mpsc::channel::<Delayed<P::Output, P::Failure>>();
        // Only the upstream stage owns the sender, so the worker sees a
        // disconnect once the upstream drops its subscriber.
        let tx = Arc::new(tx);

        let stop = Arc::downgrade(&tx);
        downstream.subscription().on_cancel(move || {
            if let Some(stop) = stop.upgrade() {
                let _ = stop.send(Delayed::Stop);
            }
        });

        let worker = downstream.clone();
        let spawned = thread::Builder::new()
            .name("delay".to_string())
            .spawn(move || {
                while let Ok(Delayed::Due(due, event)) = rx.recv() {
                    let now = Instant::now();
                    if due > now {
                        thread::sleep(due - now);
                    }
                    let terminal = event.is_terminal();
                    worker.emit(event);
                    if terminal {
                        break;
                    }
                }
            });
        if let Err(err) = spawned {
            tracing::warn!("failed to spawn delay worker, forwarding undelayed: {err}");
            self.upstream.subscribe(downstream);
            return;
        }

        let delay = self.delay;
        let upstream = stage(downstream.subscription().clone(), move |event| {
            let _ = tx.send(Delayed::Due(Instant::now() + delay, event));
        });
        self.upstream.subscribe(upstream);
    }
}

pub struct SubscribeOn<P> {
    upstream: P,
}

impl<P: Producer> Producer for SubscribeOn<P> {
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe(self, downstream: Subscriber<P::Output, P::Failure>) {
        let upstream = self.upstream;
        let (handoff_tx, handoff_rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("subscribe-on".to_string())
            .spawn(move || {
                if let Ok((upstream, downstream)) = handoff_rx.recv() {
                    Producer::subscribe(upstream, downstream);
                }
            });
        match spawned {
            Ok(_) => {
                let _ = handoff_tx.send((upstream, downstream));
            }
            Err(err) => {
                tracing::warn!("failed to spawn subscribe-on worker, subscribing inline: {err}");
                upstream.subscribe(downstream);
            }
        }
    }
}

pub struct SetFailure<P, E> {
    upstream: P,
    _failure: PhantomData<fn() -> E>,
}

impl<P, E> Producer for SetFailure<P, E>
where
    P: Producer<Failure = Infallible>,
    E: Send + 'static,
{
    type Output = P::Output;
    type Failure = E;

    fn subscribe(self, downstream: Subscriber<P::Output, E>) {
        let upstream = stage(downstream.subscription().clone(), move |event| match event {
            Event::Value(value) => {
                downstream.send(value);
            }
            Event::Finished => {
                downstream.finish();
            }
            Event::Failed(never) => match never {},
        });
        self.upstream.subscribe(upstream);
    }
}
