//! Leaf producers: constant values, iterators, immediate termination and
//! single-shot promises resolved on a worker thread.

use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;
use std::thread;

use crate::producer::Producer;
use crate::subscription::Subscriber;

/// Emits one value, then finishes.
#[derive(Debug, Clone)]
pub struct Just<V> {
    value: V,
}

pub fn just<V: Send + 'static>(value: V) -> Just<V> {
    Just { value }
}

impl<V: Send + 'static> Producer for Just<V> {
    type Output = V;
    type Failure = Infallible;

    fn subscribe(self, subscriber: Subscriber<V, Infallible>) {
        if subscriber.send(self.value) {
            subscriber.finish();
        }
    }
}

/// Emits every element of an iterator in order, then finishes.
#[derive(Debug, Clone)]
pub struct Sequence<I> {
    elements: I,
}

pub fn sequence<I>(elements: I) -> Sequence<I::IntoIter>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    Sequence {
        elements: elements.into_iter(),
    }
}

impl<I> Producer for Sequence<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    type Output = I::Item;
    type Failure = Infallible;

    fn subscribe(self, subscriber: Subscriber<I::Item, Infallible>) {
        for element in self.elements {
            if !subscriber.send(element) {
                return;
            }
        }
        subscriber.finish();
    }
}

/// Finishes without emitting.
pub struct Empty<V, E> {
    _marker: PhantomData<fn() -> (V, E)>,
}

pub fn empty<V, E>() -> Empty<V, E> {
    Empty {
        _marker: PhantomData,
    }
}

impl<V: Send + 'static, E: Send + 'static> Producer for Empty<V, E> {
    type Output = V;
    type Failure = E;

    fn subscribe(self, subscriber: Subscriber<V, E>) {
        subscriber.finish();
    }
}

/// Fails immediately with the given error.
pub struct Fail<V, E> {
    error: E,
    _marker: PhantomData<fn() -> V>,
}

pub fn fail<V, E>(error: E) -> Fail<V, E> {
    Fail {
        error,
        _marker: PhantomData,
    }
}

impl<V: Send + 'static, E: Send + 'static> Producer for Fail<V, E> {
    type Output = V;
    type Failure = E;

    fn subscribe(self, subscriber: Subscriber<V, E>) {
        subscriber.fail(self.error);
    }
}

/// Never emits and never terminates.
pub struct Never<V, E> {
    _marker: PhantomData<fn() -> (V, E)>,
}

pub fn never<V, E>() -> Never<V, E> {
    Never {
        _marker: PhantomData,
    }
}

impl<V: Send + 'static, E: Send + 'static> Producer for Never<V, E> {
    type Output = V;
    type Failure = E;

    fn subscribe(self, subscriber: Subscriber<V, E>) {
        // Keep the subscriber alive until cancelled so the stream stays open.
        let held = subscriber.clone();
        subscriber.subscription().on_cancel(move || drop(held));
    }
}

/// One-shot completion handle passed to a [`Promise`] task.
///
/// Resolving consumes the handle, so a promise settles at most once.
pub struct Resolver<V, E> {
    subscriber: Subscriber<V, E>,
}

impl<V, E> Resolver<V, E> {
    pub fn resolve(self, result: Result<V, E>) {
        match result {
            Ok(value) => self.succeed(value),
            Err(error) => self.reject(error),
        }
    }

    pub fn succeed(self, value: V) {
        if self.subscriber.send(value) {
            self.subscriber.finish();
        }
    }

    pub fn reject(self, error: E) {
        self.subscriber.fail(error);
    }

    /// True when nobody is listening any more; long tasks may bail out early.
    pub fn is_cancelled(&self) -> bool {
        self.subscriber.is_closed()
    }
}

impl<V, E> fmt::Debug for Resolver<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("subscriber", &self.subscriber)
            .finish()
    }
}

type Task<V, E> = Box<dyn FnOnce(Resolver<V, E>) + Send>;

/// Single-shot producer: the task runs on its own thread once a subscriber
/// attaches and settles through its [`Resolver`].
///
/// Dropping the resolver without settling leaves the subscriber abandoned.
pub struct Promise<V, E> {
    name: String,
    task: Task<V, E>,
}

impl<V, E> Promise<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    pub fn new<F>(task: F) -> Self
    where
        F: FnOnce(Resolver<V, E>) + Send + 'static,
    {
        Self::named("promise", task)
    }

    /// Like [`Promise::new`], with a thread name used in logs and panics.
    pub fn named<F>(name: impl Into<String>, task: F) -> Self
    where
        F: FnOnce(Resolver<V, E>) + Send + 'static,
    {
        Self {
            name: name.into(),
            task: Box::new(task),
        }
    }

    /// Promise that resolves with an already known result.
    pub fn from_result(result: Result<V, E>) -> Self {
        Self::new(move |resolver| resolver.resolve(result))
    }
}

impl<V, E> Producer for Promise<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    type Output = V;
    type Failure = E;

    fn subscribe(self, subscriber: Subscriber<V, E>) {
        let task = self.task;
        let resolver = Resolver { subscriber };
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || task(resolver));
        if let Err(err) = spawned {
            // The resolver went down with the closure, so the subscriber is abandoned.
            tracing::warn!(promise = %self.name, "failed to spawn promise worker: {err}");
        }
    }
}

impl<V, E> fmt::Debug for Promise<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").field("name", &self.name).finish()
    }
}
