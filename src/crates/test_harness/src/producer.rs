use crate::subscription::Subscriber;

/// Source of zero or more values that terminates at most once.
///
/// A producer is consumed by `subscribe`; the subscriber's [`Subscription`]
/// (see [`Subscriber::subscription`]) is the handle used to cancel it.
///
/// [`Subscription`]: crate::Subscription
pub trait Producer: Send + 'static {
    type Output: Send + 'static;
    type Failure: Send + 'static;

    /// Attach `subscriber` and start delivering notifications to it.
    fn subscribe(self, subscriber: Subscriber<Self::Output, Self::Failure>);
}

trait DynProducer<V, E>: Send {
    fn subscribe_boxed(self: Box<Self>, subscriber: Subscriber<V, E>);
}

impl<P: Producer> DynProducer<P::Output, P::Failure> for P {
    fn subscribe_boxed(self: Box<Self>, subscriber: Subscriber<P::Output, P::Failure>) {
        (*self).subscribe(subscriber)
    }
}

/// Type-erased producer, for pipelines whose concrete adapter type is unwieldy
/// or differs between branches.
pub struct BoxProducer<V, E> {
    inner: Box<dyn DynProducer<V, E>>,
}

impl<V, E> BoxProducer<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    pub fn new<P>(producer: P) -> Self
    where
        P: Producer<Output = V, Failure = E>,
    {
        Self {
            inner: Box::new(producer),
        }
    }
}

impl<V, E> Producer for BoxProducer<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    type Output = V;
    type Failure = E;

    fn subscribe(self, subscriber: Subscriber<V, E>) {
        self.inner.subscribe_boxed(subscriber)
    }
}
