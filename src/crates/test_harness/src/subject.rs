use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use crate::producer::Producer;
use crate::subscription::Subscriber;

enum Terminal<E> {
    Finished,
    Failed(E),
}

struct SubjectState<V, E> {
    next_id: u64,
    subscribers: Vec<(u64, Subscriber<V, E>)>,
    terminal: Option<Terminal<E>>,
}

/// Multicast passthrough producer fed from the outside.
///
/// Values are broadcast to the subscribers attached at the time of sending; there
/// is no replay. A subscriber attaching after termination receives the terminal
/// notification straight away. Clones share the same state.
pub struct Subject<V, E> {
    state: Arc<Mutex<SubjectState<V, E>>>,
}

impl<V, E> Subject<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SubjectState {
                next_id: 0,
                subscribers: Vec::new(),
                terminal: None,
            })),
        }
    }

    /// Broadcast a value. Returns how many subscribers accepted it.
    pub fn send(&self, value: V) -> usize {
        let targets = match self.state.lock() {
            Ok(mut state) => {
                if state.terminal.is_some() {
                    return 0;
                }
                state.subscribers.retain(|(_, subscriber)| !subscriber.is_closed());
                state
                    .subscribers
                    .iter()
                    .map(|(_, subscriber)| subscriber.clone())
                    .collect::<Vec<_>>()
            }
            Err(_) => return 0,
        };

        // Delivered outside the lock: a subscriber may cancel while receiving.
        targets
            .iter()
            .filter(|subscriber| subscriber.send(value.clone()))
            .count()
    }

    pub fn finish(&self) {
        for subscriber in self.terminate(Terminal::Finished) {
            subscriber.finish();
        }
    }

    pub fn fail(&self, error: E) {
        for subscriber in self.terminate(Terminal::Failed(error.clone())) {
            subscriber.fail(error.clone());
        }
    }

    /// Number of attached subscribers that can still receive values.
    pub fn subscriber_count(&self) -> usize {
        match self.state.lock() {
            Ok(state) => state
                .subscribers
                .iter()
                .filter(|(_, subscriber)| !subscriber.is_closed())
                .count(),
            Err(_) => 0,
        }
    }

    pub fn is_terminated(&self) -> bool {
        match self.state.lock() {
            Ok(state) => state.terminal.is_some(),
            Err(_) => true,
        }
    }

    fn terminate(&self, terminal: Terminal<E>) -> Vec<Subscriber<V, E>> {
        let Ok(mut state) = self.state.lock() else {
            return Vec::new();
        };
        if state.terminal.is_some() {
            return Vec::new();
        }
        state.terminal = Some(terminal);
        state
            .subscribers
            .drain(..)
            .map(|(_, subscriber)| subscriber)
            .collect()
    }
}

impl<V, E> Default for Subject<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> Clone for Subject<V, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<V, E> fmt::Debug for Subject<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (subscribers, terminated) = match self.state.lock() {
            Ok(state) => (state.subscribers.len(), state.terminal.is_some()),
            Err(_) => (0, true),
        };
        f.debug_struct("Subject")
            .field("subscribers", &subscribers)
            .field("terminated", &terminated)
            .finish()
    }
}

impl<V, E> Producer for Subject<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = V;
    type Failure = E;

    fn subscribe(self, subscriber: Subscriber<V, E>) {
        let attached = {
            let Ok(mut guard) = self.state.lock() else {
                return;
            };
            let state = &mut *guard;
            match &state.terminal {
                Some(Terminal::Finished) => Err(Terminal::Finished),
                Some(Terminal::Failed(error)) => Err(Terminal::Failed(error.clone())),
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    state.subscribers.push((id, subscriber.clone()));
                    Ok(id)
                }
            }
        };

        match attached {
            Ok(id) => {
                // Weak so the subject does not keep itself alive through its subscribers.
                let weak: Weak<Mutex<SubjectState<V, E>>> = Arc::downgrade(&self.state);
                subscriber.subscription().on_cancel(move || {
                    if let Some(state) = weak.upgrade() {
                        if let Ok(mut state) = state.lock() {
                            state.subscribers.retain(|(entry, _)| *entry != id);
                        }
                    }
                });
            }
            Err(Terminal::Finished) => {
                subscriber.finish();
            }
            Err(Terminal::Failed(error)) => {
                subscriber.fail(error);
            }
        }
    }
}
