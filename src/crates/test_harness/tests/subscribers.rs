#[path = "harness_support.rs"]
mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use reactive_harness::{Event, Outcome, Producer, Subscriber, TestScope};

/// Keeps emitting after its first terminal event and records which
/// notifications the subscriber accepted.
struct Unruly {
    accepted: Arc<Mutex<Vec<bool>>>,
}

impl Producer for Unruly {
    type Output = i32;
    type Failure = String;

    fn subscribe(self, subscriber: Subscriber<i32, String>) {
        let late = subscriber.clone();
        let mut accepted = self.accepted.lock().expect("accepted lock");
        accepted.push(subscriber.send(1));
        accepted.push(subscriber.finish());
        accepted.push(late.send(2));
        accepted.push(late.fail("too late".to_string()));
        accepted.push(late.finish());
    }
}

#[test]
fn notifications_after_the_first_terminal_are_refused() {
    support::init_tracing();
    let scope = TestScope::new();
    let accepted = Arc::new(Mutex::new(Vec::new()));

    let result = scope.capture(Unruly {
        accepted: accepted.clone(),
    });

    assert_eq!(result.values, vec![1]);
    assert_eq!(result.outcome(), &Outcome::Finished);
    assert_eq!(
        *accepted.lock().expect("accepted lock"),
        vec![true, true, false, false, false]
    );
}

#[test]
fn observer_sees_exactly_one_terminal() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let subscriber =
        Subscriber::<i32, String>::new(move |event| sink.lock().expect("events lock").push(event));

    Unruly {
        accepted: Arc::new(Mutex::new(Vec::new())),
    }
    .subscribe(subscriber.clone());

    assert!(subscriber.is_closed());
    assert!(!subscriber.send(3));
    assert_eq!(
        *events.lock().expect("events lock"),
        vec![Event::Value(1), Event::Finished]
    );
}

#[test]
fn concurrent_emitters_share_one_ordered_stream() {
    const WORKERS: usize = 4;
    const PER_WORKER: usize = 250;

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let subscriber =
        Subscriber::<usize, String>::new(move |event| sink.lock().expect("events lock").push(event));
    let values = Arc::new(AtomicUsize::new(0));
    let terminals = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let subscriber = subscriber.clone();
            let values = values.clone();
            let terminals = terminals.clone();
            thread::spawn(move || {
                for n in 0..PER_WORKER {
                    if subscriber.send(worker * 1000 + n) {
                        values.fetch_add(1, Ordering::SeqCst);
                    }
                }
                if subscriber.finish() {
                    terminals.fetch_add(1, Ordering::SeqCst);
                }
                if subscriber.send(usize::MAX) {
                    values.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("emitter thread");
    }

    let events = events.lock().expect("events lock");
    assert_eq!(terminals.load(Ordering::SeqCst), 1);
    assert_eq!(events.iter().filter(|event| event.is_terminal()).count(), 1);
    assert_eq!(events.last(), Some(&Event::Finished));
    assert_eq!(events.len() - 1, values.load(Ordering::SeqCst));
    assert!(!events.contains(&Event::Value(usize::MAX)));

    for worker in 0..WORKERS {
        let own: Vec<usize> = events
            .iter()
            .filter_map(|event| match event {
                Event::Value(value) if value / 1000 == worker => Some(*value),
                _ => None,
            })
            .collect();
        assert!(own.windows(2).all(|pair| pair[0] < pair[1]), "worker {worker} out of order");
    }
    assert!(!subscriber.send(0));
}
