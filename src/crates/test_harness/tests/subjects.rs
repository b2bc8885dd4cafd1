#[path = "harness_support.rs"]
mod support;

use std::convert::Infallible;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use reactive_harness::{
    just, Event, Producer, ProducerExt, Subject, Subscriber, Subscription, TestScope,
};

fn recorder<V: Send + 'static>() -> (Arc<Mutex<Vec<V>>>, impl FnMut(V) + Send + 'static) {
    let store = Arc::new(Mutex::new(Vec::new()));
    let sink = store.clone();
    (store, move |value| sink.lock().expect("recorder lock").push(value))
}

#[test]
fn values_sent_after_subscribing_are_received() {
    support::init_tracing();
    let scope = TestScope::new();
    let subject = Subject::<i32, Infallible>::new();
    let (received, on_value) = recorder();

    scope.sink(subject.clone(), on_value);
    subject.send(1);

    assert_eq!(*received.lock().expect("received lock"), vec![1]);
}

#[test]
fn late_subscribers_get_no_replay() {
    let scope = TestScope::new();
    let subject = Subject::<&str, String>::new();
    let (early, on_early) = recorder();
    let (late, on_late) = recorder();

    scope.sink(subject.clone(), on_early);
    subject.send("first");
    scope.sink(subject.clone(), on_late);
    subject.send("second");

    assert_eq!(*early.lock().expect("early lock"), vec!["first", "second"]);
    assert_eq!(*late.lock().expect("late lock"), vec!["second"]);
}

#[test]
fn values_are_broadcast_to_every_subscriber() {
    let scope = TestScope::new();
    let subject = Subject::<u8, String>::new();
    let (first, on_first) = recorder();
    let (second, on_second) = recorder();

    scope.sink(subject.clone(), on_first);
    scope.sink(subject.clone().map(|v| v * 2), on_second);

    assert_eq!(subject.send(21), 2);
    assert_eq!(*first.lock().expect("first lock"), vec![21]);
    assert_eq!(*second.lock().expect("second lock"), vec![42]);
}

#[test]
fn subscribing_after_termination_completes_immediately() {
    let scope = TestScope::new();
    let subject = Subject::<i32, String>::new();
    subject.send(1);
    subject.finish();

    let result = scope.capture_within(subject.clone(), Duration::from_secs(5));

    assert!(result.values.is_empty());
    assert!(result.is_completed());
    assert!(subject.is_terminated());
}

#[test]
fn failure_is_broadcast_to_a_waiting_capture() {
    let scope = TestScope::new();
    let subject = Subject::<i32, String>::new();
    let feeder = subject.clone();
    let handle = thread::spawn(move || {
        while feeder.subscriber_count() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        feeder.send(5);
        feeder.fail("feed interrupted".to_string());
    });

    let result = scope.capture_within(subject.clone(), Duration::from_secs(5));
    handle.join().expect("feeder thread");

    assert_eq!(result.values, vec![5]);
    assert_eq!(result.failure().map(String::as_str), Some("feed interrupted"));
    assert_eq!(subject.send(6), 0);
}

#[test]
fn forwarding_a_just_into_a_subject() {
    let scope = TestScope::new();
    let subject = Subject::<i32, Infallible>::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let observed = subject.clone().sink(move |event| sink.lock().expect("events lock").push(event));
    scope.track(observed);

    let forwarding = just(29).forward_to(&subject);
    scope.track(forwarding);

    assert_eq!(
        *events.lock().expect("events lock"),
        vec![Event::Value(29), Event::Finished]
    );
}

#[test]
fn cancelling_twice_behaves_like_cancelling_once() {
    let scope = TestScope::new();
    let subject = Subject::<i32, String>::new();
    let (received, on_value) = recorder();

    let subscription = scope.sink(subject.clone(), on_value);
    subject.send(1);
    subscription.cancel();
    subscription.cancel();
    subject.send(2);

    assert!(subscription.is_cancelled());
    assert_eq!(subject.subscriber_count(), 0);
    assert_eq!(*received.lock().expect("received lock"), vec![1]);
}

#[test]
fn cancelling_after_termination_is_harmless() {
    let subject = Subject::<i32, String>::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let subscription = subject
        .clone()
        .sink(move |event| sink.lock().expect("events lock").push(event));

    subject.finish();
    subscription.cancel();
    subscription.cancel();
    subject.finish();

    assert_eq!(*events.lock().expect("events lock"), vec![Event::Finished]);
}

#[test]
fn observer_can_send_back_into_its_own_subject() {
    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        let scope = TestScope::new();
        let subject = Subject::<i32, Infallible>::new();
        let feedback = subject.clone();
        let (received, mut on_value) = recorder();

        scope.sink(subject.clone(), move |value: i32| {
            on_value(value);
            if value < 3 {
                feedback.send(value + 1);
            }
        });
        subject.send(1);

        let _ = done_tx.send(received.lock().expect("received lock").clone());
    });

    let received = done_rx
        .recv_timeout(Duration::from_secs(3))
        .expect("sending from inside an observer should not block");
    assert_eq!(received, vec![1, 2, 3]);
}

#[test]
fn cancelling_inside_the_observer_drops_queued_notifications() {
    let subject = Subject::<i32, String>::new();
    let feedback = subject.clone();
    let subscription = Subscription::new();
    let own = subscription.clone();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    let subscriber = Subscriber::with_subscription(
        move |event: Event<i32, String>| {
            let first = event == Event::Value(1);
            sink.lock().expect("events lock").push(event);
            if first {
                feedback.send(2);
                feedback.finish();
                own.cancel();
            }
        },
        subscription.clone(),
    );
    subject.clone().subscribe(subscriber);
    subject.send(1);

    assert!(subscription.is_cancelled());
    assert_eq!(*events.lock().expect("events lock"), vec![Event::Value(1)]);
}
