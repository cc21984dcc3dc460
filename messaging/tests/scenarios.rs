//! End-to-end scenarios covering bind/connect ordering, reconnection,
//! load-balanced dispatch, and request/response round trips.
//!
//! All scenarios use the in-process transport: deterministic, no port
//! contention between test threads, and exercises the same framed I/O path
//! TCP would.

use bytes::Bytes;
use messaging::prelude::*;
use messaging_core::frame::MessageFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

static NEXT_PORT_STANDIN: AtomicU64 = AtomicU64::new(1);

fn inproc_endpoint(path: &str) -> Endpoint {
    let id = NEXT_PORT_STANDIN.fetch_add(1, Ordering::Relaxed);
    Endpoint::new(Transport::Inproc, "scenarios", 0, format!("{path}-{id}"))
}

fn frame(n: u16) -> MessageFrame {
    MessageFrame::new(n, Bytes::from_static(b"payload"))
}

/// S1: bind, connect a single reader, add one frame, delivery within 1s.
#[test]
fn s1_bind_then_connect_then_add_frame() {
    messaging::dev_tracing::init_tracing();
    let endpoint = inproc_endpoint("/s1");
    let queue = ServiceQueue::new(RotationPolicy::FirstIdle);
    queue.bind(endpoint.clone()).unwrap();

    let (tx, rx) = mpsc::channel();
    let reader = ServiceQueueReader::new();
    reader
        .connect(endpoint, move |msg| {
            let _ = tx.send(msg);
        })
        .unwrap();

    queue.add_message_frame(frame(7));

    let received = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(received.type_id, 7);
}

/// S2: add the frame BEFORE binding; still delivered after connect
/// (store-and-forward survives even a not-yet-bound queue, since
/// `add_message_frame` only requires the `ServiceQueue` to exist).
#[test]
fn s2_add_before_bind_then_connect() {
    messaging::dev_tracing::init_tracing();
    let endpoint = inproc_endpoint("/s2");
    let queue = ServiceQueue::new(RotationPolicy::FirstIdle);
    queue.add_message_frame(frame(3));
    queue.bind(endpoint.clone()).unwrap();

    let (tx, rx) = mpsc::channel();
    let reader = ServiceQueueReader::new();
    reader
        .connect(endpoint, move |msg| {
            let _ = tx.send(msg);
        })
        .unwrap();

    let received = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(received.type_id, 3);
}

/// S3: reconnect survivability — disconnect, reconnect, resume receiving.
#[test]
fn s3_reconnect_resumes_delivery() {
    messaging::dev_tracing::init_tracing();
    let endpoint = inproc_endpoint("/s3");
    let queue = ServiceQueue::new(RotationPolicy::FirstIdle);
    queue.bind(endpoint.clone()).unwrap();

    let (tx, rx) = mpsc::channel();
    let reader = ServiceQueueReader::new();
    let tx1 = tx.clone();
    reader.connect(endpoint.clone(), move |msg| { let _ = tx1.send(msg); }).unwrap();
    queue.add_message_frame(frame(1));
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap().type_id, 1);

    reader.disconnect();
    // give the service queue's worker-watch thread time to notice and drop
    // the now-dead worker before the reader reconnects.
    std::thread::sleep(Duration::from_millis(300));

    reader.connect(endpoint, move |msg| { let _ = tx.send(msg); }).unwrap();
    queue.add_message_frame(frame(2));
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap().type_id, 2);
}

/// S4: one service queue, two readers on the same endpoint, `LoadBalance`,
/// N=1000 frames added before either connects; sum == N and fairness ratio
/// in (0.25, 0.75).
#[test]
fn s4_load_balance_two_readers_same_endpoint() {
    messaging::dev_tracing::init_tracing();
    let endpoint = inproc_endpoint("/s4");
    let queue = ServiceQueue::new(RotationPolicy::LoadBalance);

    const N: u64 = 1000;
    for i in 0..N {
        queue.add_message_frame(frame((i % u16::MAX as u64) as u16));
    }
    queue.bind(endpoint.clone()).unwrap();

    let counts = (Arc::new(AtomicU64::new(0)), Arc::new(AtomicU64::new(0)));
    let reader_a = ServiceQueueReader::new();
    let reader_b = ServiceQueueReader::new();
    let count_a = counts.0.clone();
    let count_b = counts.1.clone();
    reader_a.connect(endpoint.clone(), move |_| { count_a.fetch_add(1, Ordering::SeqCst); }).unwrap();
    reader_b.connect(endpoint, move |_| { count_b.fetch_add(1, Ordering::SeqCst); }).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while counts.0.load(Ordering::SeqCst) + counts.1.load(Ordering::SeqCst) < N && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    let a = counts.0.load(Ordering::SeqCst);
    let b = counts.1.load(Ordering::SeqCst);
    assert_eq!(a + b, N);
    let ratio = a as f64 / N as f64;
    assert!(ratio > 0.25 && ratio < 0.75, "fairness ratio out of bounds: {ratio}");
}

/// S5: two endpoints, one reader each, `LoadBalance`, N=1000 added after
/// both connect; same fairness bounds.
#[test]
fn s5_load_balance_two_endpoints() {
    messaging::dev_tracing::init_tracing();
    let p1 = inproc_endpoint("/s5-p1");
    let p2 = inproc_endpoint("/s5-p2");
    let queue = ServiceQueue::new(RotationPolicy::LoadBalance);
    queue.bind(p1.clone()).unwrap();
    queue.bind(p2.clone()).unwrap();

    let counts = (Arc::new(AtomicU64::new(0)), Arc::new(AtomicU64::new(0)));
    let reader_a = ServiceQueueReader::new();
    let reader_b = ServiceQueueReader::new();
    let count_a = counts.0.clone();
    let count_b = counts.1.clone();
    reader_a.connect(p1, move |_| { count_a.fetch_add(1, Ordering::SeqCst); }).unwrap();
    reader_b.connect(p2, move |_| { count_b.fetch_add(1, Ordering::SeqCst); }).unwrap();
    std::thread::sleep(Duration::from_millis(100));

    const N: u64 = 1000;
    for i in 0..N {
        queue.add_message_frame(frame((i % u16::MAX as u64) as u16));
    }

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while counts.0.load(Ordering::SeqCst) + counts.1.load(Ordering::SeqCst) < N && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    let a = counts.0.load(Ordering::SeqCst);
    let b = counts.1.load(Ordering::SeqCst);
    assert_eq!(a + b, N);
    let ratio = a as f64 / N as f64;
    assert!(ratio > 0.25 && ratio < 0.75, "fairness ratio out of bounds: {ratio}");
}

/// S6: Requester <-> Responder with an echo factory; request completes
/// within 1s returning the original message.
#[test]
fn s6_requester_responder_echo() {
    messaging::dev_tracing::init_tracing();
    let endpoint = inproc_endpoint("/s6");
    let factory: WorkUnitFactory = Arc::new(|msg: Message| msg);
    let responder = Responder::new(factory, 1, 4);
    responder.bind(endpoint.clone()).unwrap();

    let requester = Requester::new();
    requester.connect(endpoint).unwrap();

    let request = Message::new(42, Bytes::from_static(b"echo me"));
    let reply = requester.request(request.clone()).unwrap();
    assert_eq!(reply.type_id, request.type_id);
    assert_eq!(reply.payload, request.payload);
}

/// Property 6 (total delivery): N frames, K workers, no disconnects — every
/// frame arrives exactly once, summed across workers.
#[test]
fn total_delivery_no_duplicates_no_loss() {
    messaging::dev_tracing::init_tracing();
    let endpoint = inproc_endpoint("/total-delivery");
    let queue = ServiceQueue::new(RotationPolicy::FirstIdle);
    queue.bind(endpoint.clone()).unwrap();

    let received = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let reader_a = ServiceQueueReader::new();
    let reader_b = ServiceQueueReader::new();
    let received_a = received.clone();
    let received_b = received.clone();
    reader_a.connect(endpoint.clone(), move |msg| received_a.lock().push(msg.type_id)).unwrap();
    reader_b.connect(endpoint, move |msg| received_b.lock().push(msg.type_id)).unwrap();

    const N: u16 = 200;
    for i in 0..N {
        queue.add_message_frame(frame(i));
    }

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while received.lock().len() < N as usize && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    let mut got = received.lock().clone();
    got.sort_unstable();
    let expected: Vec<u16> = (0..N).collect();
    assert_eq!(got, expected);
}
