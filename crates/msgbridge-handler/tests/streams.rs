mod common;

use std::sync::{Arc, Mutex};

use common::{pair, settle, Log};
use msgbridge_handler::{MessageHandler, QueueingStrategy, StreamSink};
use msgbridge_wire::{BoxError, Reason};
use serde_json::{json, Value};
use tokio::sync::oneshot;

fn install_hooks(sink: &StreamSink, log: &Log) {
    let on_pull = log.clone();
    sink.set_on_pull(move || {
        on_pull.push('p');
        async { Ok::<_, BoxError>(()) }
    });
    let on_cancel = log.clone();
    sink.set_on_cancel(move |_reason| {
        on_cancel.push('c');
        async { Ok::<_, BoxError>(()) }
    });
}

/// Registers a producer that sends `[1, 2, 3, 4]` while starting, then
/// `[5, 6, 7, 8]` and a close as credit allows. A rejected `ready` logs '4'.
fn two_chunk_producer(worker: &MessageHandler, log: &Log) {
    let log = log.clone();
    worker
        .on_stream("fakeHandler", move |_data, sink| {
            let log = log.clone();
            async move {
                install_hooks(&sink, &log);
                log.push('0');
                sink.ready().await?;
                log.push('1');
                sink.enqueue_sized([1, 2, 3, 4], 4)?;

                tokio::spawn(async move {
                    if sink.ready().await.is_err() {
                        log.push('4');
                        return;
                    }
                    log.push('2');
                    sink.enqueue_sized([5, 6, 7, 8], 4).unwrap();
                    if sink.ready().await.is_err() {
                        log.push('4');
                        return;
                    }
                    sink.close().unwrap();
                });
                Ok::<_, BoxError>(())
            }
        })
        .unwrap();
}

#[tokio::test]
async fn reader_pulls_as_chunks_are_consumed() {
    let (main, worker, _port) = pair();
    let log = Log::default();
    two_chunk_producer(&worker, &log);

    let mut reader = main.send_with_stream("fakeHandler", Value::Null, QueueingStrategy::array_length(4));
    settle().await;
    assert_eq!(log.get(), "01");

    assert_eq!(reader.read().await.unwrap(), Some(json!([1, 2, 3, 4])));
    settle().await;
    assert_eq!(log.get(), "01p2");

    assert_eq!(reader.read().await.unwrap(), Some(json!([5, 6, 7, 8])));
    settle().await;
    assert_eq!(log.get(), "01p2p");

    assert_eq!(reader.read().await.unwrap(), None);
    settle().await;
    assert_eq!(main.open_streams(), 0);
    assert_eq!(worker.open_sinks(), 0);
}

#[tokio::test]
async fn cancel_reaches_the_producer() {
    let (main, worker, _port) = pair();
    let log = Log::default();
    two_chunk_producer(&worker, &log);

    let mut reader = main.send_with_stream("fakeHandler", Value::Null, QueueingStrategy::array_length(4));
    settle().await;
    assert_eq!(reader.read().await.unwrap(), Some(json!([1, 2, 3, 4])));
    settle().await;
    assert_eq!(log.get(), "01p2");

    reader
        .cancel(Reason::abort("reader cancelled."))
        .await
        .unwrap();
    assert!(log.get().contains('c'));
    settle().await;
    assert_eq!(log.get(), "01p2c4");

    // Queued chunks are dropped by the cancel.
    assert_eq!(reader.read().await.unwrap(), None);
    assert_eq!(main.open_streams(), 0);
    assert_eq!(worker.open_sinks(), 0);
}

#[tokio::test]
async fn producer_sees_the_cancel_reason() {
    let (main, worker, _port) = pair();
    let seen: Arc<Mutex<Option<Reason>>> = Arc::default();
    let record = seen.clone();
    worker
        .on_stream("Forever", move |_data, sink| {
            let record = record.clone();
            async move {
                sink.set_on_cancel(move |reason| {
                    *record.lock().unwrap() = Some(reason);
                    async { Ok::<_, BoxError>(()) }
                });
                Ok::<_, BoxError>(())
            }
        })
        .unwrap();

    let mut reader = main.send_with_stream("Forever", (), QueueingStrategy::default());
    settle().await;
    reader.cancel(Reason::abort("enough")).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), Some(Reason::abort("enough")));
}

#[tokio::test]
async fn failing_cancel_hook_still_acknowledges() {
    let (main, worker, _port) = pair();
    worker
        .on_stream("Stubborn", |_data, sink| async move {
            sink.set_on_cancel(|_reason| async { Err::<(), BoxError>("cleanup failed".into()) });
            Ok::<_, BoxError>(())
        })
        .unwrap();

    let mut reader = main.send_with_stream("Stubborn", (), QueueingStrategy::default());
    settle().await;
    reader.cancel(Reason::abort("stop")).await.unwrap();
}

#[tokio::test]
async fn cancel_after_producer_closed_with_queued_chunks() {
    let (main, worker, _port) = pair();
    worker
        .on_stream("Pair", |_data, sink| async move {
            sink.enqueue(1)?;
            sink.enqueue(2)?;
            sink.close()?;
            Ok::<_, BoxError>(())
        })
        .unwrap();

    let mut reader = main.send_with_stream("Pair", (), QueueingStrategy::count(4));
    settle().await;
    assert_eq!(main.open_streams(), 0);

    assert_eq!(reader.read().await.unwrap(), Some(json!(1)));
    tokio::time::timeout(
        std::time::Duration::from_secs(2),
        reader.cancel(Reason::abort("done early")),
    )
    .await
    .expect("cancel resolves once the producer has closed")
    .unwrap();

    assert_eq!(reader.read().await.unwrap(), None);
    settle().await;
    assert_eq!(main.open_streams(), 0);
    assert_eq!(worker.open_sinks(), 0);
}

#[tokio::test]
async fn producer_error_surfaces_on_read() {
    let (main, worker, _port) = pair();
    let log = Log::default();
    let producer_log = log.clone();
    worker
        .on_stream("fakeHandler", move |_data, sink| {
            let log = producer_log.clone();
            async move {
                install_hooks(&sink, &log);
                log.push('0');
                sink.ready().await?;
                log.push('1');
                sink.enqueue_sized([1, 2, 3, 4], 4)?;
                tokio::spawn(async move {
                    if sink.ready().await.is_ok() {
                        log.push('e');
                        sink.error("should not read when errored").unwrap();
                    }
                });
                Ok::<_, BoxError>(())
            }
        })
        .unwrap();

    let mut reader = main.send_with_stream("fakeHandler", Value::Null, QueueingStrategy::array_length(4));
    settle().await;
    assert_eq!(log.get(), "01");
    assert_eq!(reader.read().await.unwrap(), Some(json!([1, 2, 3, 4])));
    settle().await;
    assert_eq!(log.get(), "01pe");

    let err = reader.read().await.unwrap_err();
    match err.reason() {
        Some(Reason::Unknown { message, .. }) => {
            assert_eq!(message, "should not read when errored");
        }
        other => panic!("unexpected reason {other:?}"),
    }
    // Cancelling an errored stream reports the same failure.
    assert!(reader.cancel(Reason::abort("late")).await.is_err());
}

#[tokio::test]
async fn no_pull_after_close() {
    let (main, worker, _port) = pair();
    let log = Log::default();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let release_rx = Arc::new(Mutex::new(Some(release_rx)));
    let producer_log = log.clone();
    worker
        .on_stream("fakeHandler", move |_data, sink| {
            let log = producer_log.clone();
            let release = release_rx.lock().unwrap().take();
            async move {
                install_hooks(&sink, &log);
                log.push('0');
                sink.ready().await?;
                log.push('1');
                sink.enqueue_sized([1, 2, 3, 4], 4)?;
                if let Some(release) = release {
                    let _ = release.await;
                }
                sink.close()?;
                Ok::<_, BoxError>(())
            }
        })
        .unwrap();

    let mut reader = main.send_with_stream("fakeHandler", Value::Null, QueueingStrategy::array_length(10));
    settle().await;
    assert_eq!(log.get(), "01");

    release_tx.send(()).unwrap();
    settle().await;
    assert_eq!(reader.read().await.unwrap(), Some(json!([1, 2, 3, 4])));
    assert_eq!(reader.read().await.unwrap(), None);
    settle().await;
    assert_eq!(log.get(), "01");
}

#[tokio::test]
async fn buffers_up_to_the_high_water_mark() {
    let (main, worker, _port) = pair();
    let log = Log::default();
    let producer_log = log.clone();
    worker
        .on_stream("fakeHandler", move |_data, sink| {
            let log = producer_log.clone();
            async move {
                install_hooks(&sink, &log);
                log.push('0');
                let producer = sink.clone();
                let producer_log = log.clone();
                tokio::spawn(async move {
                    producer.ready().await.unwrap();
                    producer_log.push('1');
                    producer.enqueue_sized([1, 2, 3, 4], 4).unwrap();
                    producer.ready().await.unwrap();
                    producer_log.push('2');
                    producer.enqueue_sized([5, 6, 7, 8], 4).unwrap();
                    if producer.ready().await.is_ok() {
                        producer.close().unwrap();
                    }
                });
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                Ok::<_, BoxError>(())
            }
        })
        .unwrap();

    let mut reader = main.send_with_stream("fakeHandler", Value::Null, QueueingStrategy::array_length(8));
    settle().await;
    assert_eq!(log.get(), "012");

    assert_eq!(reader.read().await.unwrap(), Some(json!([1, 2, 3, 4])));
    settle().await;
    assert_eq!(log.get(), "012p");

    assert_eq!(reader.read().await.unwrap(), Some(json!([5, 6, 7, 8])));
    assert_eq!(reader.read().await.unwrap(), None);
    assert_eq!(log.get(), "012p");
}

#[tokio::test]
async fn failed_start_errors_the_reader() {
    let (main, worker, _port) = pair();
    worker
        .on_stream("Broken", |_data, _sink| async {
            Err::<(), BoxError>(Reason::missing_resource("no such document").into())
        })
        .unwrap();

    let mut reader = main.send_with_stream("Broken", (), QueueingStrategy::default());
    let err = reader.read().await.unwrap_err();
    assert_eq!(err.reason(), Some(&Reason::missing_resource("no such document")));
    settle().await;
    assert_eq!(main.open_streams(), 0);
    assert_eq!(worker.open_sinks(), 0);
}

#[tokio::test]
async fn stream_adapter_yields_every_chunk() {
    use futures_util::StreamExt;

    let (main, worker, _port) = pair();
    worker
        .on_stream("Count", |data, sink| async move {
            let to = data["to"].as_i64().unwrap_or(0);
            tokio::spawn(async move {
                for n in 0..to {
                    if sink.ready().await.is_err() {
                        return;
                    }
                    sink.enqueue(n).unwrap();
                }
                sink.close().unwrap();
            });
            Ok::<_, BoxError>(())
        })
        .unwrap();

    let chunks: Vec<Value> = main
        .send_with_stream("Count", json!({"to": 5}), QueueingStrategy::count(2))
        .into_stream()
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;
    assert_eq!(chunks, vec![json!(0), json!(1), json!(2), json!(3), json!(4)]);
}
