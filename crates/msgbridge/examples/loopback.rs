//! Two handlers in one process: a call, a notification and a paced stream.
//!
//! Run with:
//!   cargo run --example loopback

use std::sync::Arc;
use std::time::Duration;

use msgbridge::handler::{MessageHandler, QueueingStrategy};
use msgbridge::transport::LoopbackPort;
use msgbridge::wire::{BoxError, Frame, Reason};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port = Arc::new(LoopbackPort::<Frame>::new());
    let main = MessageHandler::new("main", "worker", port.clone())?;
    let worker = MessageHandler::new("worker", "main", port)?;

    worker.on("Greet", |data| async move {
        let name = data["name"].as_str().unwrap_or("stranger").to_string();
        Ok::<_, BoxError>(json!(format!("hello, {name}")))
    })?;
    worker.on("Log", |data| async move {
        eprintln!("worker log: {data}");
        Ok::<_, BoxError>(Value::Null)
    })?;
    worker.on_stream("Pages", |data, sink| async move {
        let pages = data["pages"].as_u64().unwrap_or(0);
        sink.set_on_pull(|| async {
            eprintln!("worker: consumer asked for more");
            Ok::<_, BoxError>(())
        });
        tokio::spawn(async move {
            for page in 1..=pages {
                if sink.ready().await.is_err() {
                    eprintln!("worker: stream cancelled before page {page}");
                    return;
                }
                let _ = sink.enqueue(json!({"page": page, "text": format!("page {page} text")}));
            }
            let _ = sink.close();
        });
        Ok::<_, BoxError>(())
    })?;

    let greeting = main.send_with_promise("Greet", json!({"name": "msgbridge"})).await?;
    println!("{greeting}");

    main.send("Log", json!("fire and forget"))?;

    let mut pages = main.send_with_stream("Pages", json!({"pages": 10}), QueueingStrategy::count(2));
    while let Some(page) = pages.read().await? {
        println!("{page}");
        if page["page"] == 5 {
            pages.cancel(Reason::abort("read enough")).await?;
            break;
        }
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    Ok(())
}
