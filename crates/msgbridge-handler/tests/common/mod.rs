#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use msgbridge_handler::MessageHandler;
use msgbridge_transport::LoopbackPort;
use msgbridge_wire::Frame;

/// Two handlers talking over one in-process port.
pub fn pair() -> (MessageHandler, MessageHandler, Arc<LoopbackPort<Frame>>) {
    let port = Arc::new(LoopbackPort::<Frame>::new());
    let main = MessageHandler::new("main", "worker", port.clone()).unwrap();
    let worker = MessageHandler::new("worker", "main", port.clone()).unwrap();
    (main, worker, port)
}

/// Let in-flight frames and handler tasks run to quiescence.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}

/// Ordered record of producer-side events.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<String>>);

impl Log {
    pub fn push(&self, event: char) {
        self.0.lock().unwrap().push(event);
    }

    pub fn get(&self) -> String {
        self.0.lock().unwrap().clone()
    }
}
