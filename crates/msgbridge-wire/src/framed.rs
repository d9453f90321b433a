use std::io;
use std::sync::Mutex;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use msgbridge_transport::{Port, Result, Subscription, TransportError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

use crate::codec::{encode_payload, FrameCodec, FrameConfig};
use crate::error::WireError;
use crate::frame::Frame;

enum Outbound {
    Payload(Bytes),
    Flush(oneshot::Sender<()>),
}

/// A [`Port`] carrying frames over an async byte stream.
///
/// Frames are serialized synchronously in `post_message`, so an unencodable
/// frame fails before anything is queued. A writer task drains the queue in
/// order; a reader task decodes inbound envelopes for the single subscriber.
/// Must be created inside a tokio runtime.
pub struct FramedPort {
    outbound: mpsc::UnboundedSender<Outbound>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Frame>>>,
    max_payload_size: usize,
    reader_task: JoinHandle<()>,
}

impl FramedPort {
    /// Wrap a connected byte stream with default configuration.
    pub fn new<T>(io: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::with_config(io, FrameConfig::default())
    }

    /// Wrap a connected byte stream with explicit configuration.
    pub fn with_config<T>(io: T, config: FrameConfig) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(io);
        let mut reader = FramedRead::new(read_half, FrameCodec::new(&config));
        let mut writer = FramedWrite::new(write_half, FrameCodec::new(&config));

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Frame>();

        // The writer exits once every sender is gone, after flushing what
        // was already queued.
        tokio::spawn(async move {
            while let Some(item) = out_rx.recv().await {
                let written = match item {
                    Outbound::Payload(payload) => writer.send(payload).await,
                    Outbound::Flush(done) => {
                        let flushed = SinkExt::<Bytes>::flush(&mut writer).await;
                        let _ = done.send(());
                        flushed
                    }
                };
                if let Err(err) = written {
                    warn!(error = %err, "framed port write failed");
                    break;
                }
            }
            debug!("framed port writer finished");
        });

        let reader_task = tokio::spawn(async move {
            while let Some(item) = reader.next().await {
                match item {
                    Ok(frame) => {
                        if in_tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "framed port read failed");
                        break;
                    }
                }
            }
            debug!("framed port reader finished");
        });

        Self {
            outbound: out_tx,
            inbound: Mutex::new(Some(in_rx)),
            max_payload_size: config.max_payload_size,
            reader_task,
        }
    }

    /// Wait until every frame posted so far has been written out.
    pub async fn flush(&self) -> Result<()> {
        let (done, flushed) = oneshot::channel();
        self.outbound
            .send(Outbound::Flush(done))
            .map_err(|_| TransportError::Closed)?;
        flushed.await.map_err(|_| TransportError::Closed)
    }
}

impl Port<Frame> for FramedPort {
    fn post_message(&self, message: Frame) -> Result<()> {
        let payload = encode_payload(&message, self.max_payload_size).map_err(into_transport)?;
        self.outbound
            .send(Outbound::Payload(payload))
            .map_err(|_| TransportError::Closed)
    }

    fn subscribe(&self) -> Result<Subscription<Frame>> {
        let mut inbound = self
            .inbound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inbound
            .take()
            .map(Subscription::from_receiver)
            .ok_or(TransportError::AlreadySubscribed)
    }
}

impl Drop for FramedPort {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

fn into_transport(err: WireError) -> TransportError {
    match err {
        WireError::Io(io) => TransportError::Io(io),
        WireError::Json(json) => TransportError::Io(json.into()),
        other => TransportError::Io(io::Error::new(io::ErrorKind::InvalidInput, other.to_string())),
    }
}
