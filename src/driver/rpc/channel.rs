//! Multiplexed request channel.
//!
//! One TCP socket carries every request of a connection. A writer task
//! drains an outbox so frames never interleave, and a reader task routes
//! each response frame to the receiver registered for its request id.
//! Dropping a receiver's slot (on transaction close or connection close)
//! makes the waiting side observe end-of-channel immediately.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace, warn};

use crate::driver::error::{DriverError, DriverResult};
use crate::protocol::handshake::{self, HandshakeResult};
use crate::protocol::message::HANDSHAKE_REQUEST_ID;
use crate::protocol::{
    ClientCodec, Request, RequestFrame, RequestId, Response, ResponseFrame, TransactionId,
};

/// Receiving end of one request's responses.
pub(crate) type ResponseReceiver = mpsc::UnboundedReceiver<Response>;

type ResponseSender = mpsc::UnboundedSender<Response>;

/// Parameters for opening a channel.
#[derive(Debug, Clone)]
pub(crate) struct ChannelOptions {
    pub address: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub max_frame_size: usize,
}

/// Slot waiting for responses.
struct PendingRequest {
    /// Owning transaction, released together with it
    owner: Option<TransactionId>,
    sender: ResponseSender,
}

/// State shared with the reader task.
struct ChannelState {
    pending: Mutex<HashMap<RequestId, PendingRequest>>,
    open: AtomicBool,
    /// Why the channel broke, `None` if closed by the client
    failure: Mutex<Option<String>>,
}

impl ChannelState {
    fn dispatch(&self, frame: ResponseFrame) {
        trace!(id = frame.id, response = frame.body.name(), "received frame");
        let terminal = frame.body.is_terminal();
        let mut pending = self.pending.lock();
        let delivered = match pending.get(&frame.id) {
            Some(slot) => slot.sender.send(frame.body).is_ok(),
            None => {
                trace!(id = frame.id, "dropping frame for released request");
                false
            }
        };
        if terminal || !delivered {
            pending.remove(&frame.id);
        }
    }

    fn fail(&self, reason: String) {
        if self.open.swap(false, Ordering::SeqCst) {
            warn!(%reason, "connection channel broken");
            *self.failure.lock() = Some(reason);
        }
        self.pending.lock().clear();
    }
}

/// Client side of the multiplexed channel.
pub(crate) struct RpcChannel {
    address: String,
    state: Arc<ChannelState>,
    outbox: mpsc::UnboundedSender<RequestFrame>,
    next_id: AtomicU64,
    handshake: HandshakeResult,
    reader: JoinHandle<()>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl RpcChannel {
    /// Connect, perform the handshake and start the I/O tasks.
    ///
    /// Must run inside the connection's runtime.
    pub async fn connect(options: ChannelOptions) -> DriverResult<Self> {
        let stream = tokio::time::timeout(options.connect_timeout, TcpStream::connect(&options.address))
            .await
            .map_err(|_| {
                DriverError::connection(format!(
                    "Timed out connecting to {} after {:?}",
                    options.address, options.connect_timeout
                ))
            })?
            .map_err(|e| DriverError::connection(format!("Failed to connect to {}: {}", options.address, e)))?;

        // Enable TCP nodelay for lower latency
        stream.set_nodelay(true).ok();

        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, ClientCodec::with_max_size(options.max_frame_size));
        let mut writer = FramedWrite::new(write_half, ClientCodec::with_max_size(options.max_frame_size));

        let handshake = tokio::time::timeout(
            options.connect_timeout,
            Self::handshake(&mut reader, &mut writer, &options),
        )
        .await
        .map_err(|_| DriverError::connection(format!("Handshake with {} timed out", options.address)))??;

        debug!(
            address = %options.address,
            connection_id = %handshake.connection_id,
            server_version = %handshake.server_version,
            "connection channel open"
        );

        let state = Arc::new(ChannelState {
            pending: Mutex::new(HashMap::new()),
            open: AtomicBool::new(true),
            failure: Mutex::new(None),
        });
        let (outbox, outbox_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(write_loop(writer, outbox_rx, Arc::clone(&state)));
        let reader = tokio::spawn(read_loop(reader, Arc::clone(&state)));

        Ok(Self {
            address: options.address,
            state,
            outbox,
            next_id: AtomicU64::new(HANDSHAKE_REQUEST_ID + 1),
            handshake,
            reader,
            writer: Mutex::new(Some(writer)),
        })
    }

    async fn handshake(
        reader: &mut FramedRead<OwnedReadHalf, ClientCodec>,
        writer: &mut FramedWrite<OwnedWriteHalf, ClientCodec>,
        options: &ChannelOptions,
    ) -> DriverResult<HandshakeResult> {
        let open = handshake::open_request(&options.username, &options.password, &options.user_agent);
        writer.send(RequestFrame::new(HANDSHAKE_REQUEST_ID, open)).await?;

        let frame = match reader.next().await {
            Some(frame) => frame?,
            None => {
                return Err(DriverError::connection(format!(
                    "{} closed the connection during handshake",
                    options.address
                )))
            }
        };
        if frame.id != HANDSHAKE_REQUEST_ID {
            return Err(DriverError::protocol(format!(
                "handshake reply carries request id {}",
                frame.id
            )));
        }

        Ok(handshake::accept_reply(frame.body)??)
    }

    /// Server address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Handshake outcome.
    pub fn handshake_result(&self) -> &HandshakeResult {
        &self.handshake
    }

    /// Check whether the channel can still carry requests.
    pub fn is_open(&self) -> bool {
        self.state.open.load(Ordering::SeqCst)
    }

    /// Error describing why the channel cannot be used.
    pub fn closed_error(&self) -> DriverError {
        match self.state.failure.lock().as_ref() {
            Some(reason) => DriverError::connection(reason.clone()),
            None => DriverError::ConnectionClosed,
        }
    }

    /// Register a slot and queue the request.
    pub fn submit(&self, body: Request) -> DriverResult<(RequestId, ResponseReceiver)> {
        if !self.is_open() {
            return Err(self.closed_error());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.state.pending.lock().insert(
            id,
            PendingRequest {
                owner: body.transaction(),
                sender,
            },
        );

        trace!(id, request = body.name(), "queueing request");
        if self.outbox.send(RequestFrame::new(id, body)).is_err() {
            self.state.pending.lock().remove(&id);
            return Err(self.closed_error());
        }
        Ok((id, receiver))
    }

    /// Queue a follow-up frame on an existing request id.
    pub fn resume(&self, id: RequestId, body: Request) -> DriverResult<()> {
        if !self.is_open() {
            return Err(self.closed_error());
        }
        self.outbox
            .send(RequestFrame::new(id, body))
            .map_err(|_| self.closed_error())
    }

    /// Single round trip.
    pub async fn request(&self, body: Request, limit: Option<Duration>) -> DriverResult<Response> {
        let name = body.name();
        let (id, mut receiver) = self.submit(body)?;
        let received = receive(&mut receiver, limit).await;
        self.forget(id);

        let result = match received? {
            Some(response) => response.into_result().map_err(DriverError::from),
            None => Err(self.closed_error()),
        };
        if let Err(e) = &result {
            trace!(id, request = name, error = %e, "request failed");
        }
        result
    }

    /// Drop the slot of a request.
    pub fn forget(&self, id: RequestId) {
        self.state.pending.lock().remove(&id);
    }

    /// Drop every slot owned by a transaction.
    pub fn release_transaction(&self, transaction: TransactionId) {
        self.state
            .pending
            .lock()
            .retain(|_, slot| slot.owner != Some(transaction));
    }

    /// Close the channel. Idempotent.
    ///
    /// Returns true if a goodbye frame was queued.
    pub fn close(&self) -> bool {
        let mut goodbye = false;
        if self.state.open.swap(false, Ordering::SeqCst) {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            goodbye = self.outbox.send(RequestFrame::new(id, Request::ConnectionClose)).is_ok();
            if !goodbye {
                warn!(address = %self.address, "writer already stopped before goodbye");
            }
        }
        self.state.pending.lock().clear();
        goodbye
    }

    /// Close the channel and wait up to `limit` for the goodbye frame to flush.
    pub async fn shutdown(&self, limit: Duration) {
        let goodbye = self.close();
        let writer = self.writer.lock().take();
        if let Some(writer) = writer {
            if !goodbye {
                // Broken channel: nothing left worth flushing
                writer.abort();
            } else if tokio::time::timeout(limit, writer).await.is_err() {
                debug!(address = %self.address, "writer did not finish before shutdown deadline");
            }
        }
    }
}

impl Drop for RpcChannel {
    fn drop(&mut self) {
        self.close();
        // The writer stops on its own once the outbox sender is gone
        self.reader.abort();
    }
}

/// Wait for the next response, optionally bounded.
pub(crate) async fn receive(
    receiver: &mut ResponseReceiver,
    limit: Option<Duration>,
) -> DriverResult<Option<Response>> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, receiver.recv())
            .await
            .map_err(|_| DriverError::timeout(format!("no response within {:?}", limit))),
        None => Ok(receiver.recv().await),
    }
}

async fn write_loop(
    mut writer: FramedWrite<OwnedWriteHalf, ClientCodec>,
    mut outbox: mpsc::UnboundedReceiver<RequestFrame>,
    state: Arc<ChannelState>,
) {
    while let Some(frame) = outbox.recv().await {
        let goodbye = matches!(frame.body, Request::ConnectionClose);
        trace!(id = frame.id, request = frame.body.name(), "sending frame");
        if let Err(e) = writer.send(frame).await {
            state.fail(format!("write failed: {}", e));
            break;
        }
        if goodbye {
            break;
        }
    }

    if let Err(e) = writer.close().await {
        debug!(error = %e, "error shutting down write half");
    }
}

async fn read_loop(mut reader: FramedRead<OwnedReadHalf, ClientCodec>, state: Arc<ChannelState>) {
    loop {
        match reader.next().await {
            Some(Ok(frame)) => state.dispatch(frame),
            Some(Err(e)) => {
                state.fail(format!("read failed: {}", e));
                break;
            }
            None => {
                state.fail("connection closed by server".to_string());
                break;
            }
        }
    }
}
