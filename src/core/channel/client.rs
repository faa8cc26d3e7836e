//! Socket.IO over WebSocket.
//!
//! `connect` performs the Engine.IO open and namespace CONNECT inside one
//! timeout, then hands the socket to a background task that answers pings,
//! forwards outgoing packets and queues incoming events as notifications
//! until either side closes. A second task drains that queue into the
//! observers once the handle's owner calls `start_notifications`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};
use url::Url;

use super::events::{ChannelEvent, EVENT_JOIN};
use super::observers::ObserverRegistry;
use super::packet::{EnginePacket, OpenPayload, SocketPacket, SocketPacketKind};
use super::{ChannelHandle, ConnectionState, EventChannel};
use crate::config::ClientConfig;
use crate::core::state::SessionState;
use crate::core::transport::API_KEY_HEADER;
use crate::errors::{ChannelError, ClientResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Outgoing queue depth. Only `join` and close are ever queued.
const OUTGOING_CAPACITY: usize = 32;

/// How long `disconnect` waits for the connection task to wind down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

enum Outgoing {
    Frame(String),
    Close,
}

/// Connector for the service's Socket.IO endpoint.
#[derive(Debug, Clone)]
pub struct SocketIoChannel {
    url: Url,
    namespace: String,
    handshake_timeout: Duration,
}

impl SocketIoChannel {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self::with_endpoint(
            config.channel_url()?,
            config.channel_namespace()?,
            config.handshake_timeout(),
        ))
    }

    pub fn with_endpoint(
        url: Url,
        namespace: impl Into<String>,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            url,
            namespace: namespace.into(),
            handshake_timeout,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn open(&self, auth: Value) -> Result<(WsSink, WsSource, OpenPayload), ChannelError> {
        if self.url.scheme() == "wss" {
            // Already installed is fine
            let _ = rustls::crypto::ring::default_provider().install_default();
        }

        let (ws_stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
        debug!("WebSocket open to {}", self.url);

        let (mut sink, mut stream) = ws_stream.split();
        let open = handshake(&mut sink, &mut stream, &self.namespace, auth).await?;
        Ok((sink, stream, open))
    }
}

#[async_trait]
impl EventChannel for SocketIoChannel {
    async fn connect(
        &self,
        credentials: &SessionState,
        observers: Arc<ObserverRegistry>,
    ) -> ClientResult<Box<dyn ChannelHandle>> {
        let creds = credentials.authorized()?;
        let mut auth = serde_json::Map::new();
        auth.insert("token".to_string(), json!(creds.bearer_token));
        auth.insert(API_KEY_HEADER.to_string(), json!(creds.api_key));
        let auth = Value::Object(auth);

        info!("Connecting channel namespace {}", self.namespace);

        let (sink, stream, open) = timeout(self.handshake_timeout, self.open(auth))
            .await
            .map_err(|_| {
                ChannelError::Timeout(format!(
                    "Handshake did not complete within {:?}",
                    self.handshake_timeout
                ))
            })??;

        info!("Channel connected (sid {})", open.sid);

        Ok(Box::new(SocketIoHandle::spawn(
            sink,
            stream,
            open,
            self.namespace.clone(),
            observers,
        )))
    }
}

/// Engine.IO open followed by the namespace CONNECT carrying `auth`.
async fn handshake(
    sink: &mut WsSink,
    stream: &mut WsSource,
    namespace: &str,
    auth: Value,
) -> Result<OpenPayload, ChannelError> {
    let mut open: Option<OpenPayload> = None;
    let mut auth = Some(auth);

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => {
                return Err(ChannelError::ConnectionFailed(
                    "Server closed the connection during handshake".to_string(),
                ));
            }
            Ok(_) => continue,
            Err(e) => return Err(ChannelError::ConnectionFailed(e.to_string())),
        };

        match EnginePacket::decode(text.as_str())? {
            EnginePacket::Open(payload) => {
                debug!(
                    "Engine.IO open: sid={} ping_interval={}ms ping_timeout={}ms",
                    payload.sid, payload.ping_interval, payload.ping_timeout
                );
                send_frame(sink, SocketPacket::connect(namespace, auth.take()).to_frame()).await?;
                open = Some(payload);
            }
            EnginePacket::Ping(data) => send_frame(sink, EnginePacket::Pong(data).encode()).await?,
            EnginePacket::Message(payload) => {
                let packet = SocketPacket::decode(&payload)?;
                if packet.namespace != namespace {
                    debug!("Ignoring packet for namespace {}", packet.namespace);
                    continue;
                }
                match packet.kind {
                    SocketPacketKind::Connect => {
                        return open.ok_or_else(|| {
                            ChannelError::Protocol("CONNECT received before open".to_string())
                        });
                    }
                    SocketPacketKind::ConnectError => {
                        return Err(ChannelError::Rejected(packet.error_message()));
                    }
                    SocketPacketKind::Disconnect => {
                        return Err(ChannelError::Rejected(
                            "Namespace closed during handshake".to_string(),
                        ));
                    }
                    kind => debug!("Ignoring {:?} packet during handshake", kind),
                }
            }
            EnginePacket::Close => {
                return Err(ChannelError::ConnectionFailed(
                    "Engine.IO session closed during handshake".to_string(),
                ));
            }
            _ => {}
        }
    }

    Err(ChannelError::ConnectionFailed(
        "Connection ended during handshake".to_string(),
    ))
}

async fn send_frame(sink: &mut WsSink, frame: String) -> Result<(), ChannelError> {
    sink.send(Message::Text(frame.into()))
        .await
        .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))
}

/// Open Socket.IO connection driven by a background task.
pub struct SocketIoHandle {
    namespace: String,
    state: Arc<RwLock<ConnectionState>>,
    sender: Mutex<Option<mpsc::Sender<Outgoing>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    notifier: Mutex<Option<mpsc::UnboundedSender<String>>>,
    delivery_gate: Mutex<Option<oneshot::Sender<()>>>,
    delivery: Mutex<Option<JoinHandle<()>>>,
    intentional_disconnect: Arc<AtomicBool>,
}

impl SocketIoHandle {
    fn spawn(
        sink: WsSink,
        stream: WsSource,
        open: OpenPayload,
        namespace: String,
        observers: Arc<ObserverRegistry>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Outgoing>(OUTGOING_CAPACITY);
        let (notify_tx, notify_rx) = mpsc::unbounded_channel::<String>();
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        let state = Arc::new(RwLock::new(ConnectionState::Connected));
        let intentional_disconnect = Arc::new(AtomicBool::new(false));

        let delivery = tokio::spawn(deliver_notifications(notify_rx, gate_rx, observers));
        // Queued ahead of anything the connection task can produce
        let _ = notify_tx.send(ChannelEvent::Connected.describe());

        let task = tokio::spawn(run_connection(
            sink,
            stream,
            rx,
            open.heartbeat_window(),
            namespace.clone(),
            state.clone(),
            intentional_disconnect.clone(),
            notify_tx.clone(),
        ));

        Self {
            namespace,
            state,
            sender: Mutex::new(Some(tx)),
            task: Mutex::new(Some(task)),
            notifier: Mutex::new(Some(notify_tx)),
            delivery_gate: Mutex::new(Some(gate_tx)),
            delivery: Mutex::new(Some(delivery)),
            intentional_disconnect,
        }
    }
}

#[async_trait]
impl ChannelHandle for SocketIoHandle {
    async fn join(&self, room: &str) -> ClientResult<()> {
        if self.state() != ConnectionState::Connected {
            return Err(ChannelError::NotConnected.into());
        }
        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            return Err(ChannelError::NotConnected.into());
        };

        let frame = SocketPacket::event(
            &self.namespace,
            EVENT_JOIN,
            vec![Value::String(room.to_string())],
        )
        .to_frame();
        debug!("-> {}", frame);
        sender
            .send(Outgoing::Frame(frame))
            .await
            .map_err(|_| ChannelError::NotConnected)?;

        info!("Joined room {}", room);
        Ok(())
    }

    async fn disconnect(&self) -> ClientResult<()> {
        if self.intentional_disconnect.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let sender = self.sender.lock().take();
        if let Some(sender) = sender {
            // The task may already be gone after a server close
            let _ = sender.send(Outgoing::Close).await;
        }

        let task = self.task.lock().take();
        let notifier = self.notifier.lock().take();
        if let Some(mut task) = task
            && timeout(CLOSE_TIMEOUT, &mut task).await.is_err()
        {
            warn!("Channel task did not stop within {:?}, aborting", CLOSE_TIMEOUT);
            task.abort();
            if let Some(notifier) = &notifier {
                let _ = notifier.send(ChannelEvent::Disconnected.describe());
            }
        }
        drop(notifier);
        *self.state.write() = ConnectionState::Disconnected;

        // Flush what is still queued. When called from an observer the
        // remaining notifications follow once that observer returns.
        self.start_notifications();
        let delivery = self.delivery.lock().take();
        if let Some(delivery) = delivery {
            if tokio::task::try_id() == Some(delivery.id()) {
                debug!("Channel closed from an observer");
            } else if timeout(CLOSE_TIMEOUT, delivery).await.is_err() {
                warn!("Observers still busy after {:?}", CLOSE_TIMEOUT);
            }
        }

        info!("Channel disconnected");
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn start_notifications(&self) {
        if let Some(gate) = self.delivery_gate.lock().take() {
            let _ = gate.send(());
        }
    }
}

impl Drop for SocketIoHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

/// Hand queued notifications to observers one at a time, once the gate opens.
async fn deliver_notifications(
    mut queue: mpsc::UnboundedReceiver<String>,
    gate: oneshot::Receiver<()>,
    observers: Arc<ObserverRegistry>,
) {
    // A dropped gate opens it too
    let _ = gate.await;
    while let Some(message) = queue.recv().await {
        observers.notify(message).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_connection(
    mut sink: WsSink,
    mut stream: WsSource,
    mut rx: mpsc::Receiver<Outgoing>,
    heartbeat_window: Duration,
    namespace: String,
    state: Arc<RwLock<ConnectionState>>,
    intentional_disconnect: Arc<AtomicBool>,
    notifier: mpsc::UnboundedSender<String>,
) {
    let heartbeat = tokio::time::sleep(heartbeat_window);
    tokio::pin!(heartbeat);

    loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(Outgoing::Frame(frame)) => {
                    if let Err(e) = send_frame(&mut sink, frame).await {
                        error!("Failed to send channel frame: {}", e);
                        break;
                    }
                }
                Some(Outgoing::Close) | None => {
                    let _ = send_frame(&mut sink, SocketPacket::disconnect(&namespace).to_frame()).await;
                    if let Err(e) = sink.close().await {
                        debug!("WebSocket close failed: {}", e);
                    }
                    break;
                }
            },

            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    heartbeat.as_mut().reset(Instant::now() + heartbeat_window);
                    if !handle_frame(text.as_str(), &mut sink, &namespace, &notifier).await {
                        break;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = sink.send(Message::Pong(data)).await {
                        error!("Failed to send pong: {}", e);
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("WebSocket closed by server");
                    break;
                }
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },

            _ = &mut heartbeat => {
                warn!("No ping from server within {:?}", heartbeat_window);
                break;
            }
        }
    }

    *state.write() = ConnectionState::Disconnected;
    if intentional_disconnect.load(Ordering::SeqCst) {
        debug!("Channel closed by client");
    } else {
        warn!("Channel connection lost");
    }
    let _ = notifier.send(ChannelEvent::Disconnected.describe());
}

/// Process one Engine.IO frame. Returns `false` when the connection is over.
async fn handle_frame(
    text: &str,
    sink: &mut WsSink,
    namespace: &str,
    notifier: &mpsc::UnboundedSender<String>,
) -> bool {
    let packet = match EnginePacket::decode(text) {
        Ok(packet) => packet,
        Err(e) => {
            warn!("Skipping frame: {}", e);
            return true;
        }
    };

    match packet {
        EnginePacket::Ping(data) => {
            if let Err(e) = send_frame(sink, EnginePacket::Pong(data).encode()).await {
                error!("Failed to answer ping: {}", e);
                return false;
            }
        }
        EnginePacket::Message(payload) => {
            let packet = match SocketPacket::decode(&payload) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!("Skipping packet: {}", e);
                    return true;
                }
            };
            if packet.namespace != namespace {
                debug!("Ignoring packet for namespace {}", packet.namespace);
                return true;
            }
            match packet.kind {
                SocketPacketKind::Event => match ChannelEvent::from_packet(&packet) {
                    Some(event) => {
                        debug!("<- {:?}", event);
                        let _ = notifier.send(event.describe());
                    }
                    None => debug!("Ignoring event {}", payload),
                },
                SocketPacketKind::Disconnect => {
                    info!("Server closed namespace {}", namespace);
                    return false;
                }
                kind => debug!("Ignoring {:?} packet", kind),
            }
        }
        EnginePacket::Close => {
            info!("Engine.IO session closed by server");
            return false;
        }
        _ => {}
    }
    true
}
