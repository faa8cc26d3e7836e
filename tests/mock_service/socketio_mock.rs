//! Socket.IO mock server
//!
//! Speaks just enough Engine.IO v4 / Socket.IO v5 over WebSocket to stand in
//! for the service's realtime channel: sends the open packet, answers the
//! namespace CONNECT according to [`MockBehavior`], records every frame the
//! client sends and lets the test push frames, or a WebSocket close, to
//! connected clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use listendoctor_client::core::channel::packet::{SocketPacket, SocketPacketKind};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use url::Url;

pub const NAMESPACE: &str = "/v1";

/// How the mock answers a namespace CONNECT.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Accept,
    Reject(String),
    /// Never answer, to exercise the handshake timeout
    Silent,
}

/// Engine.IO heartbeat advertised in the open packet, in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    pub ping_interval: u64,
    pub ping_timeout: u64,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            ping_interval: 25000,
            ping_timeout: 20000,
        }
    }
}

#[derive(Debug, Clone)]
enum Push {
    Frame(String),
    Close,
}

struct Shared {
    behavior: MockBehavior,
    heartbeat: Heartbeat,
    received: Mutex<Vec<String>>,
    auth: Mutex<Option<Value>>,
    connections: AtomicUsize,
    push: broadcast::Sender<Push>,
}

pub struct SocketIoMock {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl SocketIoMock {
    pub async fn start(behavior: MockBehavior) -> Self {
        Self::start_with_heartbeat(behavior, Heartbeat::default()).await
    }

    /// Mock that advertises `heartbeat` and never pings, so clients time out
    /// after `ping_interval + ping_timeout`.
    pub async fn start_with_heartbeat(behavior: MockBehavior, heartbeat: Heartbeat) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock listener");
        let addr = listener.local_addr().expect("Mock listener has no address");
        let (push, _) = broadcast::channel(64);

        let shared = Arc::new(Shared {
            behavior,
            heartbeat,
            received: Mutex::new(Vec::new()),
            auth: Mutex::new(None),
            connections: AtomicUsize::new(0),
            push,
        });

        let accept_shared = shared.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let shared = accept_shared.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, shared).await;
                });
            }
        });

        Self { addr, shared }
    }

    pub fn ws_url(&self) -> Url {
        Url::parse(&format!(
            "ws://{}/socket.io/?EIO=4&transport=websocket",
            self.addr
        ))
        .expect("Invalid mock URL")
    }

    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Every text frame received from clients, in arrival order.
    pub fn received(&self) -> Vec<String> {
        self.shared.received.lock().clone()
    }

    /// Auth payload of the last namespace CONNECT.
    pub fn auth(&self) -> Option<Value> {
        self.shared.auth.lock().clone()
    }

    /// Send a raw Engine.IO frame to every connected client.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.shared.push.send(Push::Frame(frame.into()));
    }

    /// Close every client WebSocket without any Socket.IO packet.
    pub fn close_socket(&self) {
        let _ = self.shared.push.send(Push::Close);
    }

    pub fn emit(&self, name: &str, args: Vec<Value>) {
        self.push(SocketPacket::event(NAMESPACE, name, args).to_frame());
    }

    pub fn close_namespace(&self) {
        self.push(SocketPacket::disconnect(NAMESPACE).to_frame());
    }

    /// End the Engine.IO session with a close packet.
    pub fn close_session(&self) {
        self.push("1");
    }

    /// Wait until a received frame equals `frame`.
    pub async fn wait_for_frame(&self, frame: &str) -> bool {
        for _ in 0..200 {
            if self.shared.received.lock().iter().any(|f| f == frame) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

async fn handle_connection(
    stream: TcpStream,
    shared: Arc<Shared>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();
    let mut push_rx = shared.push.subscribe();

    let id = shared.connections.fetch_add(1, Ordering::SeqCst) + 1;
    let open = json!({
        "sid": format!("mock-sid-{id}"),
        "upgrades": [],
        "pingInterval": shared.heartbeat.ping_interval,
        "pingTimeout": shared.heartbeat.ping_timeout,
        "maxPayload": 1000000
    });
    write.send(Message::Text(format!("0{open}").into())).await?;

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let text = text.as_str().to_string();
                    shared.received.lock().push(text.clone());

                    let Some(payload) = text.strip_prefix('4') else {
                        continue;
                    };
                    let Ok(packet) = SocketPacket::decode(payload) else {
                        continue;
                    };
                    if packet.kind == SocketPacketKind::Connect {
                        *shared.auth.lock() = packet.data.clone();
                        match &shared.behavior {
                            MockBehavior::Accept => {
                                let reply = format!(r#"40{NAMESPACE},{{"sid":"ns-sid-{id}"}}"#);
                                write.send(Message::Text(reply.into())).await?;
                            }
                            MockBehavior::Reject(reason) => {
                                let reply = format!("44{NAMESPACE},{}", json!({ "message": reason }));
                                write.send(Message::Text(reply.into())).await?;
                            }
                            MockBehavior::Silent => {}
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            pushed = push_rx.recv() => match pushed {
                Ok(Push::Frame(frame)) => write.send(Message::Text(frame.into())).await?,
                Ok(Push::Close) => {
                    write.send(Message::Close(None)).await?;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}
