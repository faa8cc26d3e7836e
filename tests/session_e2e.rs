//! End-to-end session flow: wiremock for HTTP, in-process Socket.IO server for the channel.

mod mock_service;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use listendoctor_client::{
    ChannelError, ClientConfig, ClientError, ClientSession, ConnectionState, HttpTransport,
    MissingCredential, SessionPhase, SocketIoChannel, observer,
};
use mock_service::{MockBehavior, SocketIoMock, capture_observer, next_message};

fn session_for(http: &MockServer, channel: &SocketIoMock) -> ClientSession {
    session_with_timeout(http, channel, Duration::from_secs(2))
}

fn session_with_timeout(
    http: &MockServer,
    channel: &SocketIoMock,
    handshake_timeout: Duration,
) -> ClientSession {
    let config = ClientConfig::with_base_url(format!("{}/v1", http.uri()));
    let transport = Arc::new(HttpTransport::new(&config).unwrap());
    let channel = Arc::new(SocketIoChannel::with_endpoint(
        channel.ws_url(),
        "/v1",
        handshake_timeout,
    ));
    ClientSession::with_components(config, transport, channel)
}

async fn mount_iam(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/iam"))
        .and(header("x-api-key", "key123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok1"})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_session_flow() {
    let http = MockServer::start().await;
    let channel = SocketIoMock::start(MockBehavior::Accept).await;
    mount_iam(&http).await;
    Mock::given(method("POST"))
        .and(path("/v1/process/audio"))
        .and(header("x-api-key", "key123"))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"summary": "ok"})))
        .expect(1)
        .mount(&http)
        .await;

    let session = session_for(&http, &channel);
    let (callback, mut rx) = capture_observer();
    session.add_observer(callback);

    session.initialize("key123");
    session.authenticate("cid", "csecret", "doc1").await.unwrap();
    assert_eq!(session.phase().await, SessionPhase::Authenticated);

    session.connect_channel().await.unwrap();
    assert_eq!(next_message(&mut rx).await, "Socket connected");
    assert_eq!(session.channel_state().await, ConnectionState::Connected);
    assert_eq!(
        channel.auth(),
        Some(json!({"token": "tok1", "x-api-key": "key123"}))
    );

    session.join_room("roomA").await.unwrap();
    let join_frame = r#"42/v1,["join","roomA"]"#;
    assert!(channel.wait_for_frame(join_frame).await);

    let request = session
        .processing_request(vec![0u8; 10], "audio_record.wav")
        .with_prompt("default-prompt")
        .with_language("ES")
        .with_speciality(10)
        .with_category("V");
    let result = session.submit_audio(request).await.unwrap();
    assert_eq!(result.summary, "ok");
    assert!(result.transcription.is_none());

    channel.emit("transcription_progress", vec![json!("done")]);
    assert_eq!(next_message(&mut rx).await, "Transcription progress: done");

    let joins = channel
        .received()
        .into_iter()
        .filter(|frame| frame == join_frame)
        .count();
    assert_eq!(joins, 1);

    session.disconnect().await.unwrap();
    assert_eq!(next_message(&mut rx).await, "Socket disconnected");
    assert_eq!(session.observer_count(), 0);
    session.disconnect().await.unwrap();
    assert_eq!(session.observer_count(), 0);
    assert_eq!(session.channel_state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connect_before_authenticate_is_precondition() {
    let http = MockServer::start().await;
    let channel = SocketIoMock::start(MockBehavior::Accept).await;
    let session = session_for(&http, &channel);
    session.initialize("key123");

    let err = session.connect_channel().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Precondition(MissingCredential::BearerToken)
    ));
    assert_eq!(channel.connections(), 0);
}

#[tokio::test]
async fn test_submit_before_authenticate_makes_no_request() {
    let http = MockServer::start().await;
    let channel = SocketIoMock::start(MockBehavior::Accept).await;
    Mock::given(method("POST"))
        .and(path("/v1/process/audio"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"summary": "ok"})))
        .expect(0)
        .mount(&http)
        .await;

    let session = session_for(&http, &channel);
    session.initialize("key123");

    let err = session
        .submit_audio(session.processing_request(vec![0u8; 10], "audio_record.wav"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Precondition(MissingCredential::BearerToken)
    ));
}

#[tokio::test]
async fn test_unauthorized_keeps_session_unauthenticated() {
    let http = MockServer::start().await;
    let channel = SocketIoMock::start(MockBehavior::Accept).await;
    Mock::given(method("POST"))
        .and(path("/v1/iam"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&http)
        .await;

    let session = session_for(&http, &channel);
    session.initialize("key123");

    let err = session.authenticate("cid", "wrong", "doc1").await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(_)));
    assert!(!session.has_token());
    assert_eq!(session.phase().await, SessionPhase::Configured);
}

#[tokio::test]
async fn test_rejected_channel_can_be_retried() {
    let http = MockServer::start().await;
    let rejecting = SocketIoMock::start(MockBehavior::Reject("expired".to_string())).await;
    mount_iam(&http).await;

    let session = session_for(&http, &rejecting);
    session.initialize("key123");
    session.authenticate("cid", "csecret", "doc1").await.unwrap();

    let err = session.connect_channel().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Channel(ChannelError::Rejected(_))
    ));
    assert!(err.is_retryable());
    assert_eq!(session.channel_state().await, ConnectionState::Disconnected);

    let err = session.join_room("roomA").await.unwrap_err();
    assert!(matches!(err, ClientError::Channel(ChannelError::NotConnected)));
}

#[tokio::test]
async fn test_reconnect_after_server_drop() {
    let http = MockServer::start().await;
    let channel = SocketIoMock::start(MockBehavior::Accept).await;
    mount_iam(&http).await;

    let session = session_for(&http, &channel);
    let (callback, mut rx) = capture_observer();
    session.add_observer(callback);

    session.initialize("key123");
    session.authenticate("cid", "csecret", "doc1").await.unwrap();
    session.connect_channel().await.unwrap();
    assert_eq!(next_message(&mut rx).await, "Socket connected");

    channel.close_namespace();
    assert_eq!(next_message(&mut rx).await, "Socket disconnected");
    assert_eq!(session.phase().await, SessionPhase::Authenticated);

    session.connect_channel().await.unwrap();
    assert_eq!(next_message(&mut rx).await, "Socket connected");
    assert_eq!(channel.connections(), 2);
    assert_eq!(session.phase().await, SessionPhase::ChannelConnected);

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_observer_joins_room_when_connected() {
    let http = MockServer::start().await;
    let channel = SocketIoMock::start(MockBehavior::Accept).await;
    mount_iam(&http).await;

    let session = Arc::new(session_for(&http, &channel));
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let weak = Arc::downgrade(&session);
    session.add_observer(observer(move |message| {
        let weak = weak.clone();
        let seen_tx = seen_tx.clone();
        async move {
            if message == "Socket connected"
                && let Some(session) = weak.upgrade()
            {
                let joined = session.join_room("roomA").await.is_ok();
                let _ = seen_tx.send((joined, session.phase().await));
            }
        }
    }));

    session.initialize("key123");
    session.authenticate("cid", "csecret", "doc1").await.unwrap();
    tokio::time::timeout(Duration::from_secs(3), session.connect_channel())
        .await
        .expect("connect_channel did not return")
        .unwrap();

    let (joined, phase) = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(joined);
    assert_eq!(phase, SessionPhase::ChannelConnected);
    assert!(channel.wait_for_frame(r#"42/v1,["join","roomA"]"#).await);

    tokio::time::timeout(Duration::from_secs(3), session.disconnect())
        .await
        .expect("disconnect did not return")
        .unwrap();
}

#[tokio::test]
async fn test_observer_can_disconnect_session() {
    let http = MockServer::start().await;
    let channel = SocketIoMock::start(MockBehavior::Accept).await;
    mount_iam(&http).await;

    let session = Arc::new(session_for(&http, &channel));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let weak = Arc::downgrade(&session);
    session.add_observer(observer(move |message| {
        let weak = weak.clone();
        let done_tx = done_tx.clone();
        async move {
            if message.starts_with("Summary progress")
                && let Some(session) = weak.upgrade()
            {
                let started = Instant::now();
                let result = session.disconnect().await;
                let _ = done_tx.send((result.is_ok(), started.elapsed()));
            }
        }
    }));

    session.initialize("key123");
    session.authenticate("cid", "csecret", "doc1").await.unwrap();
    session.connect_channel().await.unwrap();

    channel.emit("summary_progress", vec![json!("done")]);
    let (ok, elapsed) = tokio::time::timeout(Duration::from_secs(3), done_rx.recv())
        .await
        .unwrap()
        .unwrap();

    assert!(ok);
    assert!(elapsed < Duration::from_secs(1), "disconnect took {elapsed:?}");
    assert!(channel.wait_for_frame("41/v1,").await);
    assert_eq!(session.channel_state().await, ConnectionState::Disconnected);
    assert_eq!(session.observer_count(), 0);
}

#[tokio::test]
async fn test_channel_state_connecting_during_handshake() {
    let http = MockServer::start().await;
    let silent = SocketIoMock::start(MockBehavior::Silent).await;
    mount_iam(&http).await;

    let session = session_with_timeout(&http, &silent, Duration::from_millis(400));
    session.initialize("key123");
    session.authenticate("cid", "csecret", "doc1").await.unwrap();

    let (connected, during) = tokio::join!(session.connect_channel(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        (session.channel_state().await, session.phase().await)
    });

    assert_eq!(during, (ConnectionState::Connecting, SessionPhase::Authenticated));
    assert!(matches!(
        connected,
        Err(ClientError::Channel(ChannelError::Timeout(_)))
    ));
    assert_eq!(session.channel_state().await, ConnectionState::Disconnected);
}
