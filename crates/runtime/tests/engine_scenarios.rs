//! End-to-end engine scenarios: a real WebSocket server on localhost, and
//! longer lifecycles driven through the recording transport.

use std::sync::Arc;
use std::time::Duration;

use ddp_runtime::testing::{RecordingQueueProcessor, RecordingTransport};
use ddp_runtime::{
	BackoffQueueProcessor, Engine, EngineEvent, LoginStatus, MemorySession, MessageKind,
	NoopQueueProcessor, RetryPolicy, SessionProvider,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::Message;

async fn wait_for_event(rx: &mut broadcast::Receiver<EngineEvent>, wanted: EngineEvent) {
	timeout(Duration::from_secs(5), async {
		loop {
			match rx.recv().await {
				Ok(event) if event == wanted => return,
				Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
				Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
			}
		}
	})
	.await
	.unwrap_or_else(|_| panic!("timed out waiting for {wanted:?}"));
}

async fn wait_until(mut done: impl FnMut() -> bool) {
	for _ in 0..500 {
		if done() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	panic!("condition not reached");
}

/// Minimal DDP server: answers the handshake, accepts any password login,
/// pings once after login, and answers every other method with `["ok"]`.
/// Returns the frames it received.
async fn serve_one(listener: TcpListener) -> Vec<Value> {
	let (stream, _) = listener.accept().await.unwrap();
	let mut ws = accept_async(stream).await.unwrap();
	let mut received = Vec::new();

	while let Some(Ok(frame)) = ws.next().await {
		let text = match frame {
			Message::Text(text) => text,
			Message::Close(_) => break,
			_ => continue,
		};
		let message: Value = serde_json::from_str(&text).unwrap();
		let replies = match message["msg"].as_str() {
			Some("connect") => vec![json!({"msg": "connected", "session": "abc"})],
			Some("method") if message["method"] == "login" => vec![
				json!({"msg": "result", "id": message["id"], "result": {"id": "u1", "token": "tok-1"}}),
				json!({"msg": "ping", "id": "k1"}),
			],
			Some("method") => vec![json!({"msg": "result", "id": message["id"], "result": ["ok"]})],
			_ => vec![],
		};
		received.push(message);
		for reply in replies {
			ws.send(Message::Text(reply.to_string())).await.unwrap();
		}
	}
	received
}

#[tokio::test]
async fn websocket_session_logs_in_and_correlates_calls() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let server = tokio::spawn(serve_one(listener));

	let session = Arc::new(MemorySession::new(format!("http://{addr}")).with_password("alice", "pw"));
	let engine = Engine::builder(session.clone())
		.queue_processor(Arc::new(NoopQueueProcessor))
		.build();
	let mut events = engine.events();
	let runner = {
		let engine = engine.clone();
		tokio::spawn(async move { engine.run().await })
	};

	engine.start().unwrap();
	assert_eq!(
		engine.endpoint().unwrap().as_str(),
		format!("ws://{addr}/websocket")
	);
	wait_for_event(&mut events, EngineEvent::LoginStatusChanged(LoginStatus::LoggedIn)).await;
	assert!(engine.is_connected());
	assert_eq!(session.auth_token(), "tok-1");

	let (_, pending) = engine.call_typed::<Vec<String>>("getPermissions", vec![], MessageKind::Volatile);
	let permissions = timeout(Duration::from_secs(5), pending).await.unwrap().unwrap();
	assert_eq!(permissions, vec!["ok".to_string()]);

	engine.shutdown();
	runner.await.unwrap();

	let received = timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
	assert_eq!(received.len(), 4);
	assert_eq!(received[0], json!({"msg": "connect", "version": "1", "support": ["1"]}));
	assert_eq!(received[1]["method"], "login");
	// The pong and the call race; both must arrive exactly once.
	assert!(received[2..].contains(&json!({"msg": "pong", "id": "k1"})));
	assert!(received[2..].iter().any(|m| m["method"] == "getPermissions"));
}

#[tokio::test]
async fn shutdown_during_connect_closes_the_socket() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	let session = Arc::new(MemorySession::new(format!("ws://{addr}")));
	let engine = Engine::builder(session)
		.queue_processor(Arc::new(NoopQueueProcessor))
		.build();
	engine.start().unwrap();
	engine.shutdown();

	let (stream, _) = timeout(Duration::from_secs(5), listener.accept())
		.await
		.unwrap()
		.unwrap();
	let mut ws = accept_async(stream).await.unwrap();
	let next = timeout(Duration::from_secs(2), ws.next()).await;
	assert!(
		matches!(next, Ok(None | Some(Ok(Message::Close(_))) | Some(Err(_)))),
		"client left the socket open: {next:?}"
	);
}

#[tokio::test]
async fn backoff_processor_drains_queue_once_writes_succeed() {
	let session = Arc::new(MemorySession::new("chat.example.com").with_password("alice", "pw"));
	let transport = Arc::new(RecordingTransport::new());
	let engine = Engine::builder(session)
		.transport(transport.clone())
		.queue_processor(Arc::new(BackoffQueueProcessor::new(RetryPolicy::new(5, 20))))
		.build();

	engine.start().unwrap();
	transport.connect();
	engine.pump();

	transport.refuse_writes(true);
	let (id, pending) = engine.call_typed::<Value>(
		"sendMessage",
		vec![json!({"rid": "GENERAL", "msg": "hello"})],
		MessageKind::Persistent,
	);
	assert_eq!(engine.queued_calls().len(), 1);

	tokio::time::sleep(Duration::from_millis(15)).await;
	transport.refuse_writes(false);
	wait_until(|| engine.queued_calls().is_empty()).await;

	assert_eq!(transport.last_call_id("sendMessage"), Some(id));
	transport.receive_json(json!({"msg": "result", "id": id.to_string(), "result": {"_id": "m1"}}));
	engine.pump();
	assert_eq!(pending.await.unwrap(), json!({"_id": "m1"}));
}

#[test]
fn login_cycle_survives_rejection_and_reconnect() {
	let session = Arc::new(MemorySession::new("https://chat.example.com").with_password("alice", "wrong"));
	let transport = Arc::new(RecordingTransport::new());
	let processor = Arc::new(RecordingQueueProcessor::new());
	let engine = Engine::builder(session.clone())
		.transport(transport.clone())
		.queue_processor(processor.clone())
		.build();

	engine.start().unwrap();
	transport.connect();
	transport.receive_json(json!({"msg": "connected"}));
	engine.pump();
	let first = transport.last_call_id("login").unwrap();
	transport.receive_json(json!({"msg": "result", "id": first.to_string(), "error": {"error": 403}}));
	engine.pump();
	assert_eq!(engine.login_status(), LoginStatus::LoginFailed);

	session.set_password("right");
	engine.login();
	let second = transport.last_call_id("login").unwrap();
	assert!(second > first);
	transport.receive_json(json!({"msg": "result", "id": second.to_string(), "result": {"token": "t1"}}));
	engine.pump();
	assert_eq!(engine.login_status(), LoginStatus::LoggedIn);

	transport.drop_connection(Some("server restart"));
	engine.pump();
	assert_eq!(engine.login_status(), LoginStatus::NotConnected);

	assert!(engine.server_url_changed().unwrap());
	transport.connect();
	transport.receive_json(json!({"msg": "connected"}));
	engine.pump();
	assert_eq!(engine.login_status(), LoginStatus::LoggingIn);

	let logins = transport.sent_calls("login");
	assert_eq!(logins.len(), 3, "a new session starts a fresh login cycle");
	assert_eq!(logins[2]["params"][0]["password"], "right");
	assert_eq!(transport.sent_of_kind("connect").len(), 2);
	assert_eq!(processor.signals(), 0);
}

#[test]
fn bare_host_defaults_to_secure_websocket() {
	let session = Arc::new(MemorySession::new("chat.example.com/"));
	let transport = Arc::new(RecordingTransport::new());
	let engine = Engine::builder(session)
		.transport(transport.clone())
		.build();

	engine.start().unwrap();
	assert_eq!(
		transport.opened()[0].as_str(),
		"wss://chat.example.com/websocket"
	);
	assert_eq!(engine.server_url(), "chat.example.com/");
}
