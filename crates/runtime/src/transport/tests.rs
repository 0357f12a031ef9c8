use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::Message;

use super::*;
use crate::config::TransportConfig;

async fn next_event(
	rx: &mut mpsc::UnboundedReceiver<(SessionGeneration, TransportEvent)>,
) -> (SessionGeneration, TransportEvent) {
	tokio::time::timeout(Duration::from_secs(5), rx.recv())
		.await
		.expect("timed out waiting for transport event")
		.expect("event channel closed")
}

fn local_url(addr: std::net::SocketAddr) -> Url {
	Url::parse(&format!("ws://{addr}/websocket")).unwrap()
}

#[tokio::test]
async fn test_round_trip_and_server_close() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	let server = tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let mut ws = accept_async(stream).await.unwrap();
		let frame = ws.next().await.unwrap().unwrap();
		assert_eq!(frame, Message::Text(r#"{"msg":"connect"}"#.to_string()));
		ws.send(Message::Text(r#"{"msg":"connected"}"#.to_string()))
			.await
			.unwrap();
		ws.close(None).await.unwrap();
	});

	let transport = WebSocketTransport::default();
	let (events, mut rx) = TransportEvents::channel(1);
	assert_eq!(transport.send_text("early"), 0, "not writable before connect");

	transport.open(&local_url(addr), events);
	assert_eq!(next_event(&mut rx).await, (1, TransportEvent::Connected));
	assert!(transport.is_valid());

	let frame = r#"{"msg":"connect"}"#;
	assert_eq!(transport.send_text(frame), frame.len());

	assert_eq!(
		next_event(&mut rx).await,
		(1, TransportEvent::TextReceived(r#"{"msg":"connected"}"#.to_string()))
	);
	let (generation, event) = next_event(&mut rx).await;
	assert_eq!(generation, 1);
	assert!(matches!(event, TransportEvent::Disconnected { .. }));
	assert!(!transport.is_valid());

	server.await.unwrap();
}

#[tokio::test]
async fn test_client_close_ends_session() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	let server = tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let mut ws = accept_async(stream).await.unwrap();
		while let Some(Ok(message)) = ws.next().await {
			if message.is_close() {
				break;
			}
		}
	});

	let transport = WebSocketTransport::default();
	let (events, mut rx) = TransportEvents::channel(7);
	transport.open(&local_url(addr), events);
	assert_eq!(next_event(&mut rx).await, (7, TransportEvent::Connected));

	transport.flush();
	transport.close();
	assert!(!transport.is_valid());
	assert_eq!(transport.send_text("late"), 0);

	let (_, event) = next_event(&mut rx).await;
	assert_eq!(
		event,
		TransportEvent::Disconnected {
			reason: Some("closed by client".to_string())
		}
	);

	server.await.unwrap();
}

#[tokio::test]
async fn test_connect_failure_reports_error_then_disconnect() {
	// Bind then drop to get a port nobody listens on.
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let transport = WebSocketTransport::new(
		TransportConfig::default().with_connect_timeout(Duration::from_secs(2)),
	);
	let (events, mut rx) = TransportEvents::channel(3);
	transport.open(&local_url(addr), events);

	let (_, first) = next_event(&mut rx).await;
	assert!(matches!(first, TransportEvent::Error(_)));
	let (_, second) = next_event(&mut rx).await;
	assert!(matches!(second, TransportEvent::Disconnected { .. }));
	assert!(!transport.is_valid());
}

#[test]
fn test_open_without_runtime_reports_disconnect() {
	let transport = WebSocketTransport::default();
	let (events, mut rx) = TransportEvents::channel(1);
	transport.open(&Url::parse("ws://127.0.0.1:1/websocket").unwrap(), events);

	let (_, first) = rx.try_recv().unwrap();
	assert!(matches!(first, TransportEvent::Error(_)));
	let (_, second) = rx.try_recv().unwrap();
	assert!(matches!(second, TransportEvent::Disconnected { .. }));
}

#[test]
fn test_events_sink_stamps_generation() {
	let (events, mut rx) = TransportEvents::channel(42);
	assert!(events.text("hello"));
	assert_eq!(
		rx.try_recv().unwrap(),
		(42, TransportEvent::TextReceived("hello".into()))
	);
	drop(rx);
	assert!(!events.connected());
}
