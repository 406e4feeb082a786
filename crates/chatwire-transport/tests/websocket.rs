//! Integration tests for the WebSocket client transport.
//!
//! These tests spin up a real WebSocket server with `tokio-tungstenite`
//! and point a [`WebSocketTransport`] at it, so frames actually cross a
//! TCP socket.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use chatwire_transport::{
        ConnectionId, Inbox, InboxReceiver, Transport, TransportEvent, WebSocketTransport,
    };
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;

    type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Binds a listener on a random port and returns it with its `ws://` URL.
    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("should have local addr");
        (listener, format!("ws://{addr}/"))
    }

    async fn accept(listener: &TcpListener) -> ServerWs {
        let (stream, _) = listener.accept().await.expect("should accept");
        tokio_tungstenite::accept_async(stream)
            .await
            .expect("server handshake should succeed")
    }

    async fn next_event(rx: &mut InboxReceiver) -> TransportEvent {
        let (_, event) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event should arrive in time")
            .expect("inbox should stay open");
        event
    }

    #[tokio::test]
    async fn test_websocket_open_send_and_receive() {
        let (listener, url) = listen().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = WebSocketTransport::new();

        assert!(!transport.is_open());
        transport
            .connect(&url, Inbox::new(ConnectionId::new(1), tx))
            .expect("connect should start");

        let mut server = accept(&listener).await;
        assert_eq!(next_event(&mut rx).await, TransportEvent::Open);
        assert!(transport.is_open());

        // --- Client sends, server receives ---
        transport.send("PING{\"id\":1}").expect("send should succeed");
        let msg = server.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "PING{\"id\":1}");

        // --- Server sends, client receives ---
        server
            .send(Message::Text("PONG{}".into()))
            .await
            .unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            TransportEvent::Message("PONG{}".into())
        );
    }

    #[tokio::test]
    async fn test_websocket_server_close_posts_closed() {
        let (listener, url) = listen().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = WebSocketTransport::new();
        transport
            .connect(&url, Inbox::new(ConnectionId::new(2), tx))
            .unwrap();

        let mut server = accept(&listener).await;
        assert_eq!(next_event(&mut rx).await, TransportEvent::Open);

        server.send(Message::Close(None)).await.unwrap();

        assert_eq!(next_event(&mut rx).await, TransportEvent::Closed);
        assert!(!transport.is_open());
        assert!(transport.send("PING{}").is_err());
    }

    #[tokio::test]
    async fn test_websocket_connect_refused_posts_error() {
        // Bind then drop, so nothing is listening on the port.
        let (listener, url) = listen().await;
        drop(listener);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = WebSocketTransport::new();
        transport
            .connect(&url, Inbox::new(ConnectionId::new(3), tx))
            .unwrap();

        assert!(matches!(next_event(&mut rx).await, TransportEvent::Error(_)));
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_websocket_disconnect_closes_server_side() {
        let (listener, url) = listen().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = WebSocketTransport::new();
        transport
            .connect(&url, Inbox::new(ConnectionId::new(4), tx))
            .unwrap();

        let mut server = accept(&listener).await;
        assert_eq!(next_event(&mut rx).await, TransportEvent::Open);

        transport.disconnect();
        assert!(!transport.is_open());

        // The server sees a close frame (or the stream ending).
        let seen = tokio::time::timeout(Duration::from_secs(5), server.next())
            .await
            .expect("server should observe the close");
        assert!(matches!(seen, Some(Ok(Message::Close(_))) | None | Some(Err(_))));
    }
}
