use futures_util::{SinkExt, StreamExt};
use opcon_client::channel::{ChannelEvent, ChannelHandle};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

async fn bind_local() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    let url = Url::parse(&format!("ws://{addr}/api/console?token=none")).expect("test url");
    (listener, url)
}

#[tokio::test]
async fn delivers_messages_in_order_then_exactly_one_close() {
    let (listener, url) = bind_local().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("handshake");
        ws.send(Message::Text("alpha".to_string()))
            .await
            .expect("send alpha");
        ws.send(Message::Text("beta".to_string()))
            .await
            .expect("send beta");
        ws.close(None).await.expect("server close");
    });

    let (handle, mut events) = ChannelHandle::open(url);
    assert_eq!(events.recv().await, Some(ChannelEvent::Opened));
    assert_eq!(
        events.recv().await,
        Some(ChannelEvent::Message("alpha".to_string()))
    );
    assert_eq!(
        events.recv().await,
        Some(ChannelEvent::Message("beta".to_string()))
    );
    assert_eq!(events.recv().await, Some(ChannelEvent::Closed));
    // The connection task has ended; no second close can arrive.
    assert_eq!(events.recv().await, None);

    handle.close();
    server.await.expect("server task");
}

#[tokio::test]
async fn failed_handshake_reports_close_without_open() {
    let (listener, url) = bind_local().await;
    drop(listener);

    let (handle, mut events) = ChannelHandle::open(url);
    assert_eq!(events.recv().await, Some(ChannelEvent::Closed));
    assert_eq!(events.recv().await, None);
    handle.close();
}

#[tokio::test]
async fn close_is_idempotent_and_terminates_the_stream() {
    let (listener, url) = bind_local().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("handshake");
        // Read until the client goes away.
        while let Some(frame) = ws.next().await {
            if frame.is_err() {
                break;
            }
        }
    });

    let (handle, mut events) = ChannelHandle::open(url);
    assert_eq!(events.recv().await, Some(ChannelEvent::Opened));

    handle.close();
    handle.close();

    assert_eq!(events.recv().await, Some(ChannelEvent::Closed));
    assert_eq!(events.recv().await, None);
    server.await.expect("server task");
}
