//! Shared wiring for the end-to-end tests: a server whose callbacks feed
//! channels, and an adapter-level client setup helper.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::mpsc;

use nearshare_core::adapter::{Adapter, Inbound};
use nearshare_core::payload::{DeviceType, FileMeta, FilePayload, TextMeta, TextPayload};
use nearshare_core::random::StaticRandom;
use nearshare_core::{Server, ServerBuilder};

pub type AuthEvent = (Option<TextMeta>, Vec<FileMeta>, u16);

pub struct TestServer {
    pub server: Server,
    pub addr: SocketAddr,
    pub auth_rx: mpsc::UnboundedReceiver<AuthEvent>,
    pub text_rx: mpsc::UnboundedReceiver<TextPayload>,
    pub file_rx: mpsc::UnboundedReceiver<FilePayload>,
}

pub async fn start_server(accept: bool) -> TestServer {
    let (auth_tx, auth_rx) = mpsc::unbounded_channel();
    let (text_tx, text_rx) = mpsc::unbounded_channel();
    let (file_tx, file_rx) = mpsc::unbounded_channel();

    let mut server = ServerBuilder::new()
        .with_hostname("text_test")
        .with_endpoint("test")
        .with_random(Arc::new(StaticRandom::new(1)))
        .build(
            Arc::new(move |text, files, pin| {
                let _ = auth_tx.send((text.cloned(), files.to_vec(), pin));
                accept
            }),
            Arc::new(move |payload| {
                let _ = text_tx.send(payload);
            }),
            Arc::new(move |payload| {
                let _ = file_tx.send(payload);
            }),
        )
        .expect("build server");

    server.listen().await.expect("start server");
    let addr: SocketAddr = ([127, 0, 0, 1], server.port()).into();

    TestServer {
        server,
        addr,
        auth_rx,
        text_rx,
        file_rx,
    }
}

pub async fn connect_adapter(addr: SocketAddr, seed: u64) -> Adapter<TcpStream> {
    let stream = TcpStream::connect(addr).await.expect("dial server");
    Adapter::new(stream, false, Arc::new(StaticRandom::new(seed)))
}

/// Pulls the next complete message, skipping reassembly sentinels.
pub async fn read_msg(adapter: &mut Adapter<TcpStream>) -> Vec<u8> {
    loop {
        match adapter.read_message().await.expect("read message") {
            Inbound::Message(msg) => return msg,
            Inbound::TransferInProgress => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

/// Drives the init and pairing phases from the client side, leaving the
/// adapter ready for sharing frames.
pub async fn setup_transfer(adapter: &mut Adapter<TcpStream>) {
    adapter
        .send_conn_request("test", "text_test", DeviceType::Laptop)
        .await
        .expect("send conn request");
    adapter
        .send_client_init_with_client_finished()
        .await
        .expect("send client init");

    let msg = read_msg(adapter).await;
    adapter.validate_server_init(&msg).expect("server init");

    adapter.send_conn_response(true).await.expect("send conn response");
    let msg = read_msg(adapter).await;
    assert!(adapter.unmarshal_conn_response(&msg).expect("conn response"));
    adapter.enable_encryption().expect("enable encryption");

    adapter
        .send_paired_key_encryption()
        .await
        .expect("send paired key encryption");
    let msg = read_msg(adapter).await;
    adapter
        .validate_paired_key_encryption(&msg)
        .expect("paired key encryption");

    adapter
        .send_paired_key_result()
        .await
        .expect("send paired key result");
    let msg = read_msg(adapter).await;
    adapter
        .validate_paired_key_result(&msg)
        .expect("paired key result");
}
