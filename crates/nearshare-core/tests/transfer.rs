//! End-to-end transfer scenarios over real TCP connections.

mod common;

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use tokio::io::AsyncReadExt;

use nearshare_core::adapter::{IntroducedText, Introduction};
use nearshare_core::random::StaticRandom;
use nearshare_core::{
    ClientBuilder, DeviceType, Error, FileMeta, FileType, OutgoingFile, ServerInstance, TextMeta,
    TextType,
};

fn client(seed: u64) -> nearshare_core::Client {
    ClientBuilder::new()
        .with_device_type(DeviceType::Laptop)
        .with_random(Arc::new(StaticRandom::new(seed)))
        .build("test")
        .expect("build client")
}

#[tokio::test]
async fn text_transfer_reaches_callbacks() {
    let mut ts = common::start_server(true).await;
    let instance = ServerInstance::new(ts.addr, "text_test");

    client(2)
        .send_text(&instance, "Hello World!", TextType::Text)
        .await
        .expect("send text");

    let (text, files, pin) = ts.auth_rx.recv().await.expect("auth callback");
    assert_eq!(
        text,
        Some(TextMeta {
            kind: TextType::Text,
            title: "Hello World!".into(),
            size: 12,
        })
    );
    assert!(files.is_empty());
    assert_ne!(pin, 0);

    let payload = ts.text_rx.recv().await.expect("text callback");
    assert_eq!(payload.text, "Hello World!");
    assert_eq!(payload.meta.size, 12);
    assert_eq!(payload.meta.kind, TextType::Text);

    ts.server.stop().await.expect("stop server");
}

#[tokio::test]
async fn long_text_title_is_truncated() {
    let mut ts = common::start_server(true).await;
    let instance = ServerInstance::new(ts.addr, "text_test");

    client(3)
        .send_text(&instance, "Hello World! And then some", TextType::Text)
        .await
        .expect("send text");

    let (text, _, _) = ts.auth_rx.recv().await.expect("auth callback");
    assert_eq!(text.expect("text meta").title, "Hello Wor...");

    let payload = ts.text_rx.recv().await.expect("text callback");
    assert_eq!(payload.text, "Hello World! And then some");

    ts.server.stop().await.expect("stop server");
}

#[tokio::test]
async fn single_file_transfer_delivers_exact_bytes() {
    let mut ts = common::start_server(true).await;
    let instance = ServerInstance::new(ts.addr, "text_test");

    let outgoing = OutgoingFile {
        meta: FileMeta {
            kind: FileType::Image,
            name: "image.jpg".into(),
            mime_type: "image/jpg".into(),
            size: 12,
        },
        content: Box::new(Cursor::new(b"Hello World!".to_vec())),
    };
    client(4)
        .send_files(&instance, vec![outgoing])
        .await
        .expect("send file");

    let (text, files, pin) = ts.auth_rx.recv().await.expect("auth callback");
    assert_eq!(text, None);
    assert_ne!(pin, 0);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "image.jpg");
    assert_eq!(files[0].mime_type, "image/jpg");
    assert_eq!(files[0].kind, FileType::Image);
    assert_eq!(files[0].size, 12);

    let mut payload = ts.file_rx.recv().await.expect("file callback");
    assert_eq!(payload.meta.name, "image.jpg");
    let mut content = Vec::new();
    payload
        .content
        .read_to_end(&mut content)
        .await
        .expect("drain file");
    assert_eq!(content, b"Hello World!");

    ts.server.stop().await.expect("stop server");
}

#[tokio::test]
async fn rejected_transfer_surfaces_as_conn_ended() {
    let mut ts = common::start_server(false).await;
    let instance = ServerInstance::new(ts.addr, "text_test");

    let err = client(5)
        .send_text(&instance, "Hello World!", TextType::Text)
        .await
        .expect_err("server must reject");
    assert!(matches!(err, Error::ConnEndedByPeer));

    let (_, _, pin) = ts.auth_rx.recv().await.expect("auth callback");
    assert_ne!(pin, 0);
    assert!(ts.text_rx.try_recv().is_err());

    ts.server.stop().await.expect("stop server");
}

#[tokio::test]
async fn empty_file_list_is_a_no_op() {
    let ts = common::start_server(true).await;
    let instance = ServerInstance::new(ts.addr, "text_test");

    client(6)
        .send_files(&instance, Vec::new())
        .await
        .expect("no-op send");
}

#[tokio::test]
async fn unknown_text_type_is_rejected_locally() {
    let ts = common::start_server(true).await;
    let instance = ServerInstance::new(ts.addr, "text_test");

    let err = client(7)
        .send_text(&instance, "Hello", TextType::Unknown)
        .await
        .expect_err("unknown text type");
    assert!(matches!(err, Error::InvalidTextType));
}

/// Batch transfer: one text and two files in a single introduction, driven
/// through the protocol adapter. The server must deliver all three payloads
/// and then disconnect on its own.
#[tokio::test]
async fn batch_transfer_completes_and_disconnects() {
    let mut ts = common::start_server(true).await;
    let mut adapter = common::connect_adapter(ts.addr, 8).await;
    common::setup_transfer(&mut adapter).await;

    let intro = Introduction {
        text: Some(IntroducedText {
            meta: TextMeta {
                kind: TextType::Text,
                title: "HelloWorl...".into(),
                size: 13,
            },
            payload_id: 3,
        }),
        files: HashMap::from([
            (
                1,
                FileMeta {
                    kind: FileType::Image,
                    name: "image.jpg".into(),
                    mime_type: "image/jpg".into(),
                    size: 12,
                },
            ),
            (
                2,
                FileMeta {
                    kind: FileType::Image,
                    name: "image2.jpg".into(),
                    mime_type: "image/jpg".into(),
                    size: 13,
                },
            ),
        ]),
    };
    adapter.send_introduction(&intro).await.expect("send introduction");
    adapter.send_transfer_request().await.expect("send transfer request");

    let msg = common::read_msg(&mut adapter).await;
    assert!(adapter
        .unmarshal_transfer_response(&msg)
        .expect("transfer response"));

    // Seed payload, then the actual transfers.
    adapter
        .send_data_in_chunks(99, b"random")
        .await
        .expect("send seed payload");
    adapter
        .send_data_in_chunks(3, b"Hello World3!")
        .await
        .expect("send text payload");

    let mut image = OutgoingFile {
        meta: intro.files[&1].clone(),
        content: Box::new(Cursor::new(b"Hello World!".to_vec())),
    };
    adapter
        .send_file_in_chunks(1, &mut image)
        .await
        .expect("send first file");

    let mut image2 = OutgoingFile {
        meta: intro.files[&2].clone(),
        content: Box::new(Cursor::new(b"Hello World!!".to_vec())),
    };
    adapter
        .send_file_in_chunks(2, &mut image2)
        .await
        .expect("send second file");

    let text = ts.text_rx.recv().await.expect("text callback");
    assert_eq!(text.text, "Hello World3!");

    let mut contents = HashMap::new();
    for _ in 0..2 {
        let mut payload = ts.file_rx.recv().await.expect("file callback");
        let mut content = Vec::new();
        payload
            .content
            .read_to_end(&mut content)
            .await
            .expect("drain file");
        contents.insert(payload.meta.name.clone(), content);
    }
    assert_eq!(contents["image.jpg"], b"Hello World!");
    assert_eq!(contents["image2.jpg"], b"Hello World!!");

    // All expected payloads arrived; the server hangs up.
    let msg = common::read_msg(&mut adapter).await;
    assert!(matches!(
        adapter.process_service_message(&msg).await,
        Err(Error::ConnEndedByPeer)
    ));

    ts.server.stop().await.expect("stop server");
}
