//! Chunked POST round trips against the live echo server.
//!
//! # Design
//! The server runs on its own runtime in a background thread. The client
//! gets a separate runtime that acts as its event loop, while the test
//! thread blocks on the recorder's latch until a full response has been
//! observed, then asserts on what was recorded.

mod common;

use chunking_core::{
    ChunkedClient, ChunkedStream, ClientConfig, ClientError, ClientMessage, CodecError,
    HttpObject, ResponseHandler, ResponseRecorder,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn event_loop() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap()
}

/// Collects every object in arrival order.
#[derive(Default)]
struct Collect(Vec<HttpObject>);

impl ResponseHandler for Collect {
    fn handle(&mut self, object: &HttpObject) {
        self.0.push(object.clone());
    }
}

#[test]
fn chunked_stream_is_echoed() {
    let addr = common::start_server();
    let client = ChunkedClient::new(&format!("http://{addr}")).unwrap();
    let recorder = ResponseRecorder::new();

    let event_loop = event_loop();
    let mut handler = recorder.clone();
    event_loop.spawn(async move {
        let _ = client
            .post_chunked("/foo/test", &b"hello"[..], &mut handler)
            .await;
    });

    recorder.latch().wait_blocking();
    event_loop.shutdown_background();

    assert_eq!(recorder.status(), 200, "exchange failed: {:?}", recorder.error());
    assert!(recorder.last_chunk_size() > 0, "Response body size should be > 0");
    assert_eq!(recorder.body_bytes(), 5);
}

#[test]
fn many_small_chunks_are_reassembled_by_the_server() {
    let addr = common::start_server();
    let config = ClientConfig {
        chunk_size: 7,
        ..ClientConfig::default()
    };
    let client = ChunkedClient::with_config(&format!("http://{addr}"), config).unwrap();
    let body: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    let expected = body.clone();

    let mut collected = Collect::default();
    event_loop().block_on(async {
        client
            .post_chunked("/foo/test", body.as_slice(), &mut collected)
            .await
            .unwrap();
    });

    let objects = collected.0;
    match objects.first() {
        Some(HttpObject::Response(head)) => assert_eq!(head.status, 200),
        other => panic!("expected response head first, got {other:?}"),
    }
    assert!(matches!(objects.last(), Some(HttpObject::LastContent(_))));
    let heads = objects
        .iter()
        .filter(|o| matches!(o, HttpObject::Response(_)))
        .count();
    assert_eq!(heads, 1);

    let echoed: Vec<u8> = objects
        .iter()
        .flat_map(|o| match o {
            HttpObject::Content(b) | HttpObject::LastContent(b) => b.to_vec(),
            HttpObject::Response(_) => Vec::new(),
        })
        .collect();
    assert_eq!(echoed, expected);
}

#[test]
fn keep_alive_connection_carries_two_exchanges() {
    let addr = common::start_server();
    let client = ChunkedClient::new(&format!("http://{addr}")).unwrap();

    event_loop().block_on(async {
        let mut connection = client.connect().await.unwrap();
        assert_eq!(connection.peer_addr().unwrap(), addr);
        for body in ["first", "a somewhat longer second body"] {
            let recorder = ResponseRecorder::new();
            let mut handler = recorder.clone();

            connection
                .write(ClientMessage::Head(client.build_chunked_post("/foo/test")))
                .unwrap();
            let sent = connection
                .write_stream(ChunkedStream::with_chunk_size(body.as_bytes(), 4))
                .await
                .unwrap();
            connection.write_and_flush(ClientMessage::Last).await.unwrap();
            connection.read_response(&mut handler).await.unwrap();

            assert_eq!(sent, body.len() as u64);
            assert_eq!(recorder.status(), 200);
            assert_eq!(recorder.body_bytes(), body.len() as u64);
            assert_eq!(recorder.latch().count(), 0);
        }
    });
}

#[test]
fn empty_body_round_trips() {
    let addr = common::start_server();
    let client = ChunkedClient::new(&format!("http://{addr}")).unwrap();
    let recorder = ResponseRecorder::new();
    let mut handler = recorder.clone();

    event_loop().block_on(async {
        client
            .post_chunked("/foo/test", std::io::empty(), &mut handler)
            .await
            .unwrap();
    });

    assert_eq!(recorder.status(), 200);
    assert_eq!(recorder.last_chunk_size(), 0);
    assert_eq!(recorder.body_bytes(), 0);
}

#[test]
fn refused_connection_releases_the_latch() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = ChunkedClient::new(&format!("http://{addr}")).unwrap();
    let recorder = ResponseRecorder::new();

    let event_loop = event_loop();
    let mut handler = recorder.clone();
    event_loop.spawn(async move {
        let result = client
            .post_chunked("/foo/test", &b"hello"[..], &mut handler)
            .await;
        assert!(matches!(result, Err(ClientError::Io(_))));
    });

    recorder.latch().wait_blocking();
    event_loop.shutdown_background();

    assert_eq!(recorder.status(), -1);
    assert_eq!(recorder.last_chunk_size(), -1);
    assert!(recorder.error().is_some());
}

#[test]
fn early_413_wins_over_failed_upload() {
    let addr = common::start_server_with(echo_server::ServerConfig {
        max_body_bytes: 16,
        ..echo_server::ServerConfig::default()
    });
    let config = ClientConfig {
        chunk_size: 1024,
        ..ClientConfig::default()
    };
    let client = ChunkedClient::with_config(&format!("http://{addr}"), config).unwrap();
    let body = vec![b'x'; 4 * 1024 * 1024];
    let recorder = ResponseRecorder::new();
    let mut handler = recorder.clone();

    let result = event_loop().block_on(async {
        client
            .post_chunked("/foo/test", body.as_slice(), &mut handler)
            .await
    });

    assert_eq!(recorder.status(), 413, "exchange failed: {:?}", recorder.error());
    assert_eq!(recorder.latch().count(), 0);
    assert!(result.is_ok(), "{result:?}");
}

#[test]
fn failing_body_reader_is_reported() {
    struct Broken;

    impl std::io::Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk gone"))
        }
    }

    let addr = common::start_server();
    let client = ChunkedClient::new(&format!("http://{addr}")).unwrap();
    let recorder = ResponseRecorder::new();
    let mut handler = recorder.clone();

    let result = event_loop().block_on(async {
        client.post_chunked("/foo/test", Broken, &mut handler).await
    });

    assert!(matches!(result, Err(ClientError::BodySource(_))));
    assert_eq!(recorder.status(), -1);
    assert!(recorder.error().is_some());
}

#[test]
fn truncated_response_is_reported() {
    let recorder = ResponseRecorder::new();
    let mut handler = recorder.clone();

    let result = event_loop().block_on(async {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 256];
            while !request.ends_with(b"0\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                assert_ne!(n, 0, "client closed before finishing the request");
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
            request
        });

        let client = ChunkedClient::new(&format!("http://{addr}")).unwrap();
        let result = client
            .post_chunked("/foo/test", &b"hello"[..], &mut handler)
            .await;

        let request = server.await.unwrap();
        let request = String::from_utf8(request).unwrap();
        assert!(request.starts_with("POST /foo/test HTTP/1.1\r\n"));
        assert!(request.contains("Transfer-Encoding: chunked\r\n"));
        assert!(request.ends_with("\r\n\r\n5\r\nhello\r\n0\r\n\r\n"));
        result
    });

    assert!(matches!(
        result,
        Err(ClientError::Codec(CodecError::UnexpectedEof))
    ));
    assert_eq!(recorder.status(), 200);
    assert_eq!(recorder.last_chunk_size(), 5);
    assert_eq!(recorder.latch().count(), 0);
    assert!(recorder.error().is_some());
}
