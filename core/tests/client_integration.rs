/*
 * client_integration.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for the Gemini client. A loopback server speaks the wire
 * protocol over plain TCP (PlainConnector); one ignored test performs a real
 * TLS exchange with geminiprotocol.net.
 *
 * Run with:
 *   cargo test -p gemello_core --test client_integration
 *   cargo test -p gemello_core --test client_integration -- --ignored --nocapture
 */

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gemello_core::net::PlainConnector;
use gemello_core::{Client, ClientConfig, Element, GeminiError, Request, Status, Timeouts};

/// Serve `connections` requests on a loopback port. Returns the port and a handle
/// yielding the request lines received, in order.
fn serve<F>(connections: usize, respond: F) -> (u16, JoinHandle<Vec<String>>)
where
    F: Fn(&str) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let mut requests = Vec::new();
        for _ in 0..connections {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let _ = stream.write_all(&respond(&line));
            requests.push(line);
        }
        requests
    });
    (port, handle)
}

fn plain_client(config: ClientConfig) -> Client {
    Client::builder()
        .config(config)
        .connector(Arc::new(PlainConnector))
        .build()
        .unwrap()
}

#[test]
fn fetch_and_parse_gemtext() {
    let (port, server) = serve(1, |_| {
        b"20 text/gemini; lang=en\r\n# Capsule\r\n\r\n=> /next Next page\r\n* one\r\n* two\r\n```ascii art\r\n# not a heading\r\n```\r\n"
            .to_vec()
    });
    let client = plain_client(ClientConfig::default());
    let mut response = client
        .fetch(&format!("gemini://127.0.0.1:{}/", port))
        .unwrap();
    assert_eq!(response.status(), Status::SUCCESS);
    let mime = response.mime_type().unwrap();
    assert!(mime.is_gemtext());
    assert_eq!(mime.lang(), Some("en"));

    let doc = response.read_document().unwrap();
    assert_eq!(doc.title(), Some("Capsule"));
    let links: Vec<_> = doc.links().collect();
    assert_eq!(links, vec![("/next", Some("Next page"))]);
    assert!(doc
        .iter()
        .any(|e| *e == Element::List(vec!["one".into(), "two".into()])));
    assert!(doc.iter().any(|e| *e
        == Element::Preformatted {
            alt: Some("ascii art".into()),
            lines: vec!["# not a heading".into()],
        }));

    let requests = server.join().unwrap();
    assert_eq!(requests, vec![format!("gemini://127.0.0.1:{}/\r\n", port)]);
}

#[test]
fn failure_status_has_no_body() {
    let (port, server) = serve(1, |_| b"51 Not found\r\n".to_vec());
    let client = plain_client(ClientConfig::default());
    let mut response = client
        .fetch(&format!("gemini://127.0.0.1:{}/missing", port))
        .unwrap();
    assert_eq!(response.status(), Status::NOT_FOUND);
    assert!(!response.has_body());
    assert!(response.mime_type().is_none());
    assert_eq!(response.read_to_string().unwrap(), "");
    let requests = server.join().unwrap();
    assert_eq!(
        requests,
        vec![format!("gemini://127.0.0.1:{}/missing/\r\n", port)]
    );
}

#[test]
fn input_prompt_then_answer() {
    let (port, server) = serve(2, |line| {
        if line.contains('?') {
            b"20 text/plain\r\nthanks".to_vec()
        } else {
            b"10 Your name?\r\n".to_vec()
        }
    });
    let client = plain_client(ClientConfig::default());
    let request = Request::new(&format!("gemini://127.0.0.1:{}/ask", port)).unwrap();
    let prompt = client.send(&request).unwrap();
    assert!(prompt.status().is_input());
    assert_eq!(prompt.meta(), "Your name?");
    drop(prompt);

    let answer = Request::with_input(&request, "Ada L").unwrap();
    let mut response = client.send(&answer).unwrap();
    assert_eq!(response.read_to_string().unwrap(), "thanks");
    let requests = server.join().unwrap();
    assert_eq!(requests[1], format!("gemini://127.0.0.1:{}/ask/?Ada%20L\r\n", port));
}

#[test]
fn redirects_are_followed() {
    let (port, server) = serve(2, |line| {
        if line.contains("/old") {
            b"31 /new.gmi\r\n".to_vec()
        } else {
            b"20 text/gemini\r\nmoved\r\n".to_vec()
        }
    });
    let client = plain_client(ClientConfig::default());
    let request = Request::new(&format!("gemini://127.0.0.1:{}/old", port)).unwrap();
    let (final_request, mut response) = client.send_following_redirects(&request).unwrap();
    assert_eq!(
        final_request.url(),
        format!("gemini://127.0.0.1:{}/new.gmi", port)
    );
    assert_eq!(response.read_to_string().unwrap(), "moved");
    assert_eq!(server.join().unwrap().len(), 2);
}

#[test]
fn redirect_loop_is_bounded() {
    let (port, server) = serve(3, |_| b"30 /again\r\n".to_vec());
    let config = ClientConfig {
        max_redirects: 2,
        ..ClientConfig::default()
    };
    let client = plain_client(config);
    let request = Request::new(&format!("gemini://127.0.0.1:{}/", port)).unwrap();
    let err = client.send_following_redirects(&request).unwrap_err();
    assert!(matches!(err, GeminiError::TooManyRedirects(2)), "{:?}", err);
    assert_eq!(server.join().unwrap().len(), 3);
}

#[test]
fn truncated_status_line_is_protocol_error() {
    let (port, server) = serve(1, |_| b"2".to_vec());
    let client = plain_client(ClientConfig::default());
    let err = client
        .fetch(&format!("gemini://127.0.0.1:{}/", port))
        .unwrap_err();
    assert!(matches!(err, GeminiError::Protocol(_)), "{:?}", err);
    server.join().unwrap();
}

#[test]
fn cancel_from_another_thread_fails_the_read() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut line = String::new();
        BufReader::new(stream.try_clone().unwrap())
            .read_line(&mut line)
            .unwrap();
        stream.write_all(b"20 text/plain\r\nfirst\n").unwrap();
        // Hold the connection open without sending more.
        thread::sleep(Duration::from_secs(1));
    });
    let client = plain_client(ClientConfig::default());
    let mut response = client
        .fetch(&format!("gemini://127.0.0.1:{}/slow", port))
        .unwrap();
    let handle = response.cancel_handle().unwrap();
    let mut lines = response.lines();
    assert_eq!(lines.next().unwrap().unwrap(), "first");
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        handle.cancel();
    });
    match lines.next() {
        Some(Err(GeminiError::Io(e))) => assert_eq!(e.kind(), std::io::ErrorKind::Interrupted),
        other => panic!("expected cancelled read, got {:?}", other),
    }
    assert!(lines.next().is_none());
    server.join().unwrap();
}

/// Loopback server that reads the request, sends `reply`, then stays silent for a while.
fn stall_after(reply: &'static [u8]) -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut line = String::new();
        BufReader::new(stream.try_clone().unwrap())
            .read_line(&mut line)
            .unwrap();
        stream.write_all(reply).unwrap();
        thread::sleep(Duration::from_millis(600));
    });
    (port, server)
}

fn short_read_timeout() -> ClientConfig {
    ClientConfig {
        timeouts: Timeouts {
            connect: Duration::from_secs(5),
            read: Duration::from_millis(100),
        },
        ..ClientConfig::default()
    }
}

#[test]
fn silent_server_times_out_before_header() {
    let (port, server) = stall_after(b"");
    let client = plain_client(short_read_timeout());
    let err = client
        .fetch(&format!("gemini://127.0.0.1:{}/", port))
        .unwrap_err();
    assert!(matches!(err, GeminiError::Timeout(_)), "{:?}", err);
    assert!(err.is_retryable());
    server.join().unwrap();
}

#[test]
fn stalled_body_times_out() {
    let (port, server) = stall_after(b"20 text/plain\r\nfirst\nhal");
    let client = plain_client(short_read_timeout());
    let mut response = client
        .fetch(&format!("gemini://127.0.0.1:{}/", port))
        .unwrap();
    let mut lines = response.lines();
    assert_eq!(lines.next().unwrap().unwrap(), "first");
    match lines.next() {
        Some(Err(GeminiError::Timeout(_))) => {}
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(lines.next().is_none());
    server.join().unwrap();
}

#[test]
fn header_then_silence_times_out_on_first_line() {
    let (port, server) = stall_after(b"20 text/gemini\r\n");
    let client = plain_client(short_read_timeout());
    let mut response = client
        .fetch(&format!("gemini://127.0.0.1:{}/", port))
        .unwrap();
    assert!(matches!(
        response.lines().next(),
        Some(Err(GeminiError::Timeout(_)))
    ));
    server.join().unwrap();
}

#[test]
fn refused_connection_is_retryable() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let client = plain_client(ClientConfig::default());
    let err = client
        .fetch(&format!("gemini://127.0.0.1:{}/", port))
        .unwrap_err();
    assert!(matches!(err, GeminiError::Connection(_)), "{:?}", err);
    assert!(err.is_retryable());
}

#[test]
#[ignore] // requires network; run with: cargo test --test client_integration -- --ignored --nocapture
fn live_capsule_over_tls() {
    let client = Client::new(ClientConfig::default()).expect("client");
    let request = Request::new("gemini://geminiprotocol.net/").unwrap();
    println!("=== Gemini Integration Test ===");
    println!("Requesting {}", request);

    let (final_request, mut response) = client
        .send_following_redirects(&request)
        .expect("request failed");
    println!("Final URL: {}", final_request);
    println!("Status: {} {}", response.status(), response.meta());
    assert!(response.status().is_success());

    let doc = response.read_document().expect("body");
    println!("Title: {:?}", doc.title());
    println!("Elements: {}", doc.len());
    assert!(!doc.is_empty());
    assert!(doc.links().count() > 0, "capsule home should have links");
    println!("\n=== PASS ===");
}
