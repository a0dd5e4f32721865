//! Shared fixtures: an in-memory session and raw TCP endpoints for failure cases.

#![allow(dead_code)]

use batch_http::transport::{HttpSession, TransportError};
use batch_http::types::{RequestOptions, Response};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Session answering 200 after `delay`; urls containing "fail" get a connect error.
pub struct ScriptedSession {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl ScriptedSession {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    fn respond(&self, url: &str, body: &str) -> Result<Response, TransportError> {
        std::thread::sleep(self.delay);
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.contains("fail") {
            return Err(TransportError::Connect(format!("refused: {}", url)));
        }
        Ok(Response::new(
            url,
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from(body.to_string()),
        ))
    }
}

impl HttpSession for ScriptedSession {
    fn get(&self, url: &str, _options: &RequestOptions) -> Result<Response, TransportError> {
        self.respond(url, "get")
    }

    fn post(&self, url: &str, _options: &RequestOptions) -> Result<Response, TransportError> {
        self.respond(url, "post")
    }
}

/// A local address nothing listens on.
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}/", addr)
}

/// Accepts connections and never answers; keeps them open so clients time out.
pub fn silent_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    std::thread::spawn(move || {
        let held: Mutex<Vec<TcpStream>> = Mutex::new(Vec::new());
        for stream in listener.incoming().flatten() {
            held.lock().unwrap().push(stream);
        }
    });
    format!("http://{}/slow", addr)
}
