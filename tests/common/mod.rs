//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use hyper::{HeaderMap, StatusCode};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use traced_client::error::{ReportError, TransportError};
use traced_client::http::{OutboundRequest, Response};
use traced_client::net::{Connection, ConnectionId, Connector, Endpoint};
use traced_client::observability::{CallRecord, TraceReporter};

/// One request as seen by the backend.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Keep-alive HTTP/1.1 backend that counts accepted sockets and records
/// every request. Responses echo the request body and carry `X-SPAN-ID`.
pub struct Backend {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl Backend {
    pub async fn start(span_id: &'static str, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let counter = accepted.clone();
        let log = seen.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let log = log.clone();
                tokio::spawn(serve(socket, log, span_id, delay));
            }
        });

        Self { addr, accepted, seen }
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn uri(&self, scheme: &str, path: &str) -> String {
        format!("{}://{}{}", scheme, self.addr, path)
    }
}

async fn serve(mut socket: TcpStream, seen: Arc<Mutex<Vec<SeenRequest>>>, span_id: &str, delay: Duration) {
    let mut buf = Vec::new();
    loop {
        let head_end = loop {
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos;
            }
            let mut chunk = [0u8; 4096];
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|l| l.split_once(':'))
            .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
            .collect();
        let length: usize = headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);

        let body_start = head_end + 4;
        while buf.len() < body_start + length {
            let mut chunk = [0u8; 4096];
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
        let body = buf[body_start..body_start + length].to_vec();
        buf.drain(..body_start + length);

        seen.lock().unwrap().push(SeenRequest {
            request_line,
            headers,
            body: body.clone(),
        });

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nX-SPAN-ID: {}\r\n\r\n",
            body.len(),
            span_id
        )
        .into_bytes();
        response.extend_from_slice(&body);
        if socket.write_all(&response).await.is_err() {
            return;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Scripted outcome for [`MockConnection::send`].
#[derive(Debug, Clone)]
pub enum Script {
    Respond { status: u16, span_id: Option<String> },
    Fail,
    Hang,
}

/// Shared state behind [`MockConnector`].
#[derive(Debug)]
pub struct MockState {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub alive: AtomicBool,
    pub refuse: AtomicBool,
    pub close_delay: Mutex<Duration>,
    pub script: Mutex<Script>,
    pub sent: Mutex<Vec<OutboundRequest>>,
    pub endpoints: Mutex<Vec<Endpoint>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            connects: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            alive: AtomicBool::new(true),
            refuse: AtomicBool::new(false),
            close_delay: Mutex::new(Duration::ZERO),
            script: Mutex::new(Script::Respond {
                status: 200,
                span_id: Some("child-1".into()),
            }),
            sent: Mutex::new(Vec::new()),
            endpoints: Mutex::new(Vec::new()),
        }
    }
}

impl MockState {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn last_sent(&self) -> OutboundRequest {
        self.sent.lock().unwrap().last().cloned().unwrap()
    }
}

/// Connector producing in-memory connections driven by a [`Script`].
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    pub state: Arc<MockState>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>, TransportError> {
        if self.state.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state.alive.store(true, Ordering::SeqCst);
        self.state.endpoints.lock().unwrap().push(endpoint.clone());
        Ok(Box::new(MockConnection {
            id: ConnectionId::new(),
            state: self.state.clone(),
        }))
    }
}

pub struct MockConnection {
    id: ConnectionId,
    state: Arc<MockState>,
}

#[async_trait]
impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::SeqCst)
    }

    async fn send(&mut self, request: OutboundRequest) -> Result<Response, TransportError> {
        self.state.sent.lock().unwrap().push(request);
        let script = self.state.script.lock().unwrap().clone();
        match script {
            Script::Respond { status, span_id } => {
                let mut headers = HeaderMap::new();
                if let Some(span) = span_id {
                    headers.insert("x-span-id", span.parse().unwrap());
                }
                Ok(Response::new(
                    StatusCode::from_u16(status).unwrap(),
                    headers,
                    bytes::Bytes::from_static(b"ok"),
                ))
            }
            Script::Fail => Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))),
            Script::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn close(&mut self) {
        let delay = *self.state.close_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Reporter that forwards every record to a channel.
pub struct RecordingReporter {
    tx: mpsc::UnboundedSender<CallRecord>,
    fail: bool,
}

impl RecordingReporter {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<CallRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx, fail: false }), rx)
    }

    /// Records, then fails every report.
    pub fn failing() -> (Arc<Self>, mpsc::UnboundedReceiver<CallRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx, fail: true }), rx)
    }
}

#[async_trait]
impl TraceReporter for RecordingReporter {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn report(&self, record: &CallRecord) -> Result<(), ReportError> {
        let _ = self.tx.send(record.clone());
        if self.fail {
            return Err(ReportError::Other("collector down".into()));
        }
        Ok(())
    }
}

/// Next record, or panic after a second.
pub async fn next_record(rx: &mut mpsc::UnboundedReceiver<CallRecord>) -> CallRecord {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no call record within 1s")
        .expect("reporter channel closed")
}

/// Assert nothing gets reported within a short window.
pub async fn assert_no_record(rx: &mut mpsc::UnboundedReceiver<CallRecord>) {
    let got = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(got.is_err(), "unexpected call record: {:?}", got);
}
