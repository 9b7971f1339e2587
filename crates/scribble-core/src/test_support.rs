//! Loopback HTTP endpoint for exercising the REST adapters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct Reply {
    pub status: StatusCode,
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn json(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::json(StatusCode::OK, body)
    }

    #[must_use]
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// The request line plus the order in which it arrived.
pub struct Request {
    pub line: String,
    pub index: usize,
}

pub struct FakeEndpoint {
    /// `127.0.0.1:port`, suitable for the emulator overrides
    pub host: String,
    hits: Arc<AtomicUsize>,
}

impl FakeEndpoint {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub async fn wait_for_hits(&self, count: usize) {
        while self.hits() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Serve every connection with `respond`, one request per connection.
pub async fn spawn_endpoint<F>(respond: F) -> FakeEndpoint
where
    F: Fn(&Request) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let host = listener.local_addr().expect("local address").to_string();
    let hits = Arc::new(AtomicUsize::new(0));
    let respond = Arc::new(respond);

    let counter = Arc::clone(&hits);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let counter = Arc::clone(&counter);
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                serve(socket, &counter, respond.as_ref()).await;
            });
        }
    });

    FakeEndpoint { host, hits }
}

async fn serve<F>(mut socket: TcpStream, counter: &AtomicUsize, respond: &F)
where
    F: Fn(&Request) -> Reply,
{
    let Some(line) = read_request_line(&mut socket).await else {
        return;
    };
    let index = counter.fetch_add(1, Ordering::SeqCst);
    let reply = respond(&Request { line, index });
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    let response = format!(
        "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        reply.status.as_u16(),
        reply.status.canonical_reason().unwrap_or("Unknown"),
        reply.body.len(),
        reply.body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Read a whole request (headers and `content-length` body), keeping the
/// request line.
async fn read_request_line(socket: &mut TcpStream) -> Option<String> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    let header_end = loop {
        let read = socket.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(end) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            break end;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let body_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buffer.len() < header_end + 4 + body_length {
        let read = socket.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }

    head.lines().next().map(str::to_string)
}
