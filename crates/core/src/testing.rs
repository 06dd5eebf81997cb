//! Test helpers shared by the crates that talk HTTP.
//!
//! [`MockHttpServer`] answers a fixed sequence of requests, one connection
//! each, and records what it received. Enabled by the `testing` feature.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// One request as seen by the mock server.
#[derive(Debug)]
pub struct CapturedRequest {
    /// Request line and headers.
    pub head: String,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.head.split_whitespace().nth(1).unwrap_or_default()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.head, name)
    }
}

pub struct MockHttpServer {
    listener: tokio::net::TcpListener,
    pub base_url: String,
}

impl MockHttpServer {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock server");
        let port = listener.local_addr().unwrap().port();
        let base_url = format!("http://127.0.0.1:{port}");
        Self { listener, base_url }
    }

    /// Answer `responses.len()` requests in order and return them.
    pub async fn respond_sequence(self, responses: Vec<(u16, String)>) -> Vec<CapturedRequest> {
        let mut captured = Vec::with_capacity(responses.len());
        for (status_code, body) in responses {
            let (mut stream, _) = self.listener.accept().await.unwrap();
            captured.push(read_request(&mut stream).await);

            let response = format!(
                "HTTP/1.1 {status_code} OK\r\n\
                 Content-Type: application/json\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\
                 \r\n\
                 {body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
        captured
    }

    pub async fn respond_once(self, status_code: u16, body: &str) -> CapturedRequest {
        self.respond_sequence(vec![(status_code, body.to_owned())])
            .await
            .remove(0)
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> CapturedRequest {
    let mut raw = Vec::new();
    let mut buf = [0u8; 8192];
    let body_start = loop {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        raw.extend_from_slice(&buf[..n]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&raw[..body_start]).into_owned();
    let content_length = header_value(&head, "content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    while raw.len() < body_start + content_length {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
    }
    CapturedRequest {
        head,
        body: raw[body_start..].to_vec(),
    }
}

fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then_some(value.trim())
    })
}
