//! One-shot localhost listener for the OAuth redirect of a consent flow.

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::error::AuthError;

/// Path the provider redirects the browser to after the consent prompt.
pub const REDIRECT_PATH: &str = "/authorized";

const MAX_REQUEST_BYTES: usize = 8192;
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameters carried by the redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackPayload {
    pub code: Option<String>,
    pub scope: Option<String>,
    pub error: Option<String>,
}

/// A single bound listener for one consent round trip.
///
/// The port is released when the session is dropped, whichever way the flow
/// ends.
#[derive(Debug)]
pub struct ConsentSession {
    listener: TcpListener,
    host: String,
    port: u16,
}

impl ConsentSession {
    /// Bind `host:port`. Port `0` picks an ephemeral port.
    pub async fn bind(host: &str, port: u16) -> Result<Self, AuthError> {
        let listener = TcpListener::bind((host, port)).await.map_err(|e| {
            AuthError::Callback(format!("failed to bind callback listener on {host}:{port}: {e}"))
        })?;
        let port = listener.local_addr()?.port();
        tracing::debug!(host, port, "consent callback listener bound");
        Ok(Self {
            listener,
            host: host.to_string(),
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://{}:{}{REDIRECT_PATH}", self.host, self.port)
    }

    /// Wait for the redirect request.
    ///
    /// Requests to any other path are answered with a 404 and do not count;
    /// `timeout` bounds the whole wait. Each connection is read on its own
    /// task, so an idle connection never holds up the redirect.
    pub async fn wait_for_callback(
        &self,
        timeout: Duration,
    ) -> Result<CallbackRequest, AuthError> {
        let deadline = Instant::now() + timeout;
        let mut pending = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    pending.spawn(read_connection(stream, peer));
                }
                Some(joined) = pending.join_next() => {
                    let Ok((mut stream, peer, read)) = joined else {
                        continue;
                    };
                    let target = match read {
                        Ok(target) => target,
                        Err(err) => {
                            tracing::debug!(%peer, error = %err, "ignoring unreadable callback request");
                            let _ = write_response(&mut stream, 400, "Bad Request", "Bad request.\n").await;
                            continue;
                        }
                    };
                    match parse_callback_target(&target) {
                        Ok(Some(payload)) => return Ok(CallbackRequest { payload, stream }),
                        Ok(None) => {
                            tracing::debug!(%peer, request_target = %target, "ignoring request outside redirect path");
                            let _ = write_response(&mut stream, 404, "Not Found", "Not found.\n").await;
                        }
                        Err(err) => {
                            tracing::debug!(%peer, error = %err, "ignoring malformed callback target");
                            let _ = write_response(&mut stream, 400, "Bad Request", "Bad request.\n").await;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(AuthError::ConsentTimeout {
                        secs: timeout.as_secs(),
                    });
                }
            }
        }
    }
}

/// The redirect request, held open until the flow writes its reply.
#[derive(Debug)]
pub struct CallbackRequest {
    pub payload: CallbackPayload,
    stream: TcpStream,
}

impl CallbackRequest {
    /// Send a plain-text 200 response to the browser and close the connection.
    pub async fn respond(mut self, body: &str) {
        if let Err(err) = write_response(&mut self.stream, 200, "OK", body).await {
            tracing::debug!(error = %err, "failed to answer consent callback");
        }
    }
}

/// Parse the request target of the redirect.
///
/// Returns `Ok(None)` when the path is not [`REDIRECT_PATH`].
pub fn parse_callback_target(target: &str) -> Result<Option<CallbackPayload>, AuthError> {
    let url = Url::parse(&format!("http://localhost{target}"))
        .map_err(|e| AuthError::Callback(format!("invalid callback target {target:?}: {e}")))?;
    if url.path() != REDIRECT_PATH {
        return Ok(None);
    }

    let mut payload = CallbackPayload::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if !value.is_empty() => payload.code = Some(value.into_owned()),
            "scope" => payload.scope = Some(value.into_owned()),
            "error" => payload.error = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(Some(payload))
}

/// Read one request on its own deadline; idle connections are dropped.
async fn read_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
) -> (TcpStream, SocketAddr, Result<String, AuthError>) {
    let read = match tokio::time::timeout(REQUEST_READ_TIMEOUT, read_request_target(&mut stream)).await {
        Ok(read) => read,
        Err(_) => Err(AuthError::Callback(format!(
            "no request within {}s",
            REQUEST_READ_TIMEOUT.as_secs()
        ))),
    };
    (stream, peer, read)
}

/// Read until the end of the request head, then return the request target.
async fn read_request_target(stream: &mut TcpStream) -> Result<String, AuthError> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !has_complete_head(&buffer) && buffer.len() < MAX_REQUEST_BYTES {
        let size = stream.read(&mut chunk).await?;
        if size == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..size]);
    }
    if buffer.is_empty() {
        return Err(AuthError::Callback("empty callback request".to_string()));
    }

    let request = String::from_utf8_lossy(&buffer);
    let first_line = request
        .lines()
        .next()
        .filter(|_| request.contains('\n'))
        .ok_or_else(|| AuthError::Callback("incomplete callback request line".to_string()))?;
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    if !matches!(method, "GET" | "HEAD") || !target.starts_with('/') {
        return Err(AuthError::Callback(format!(
            "unexpected callback request line {first_line:?}"
        )));
    }
    Ok(target.to_string())
}

fn has_complete_head(buffer: &[u8]) -> bool {
    buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.windows(2).any(|w| w == b"\n\n")
}

async fn write_response(
    stream: &mut TcpStream,
    status: u16,
    reason: &str,
    body: &str,
) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
