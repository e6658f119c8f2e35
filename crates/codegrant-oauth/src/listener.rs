//! One-shot loopback listener for the provider's redirect.
//!
//! [`RedirectListener::bind`] claims the port up front so a busy port fails
//! the flow before the user is sent anywhere. [`RedirectListener::listen`]
//! turns it into a [`PendingCallback`]: the first `GET /oauth` resolves it,
//! and resolving or dropping it closes the socket.

use crate::error::{Error, Result};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Path the provider redirects to.
pub const CALLBACK_PATH: &str = "/oauth";

/// Upper bound on the request head we are willing to read.
const MAX_REQUEST_BYTES: u64 = 16 * 1024;

/// Idle connections are dropped after this long.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

const NO_CONTENT: &[u8] = b"HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n";
const BAD_REQUEST: &[u8] =
    b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
const NOT_FOUND: &[u8] = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
const METHOD_NOT_ALLOWED: &[u8] = b"HTTP/1.1 405 Method Not Allowed\r\nAllow: GET\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Query parameters of the provider's redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackRequest {
    /// Authorization code (if success).
    pub code: Option<String>,
    /// State parameter.
    pub state: Option<String>,
    /// Error code (if authorization failed).
    pub error: Option<String>,
    /// Error description.
    pub error_description: Option<String>,
}

impl CallbackRequest {
    /// Parses callback parameters from a URL's query.
    ///
    /// Repeated keys keep the last value; unknown keys are ignored.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {}
            }
        }

        params
    }

    /// Parses callback parameters from a request target such as
    /// `/oauth?code=abc&state=xyz`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target is not a valid relative reference.
    pub fn from_target(target: &str) -> Result<Self> {
        Ok(Self::from_url(&resolve_target(target)?))
    }
}

fn resolve_target(target: &str) -> Result<Url> {
    let base = Url::parse("http://127.0.0.1/")?;
    Ok(Url::options().base_url(Some(&base)).parse(target)?)
}

type CallbackSlot = Arc<Mutex<Option<oneshot::Sender<Result<CallbackRequest>>>>>;

/// Bound, not yet accepting, redirect listener.
#[derive(Debug)]
pub struct RedirectListener {
    listener: TcpListener,
}

impl RedirectListener {
    /// Binds `127.0.0.1:port`. Port `0` picks a free port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListenerBind`] if the port cannot be bound.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(|source| Error::ListenerBind { port, source })?;
        info!(port, path = CALLBACK_PATH, "callback listener bound");
        Ok(Self { listener })
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Starts accepting connections and returns the pending callback.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn listen(self) -> Result<PendingCallback> {
        let local_addr = self.local_addr()?;
        let (sender, receiver) = oneshot::channel();
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(sender)));
        let accept_task = tokio::spawn(accept_loop(self.listener, slot));

        Ok(PendingCallback {
            receiver,
            accept_task,
            local_addr,
        })
    }
}

/// A callback that has not arrived yet.
///
/// Owns the listening socket through its accept task.
#[derive(Debug)]
pub struct PendingCallback {
    receiver: oneshot::Receiver<Result<CallbackRequest>>,
    accept_task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl PendingCallback {
    /// Address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the first callback, then closes the listener.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CallbackTimeout`] if `timeout` elapses first, or
    /// [`Error::Listener`] if the listener fails.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<CallbackRequest> {
        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, &mut self.receiver).await,
            None => Ok((&mut self.receiver).await),
        };
        self.close().await;

        match received {
            Ok(Ok(callback)) => callback,
            Ok(Err(_)) => Err(Error::Listener(io::Error::other(
                "callback listener stopped before a callback arrived",
            ))),
            Err(_) => Err(Error::CallbackTimeout(timeout.unwrap_or_default())),
        }
    }

    async fn close(&mut self) {
        self.accept_task.abort();
        // Resolves once the task, and with it the socket, has been dropped.
        let _ = (&mut self.accept_task).await;
        debug!(addr = %self.local_addr, "callback listener closed");
    }
}

impl Drop for PendingCallback {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(listener: TcpListener, slot: CallbackSlot) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "callback connection accepted");
                let slot = Arc::clone(&slot);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &slot).await {
                        warn!(%peer, error = %e, "failed to handle callback connection");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "callback listener failed");
                if let Some(sender) = slot.lock().await.take() {
                    let _ = sender.send(Err(Error::Listener(e)));
                }
                return;
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Route {
    Callback(CallbackRequest),
    NotFound,
    MethodNotAllowed,
    BadRequest,
}

impl Route {
    fn parse(request_line: &str) -> Self {
        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
        else {
            return Self::BadRequest;
        };
        if !version.starts_with("HTTP/") {
            return Self::BadRequest;
        }

        let Ok(url) = resolve_target(target) else {
            return Self::BadRequest;
        };

        if url.path() != CALLBACK_PATH {
            Self::NotFound
        } else if method != "GET" {
            Self::MethodNotAllowed
        } else {
            Self::Callback(CallbackRequest::from_url(&url))
        }
    }

    const fn response(&self) -> &'static [u8] {
        match self {
            Self::Callback(_) => NO_CONTENT,
            Self::NotFound => NOT_FOUND,
            Self::MethodNotAllowed => METHOD_NOT_ALLOWED,
            Self::BadRequest => BAD_REQUEST,
        }
    }
}

async fn handle_connection(mut stream: TcpStream, slot: &CallbackSlot) -> io::Result<()> {
    let route = match tokio::time::timeout(REQUEST_READ_TIMEOUT, read_route(&mut stream)).await {
        Ok(route) => route?,
        Err(_) => {
            debug!("callback connection idle, dropping");
            return Ok(());
        }
    };

    // Answer before handing off so the browser is not kept waiting.
    stream.write_all(route.response()).await?;
    stream.shutdown().await?;

    match route {
        Route::Callback(callback) => {
            if let Some(sender) = slot.lock().await.take() {
                info!("authorization callback received");
                let _ = sender.send(Ok(callback));
            } else {
                debug!("ignoring repeated callback");
            }
        }
        other => debug!(?other, "rejected request on callback listener"),
    }
    Ok(())
}

async fn read_route(stream: &mut TcpStream) -> io::Result<Route> {
    let mut reader = BufReader::new((&mut *stream).take(MAX_REQUEST_BYTES));

    let mut request_line = Vec::new();
    if reader.read_until(b'\n', &mut request_line).await? == 0 {
        return Ok(Route::BadRequest);
    }

    // Drain headers up to the blank line.
    let mut header = Vec::new();
    loop {
        header.clear();
        if reader.read_until(b'\n', &mut header).await? == 0
            || header.trim_ascii_end().is_empty()
        {
            break;
        }
    }

    Ok(String::from_utf8(request_line).map_or(Route::BadRequest, |line| Route::parse(&line)))
}
