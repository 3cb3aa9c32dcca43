//! Shared fixtures: a live hyper SSE server and an in-process connector.

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    convert::Infallible,
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use hpx_eventsource::{BodyStream, BoxError, Connector};
use http_body_util::StreamBody;
use hyper::{
    Request, Response,
    body::{Bytes, Frame, Incoming},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::{
    net::TcpListener,
    sync::{Notify, mpsc},
    time::Instant,
};

/// Await `fut`, panicking if it takes longer than `secs` seconds.
pub async fn within<F: Future>(secs: u64, fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(secs), fut)
        .await
        .expect("timed out")
}

// ---------------------------------------------------------------------------
// Mock SSE server
// ---------------------------------------------------------------------------

struct ServerState {
    content_type: Mutex<&'static str>,
    max_requests: Mutex<Option<usize>>,
    requests: AtomicUsize,
    last_event_ids: Mutex<Vec<Option<String>>>,
    active: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    request_seen: Notify,
}

/// SSE server whose responses stay open until the test ends them.
///
/// Requests beyond `max_requests` are refused with `503`.
pub struct MockServer {
    pub url: String,
    state: Arc<ServerState>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let state = Arc::new(ServerState {
            content_type: Mutex::new("text/event-stream"),
            max_requests: Mutex::new(Some(1)),
            requests: AtomicUsize::new(0),
            last_event_ids: Mutex::new(Vec::new()),
            active: Mutex::new(None),
            request_seen: Notify::new(),
        });

        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    let _ = http1::Builder::new()
                        .serve_connection(
                            TokioIo::new(stream),
                            service_fn(move |req| respond(req, Arc::clone(&state))),
                        )
                        .await;
                });
            }
        });

        Self {
            url: format!("http://{addr}/stream"),
            state,
        }
    }

    pub fn set_content_type(&self, content_type: &'static str) {
        *self.state.content_type.lock().expect("lock") = content_type;
    }

    pub fn set_max_requests(&self, max: Option<usize>) {
        *self.state.max_requests.lock().expect("lock") = max;
    }

    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// `Last-Event-ID` of every request so far, in arrival order.
    pub fn last_event_ids(&self) -> Vec<Option<String>> {
        self.state.last_event_ids.lock().expect("lock").clone()
    }

    /// Wait until at least `n` requests have been accepted.
    pub async fn wait_for_requests(&self, n: usize) {
        loop {
            let seen = self.state.request_seen.notified();
            if self.requests() >= n {
                return;
            }
            seen.await;
        }
    }

    /// Write raw bytes to the most recent open response.
    pub fn send(&self, chunk: &str) {
        if let Some(tx) = self.state.active.lock().expect("lock").as_ref() {
            let _ = tx.send(Bytes::copy_from_slice(chunk.as_bytes()));
        }
    }

    /// End the most recent response, as a server restart would.
    pub fn close_active(&self) {
        self.state.active.lock().expect("lock").take();
    }
}

type ChunkBody = StreamBody<stream::BoxStream<'static, Result<Frame<Bytes>, Infallible>>>;

async fn respond(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<Response<ChunkBody>, Infallible> {
    let last_event_id = req
        .headers()
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    state
        .last_event_ids
        .lock()
        .expect("lock")
        .push(last_event_id);

    let count = state.requests.fetch_add(1, Ordering::SeqCst) + 1;
    let refused = matches!(*state.max_requests.lock().expect("lock"), Some(max) if count > max);

    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
    let body: stream::BoxStream<'static, Result<Frame<Bytes>, Infallible>> =
        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok(Frame::data(chunk)), rx))
        })
        .boxed();

    let (status, content_type) = if refused {
        (503, "text/plain")
    } else {
        *state.active.lock().expect("lock") = Some(tx);
        (200, *state.content_type.lock().expect("lock"))
    };
    state.request_seen.notify_waiters();

    Ok(Response::builder()
        .status(status)
        .header("content-type", content_type)
        .header("cache-control", "no-cache")
        .body(StreamBody::new(body))
        .expect("build response"))
}

// ---------------------------------------------------------------------------
// Scripted connector
// ---------------------------------------------------------------------------

/// How the scripted connector answers one attempt.
#[derive(Clone, Copy, Debug)]
pub enum Reply {
    Stream {
        status: u16,
        content_type: &'static str,
    },
    Fail(&'static str),
}

impl Reply {
    pub const OK: Reply = Reply::Stream {
        status: 200,
        content_type: "text/event-stream",
    };
}

/// One connection attempt seen by the scripted connector.
pub struct Attempt {
    pub at: Instant,
    pub last_event_id: Option<String>,
    body: Option<mpsc::UnboundedSender<Result<Bytes, BoxError>>>,
}

impl Attempt {
    pub fn send(&self, chunk: &str) {
        self.send_bytes(chunk.as_bytes());
    }

    pub fn send_bytes(&self, chunk: &[u8]) {
        if let Some(tx) = &self.body {
            let _ = tx.send(Ok(Bytes::copy_from_slice(chunk)));
        }
    }

    pub fn fail(&self, reason: &'static str) {
        if let Some(tx) = &self.body {
            let _ = tx.send(Err(reason.into()));
        }
    }
}

/// Answers attempts from a script (then with `Reply::OK`) and reports each
/// attempt on a channel so tests can drive its body.
pub struct ScriptedConnector {
    replies: Mutex<VecDeque<Reply>>,
    attempts: mpsc::UnboundedSender<Attempt>,
}

impl ScriptedConnector {
    pub fn new(replies: Vec<Reply>) -> (Self, mpsc::UnboundedReceiver<Attempt>) {
        let (attempts, rx) = mpsc::unbounded_channel();
        let connector = Self {
            replies: Mutex::new(replies.into()),
            attempts,
        };
        (connector, rx)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        request: http::Request<()>,
    ) -> Result<http::Response<BodyStream>, BoxError> {
        let reply = self
            .replies
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(Reply::OK);
        let last_event_id = request
            .headers()
            .get("last-event-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let (status, content_type) = match reply {
            Reply::Fail(reason) => {
                let _ = self.attempts.send(Attempt {
                    at: Instant::now(),
                    last_event_id,
                    body: None,
                });
                return Err(reason.into());
            }
            Reply::Stream {
                status,
                content_type,
            } => (status, content_type),
        };

        let (tx, rx) = mpsc::unbounded_channel::<Result<Bytes, BoxError>>();
        let _ = self.attempts.send(Attempt {
            at: Instant::now(),
            last_event_id,
            body: Some(tx),
        });

        let body: BodyStream =
            stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
                .boxed();
        Ok(http::Response::builder()
            .status(status)
            .header("content-type", content_type)
            .body(body)?)
    }
}
