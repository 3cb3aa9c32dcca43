//! The event source controller.
//!
//! Provides [`EventSource`], [`EventSourceHandle`] and [`Events`]. The first
//! connection attempt runs on the caller's task; after that a background
//! task owns the stream, hands each decoded event to the consumer and
//! reconnects whenever the stream drops.

use std::{
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    task::{Context, Poll},
    time::Duration,
};

use futures_util::{Stream, StreamExt};
use http::{
    HeaderValue, StatusCode,
    header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, HeaderName},
};
use parking_lot::{Mutex, RwLock};
use tokio::{
    sync::{mpsc, watch},
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::EventSourceConfig,
    error::{Error, Result},
    parse::{Decoder, Event, LineScanner},
    ready_state::ReadyState,
    transport::{BodyStream, Connector, HyperConnector},
};

/// Request header carrying the replay cursor.
pub const LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

const EVENT_STREAM: &str = "text/event-stream";

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State read by handles and written by the background task.
struct Shared {
    url: String,
    state: watch::Sender<ReadyState>,
    last_event_id: RwLock<String>,
    retry_ms: AtomicU64,
    cancel: CancellationToken,
    /// The event sender, held here until the first connection attempt.
    unstarted: Mutex<Option<mpsc::Sender<Event>>>,
}

impl Shared {
    fn ready_state(&self) -> ReadyState {
        *self.state.borrow()
    }

    /// Move to `next` unless a close is already under way.
    fn transition(&self, next: ReadyState) {
        self.state.send_if_modified(|current| {
            if current.is_shutting_down() || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms.load(Ordering::Acquire))
    }

    fn set_retry(&self, retry: Duration) {
        let millis = u64::try_from(retry.as_millis()).unwrap_or(u64::MAX);
        self.retry_ms.store(millis, Ordering::Release);
    }

    fn last_event_id(&self) -> String {
        self.last_event_id.read().clone()
    }

    fn commit_event_id(&self, id: &str) {
        if *self.last_event_id.read() != id {
            *self.last_event_id.write() = id.to_owned();
        }
    }
}

// ---------------------------------------------------------------------------
// Public API: EventSource
// ---------------------------------------------------------------------------

/// A connection to an SSE endpoint.
///
/// Obtain one with [`open`](EventSource::open) or
/// [`connect_with`](EventSource::connect_with), then read events with
/// [`next_event`](EventSource::next_event) or as a [`Stream`]. Use
/// [`split`](EventSource::split) to hand the event queue to one task and
/// keep a [`EventSourceHandle`] elsewhere.
pub struct EventSource {
    handle: EventSourceHandle,
    events: Events,
    config: Arc<EventSourceConfig>,
    connector: Arc<dyn Connector>,
}

impl EventSource {
    /// Connect to `url` with default settings.
    ///
    /// # Errors
    ///
    /// Fails if the URL is invalid or the first attempt is rejected; see
    /// [`connect`](EventSource::connect).
    pub async fn open(url: impl Into<String>) -> Result<Self> {
        Self::connect_with(EventSourceConfig::new(url)).await
    }

    /// Connect using `config` and the default [`HyperConnector`].
    ///
    /// # Errors
    ///
    /// See [`connect`](EventSource::connect).
    pub async fn connect_with(config: EventSourceConfig) -> Result<Self> {
        let mut source = Self::new(config)?;
        source.connect().await?;
        Ok(source)
    }

    /// Create an unconnected source using the default [`HyperConnector`].
    ///
    /// The source starts in [`ReadyState::Connecting`] and does no I/O until
    /// [`connect`](EventSource::connect) is called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if validation fails.
    pub fn new(config: EventSourceConfig) -> Result<Self> {
        let connector = HyperConnector::with_connect_timeout(Some(config.connect_timeout));
        Self::with_connector(config, connector)
    }

    /// Create an unconnected source that opens streams through `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if validation fails.
    pub fn with_connector(config: EventSourceConfig, connector: impl Connector) -> Result<Self> {
        config.validate().map_err(Error::config)?;

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let (state, _) = watch::channel(ReadyState::Connecting);
        let shared = Arc::new(Shared {
            url: config.url.clone(),
            state,
            last_event_id: RwLock::new(String::new()),
            retry_ms: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            unstarted: Mutex::new(Some(event_tx)),
        });
        shared.set_retry(config.retry);

        Ok(Self {
            handle: EventSourceHandle { shared },
            events: Events { rx: event_rx },
            config: Arc::new(config),
            connector: Arc::new(connector),
        })
    }

    /// Make the first connection attempt and start the background task.
    ///
    /// On success the state is [`ReadyState::Open`] and events begin to
    /// arrive. On failure the source is [`ReadyState::Closed`], its event
    /// queue is closed and no reconnect is attempted.
    ///
    /// # Errors
    ///
    /// - [`Error::ContentType`] / [`Error::Status`] if the response is not an
    ///   event stream.
    /// - [`Error::Transport`] / [`Error::Timeout`] if no response arrived.
    /// - [`Error::Closed`] if the source was closed or already connected.
    pub async fn connect(&mut self) -> Result<()> {
        let shared = &self.handle.shared;
        let Some(events) = shared.unstarted.lock().take() else {
            return Err(Error::Closed);
        };

        let driver = Driver {
            config: Arc::clone(&self.config),
            connector: Arc::clone(&self.connector),
            shared: Arc::clone(shared),
            events,
        };

        info!(url = %self.config.url, "SSE connecting");
        let attempt = tokio::select! {
            biased;
            () = driver.interrupted() => Err(Error::Closed),
            result = driver.establish() => result,
        };

        match attempt {
            Ok(body) => {
                driver.shared.transition(ReadyState::Open);
                info!(url = %self.config.url, "SSE connection established");
                tokio::spawn(driver.run(body));
                Ok(())
            }
            Err(err) => {
                error!(url = %self.config.url, error = %err, "SSE connection rejected");
                driver.finish();
                Err(err)
            }
        }
    }

    /// Receive the next event.
    ///
    /// Returns `None` once the source is closed and every event handed off
    /// before that has been received.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.next_event().await
    }

    /// The consumer-facing event queue.
    pub fn events(&mut self) -> &mut Events {
        &mut self.events
    }

    /// The control handle.
    pub fn handle(&self) -> &EventSourceHandle {
        &self.handle
    }

    /// Split into a control handle and the event queue.
    pub fn split(self) -> (EventSourceHandle, Events) {
        (self.handle, self.events)
    }

    /// See [`EventSourceHandle::url`].
    pub fn url(&self) -> &str {
        self.handle.url()
    }

    /// See [`EventSourceHandle::ready_state`].
    pub fn ready_state(&self) -> ReadyState {
        self.handle.ready_state()
    }

    /// See [`EventSourceHandle::last_event_id`].
    pub fn last_event_id(&self) -> String {
        self.handle.last_event_id()
    }

    /// See [`EventSourceHandle::retry`].
    pub fn retry(&self) -> Duration {
        self.handle.retry()
    }

    /// See [`EventSourceHandle::close`].
    pub fn close(&self) {
        self.handle.close();
    }
}

impl Stream for EventSource {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.events).poll_next(cx)
    }
}

// ---------------------------------------------------------------------------
// EventSourceHandle
// ---------------------------------------------------------------------------

/// Clone-able view of a running [`EventSource`].
///
/// Every accessor is safe to call while the background task is running.
#[derive(Clone)]
pub struct EventSourceHandle {
    shared: Arc<Shared>,
}

impl EventSourceHandle {
    /// The URL the source was created with.
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// The current lifecycle state.
    pub fn ready_state(&self) -> ReadyState {
        self.shared.ready_state()
    }

    /// The id of the most recently delivered event.
    ///
    /// Survives reconnects and events without an `id` field; only an
    /// explicit empty `id:` line clears it.
    pub fn last_event_id(&self) -> String {
        self.shared.last_event_id()
    }

    /// The delay the next reconnect will wait for.
    pub fn retry(&self) -> Duration {
        self.shared.retry()
    }

    /// Stop the source. Idempotent.
    ///
    /// Moves to [`ReadyState::Closing`] at once; the background task drops
    /// the connection at its next suspension point and then reports
    /// [`ReadyState::Closed`]. Await [`closed`](Self::closed) to wait for it.
    pub fn close(&self) {
        let shared = &self.shared;
        let closing = shared.state.send_if_modified(|state| {
            if state.is_shutting_down() {
                return false;
            }
            *state = ReadyState::Closing;
            true
        });
        shared.cancel.cancel();

        // Never connected: no task exists to finish the job.
        if shared.unstarted.lock().take().is_some() {
            shared.state.send_replace(ReadyState::Closed);
        }
        if closing {
            info!(url = %shared.url, "SSE connection closing (requested)");
        }
    }

    /// Wait until the source reaches [`ReadyState::Closed`].
    pub async fn closed(&self) {
        let mut state = self.shared.state.subscribe();
        // The sender lives in `Shared`, which `self` keeps alive.
        let _ = state.wait_for(|state| state.is_closed()).await;
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The receiving end of an event source.
///
/// Implements [`Stream`] for use with `StreamExt` combinators. Dropping it
/// stops the background task.
pub struct Events {
    rx: mpsc::Receiver<Event>,
}

impl Events {
    /// Receive the next event, waiting until one is available.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Stream for Events {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

// ---------------------------------------------------------------------------
// Internal: request / response
// ---------------------------------------------------------------------------

fn build_request(config: &EventSourceConfig, last_event_id: &str) -> Result<http::Request<()>> {
    let mut request = http::Request::get(config.url.as_str())
        .body(())
        .map_err(|e| Error::config(format!("Invalid request for {}: {e}", config.url)))?;

    let headers = request.headers_mut();
    headers.extend(config.headers.clone());
    headers.insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    if !last_event_id.is_empty() {
        match HeaderValue::from_str(last_event_id) {
            Ok(value) => {
                headers.insert(LAST_EVENT_ID, value);
            }
            Err(_) => warn!(id = %last_event_id, "Last-Event-ID is not a valid header value, not sent"),
        }
    }

    Ok(request)
}

fn check_response<B>(response: &http::Response<B>) -> Result<()> {
    let status = response.status();
    if status != StatusCode::OK {
        return Err(Error::status(status));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .map(|value| value.to_str().unwrap_or("<non-ascii>"));
    match content_type {
        Some(value) if is_event_stream(value) => Ok(()),
        other => Err(Error::content_type(other)),
    }
}

/// `text/event-stream`, optionally with `charset=utf-8` and nothing else.
pub(crate) fn is_event_stream(content_type: &str) -> bool {
    let Ok(mime) = content_type.parse::<mime::Mime>() else {
        return false;
    };
    mime.essence_str().eq_ignore_ascii_case(EVENT_STREAM)
        && mime.params().all(|(name, value)| {
            name.as_str().eq_ignore_ascii_case("charset")
                && value.as_str().eq_ignore_ascii_case("utf-8")
        })
}

// ---------------------------------------------------------------------------
// Internal: background driver
// ---------------------------------------------------------------------------

type Body = Decoder<BodyStream>;

/// Why a stream stopped producing events.
enum Exit {
    /// Closed by the consumer, or the consumer went away.
    Stopped,
    /// Server closed the stream, or it failed: reconnect.
    Dropped,
}

struct Driver {
    config: Arc<EventSourceConfig>,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    events: mpsc::Sender<Event>,
}

impl Driver {
    /// Resolves on `close()` or once the consumer dropped its queue.
    async fn interrupted(&self) {
        tokio::select! {
            () = self.shared.cancel.cancelled() => {}
            () = self.events.closed() => {}
        }
    }

    /// One connection attempt, ending in a validated, decoding body.
    async fn establish(&self) -> Result<Body> {
        let last_event_id = self.shared.last_event_id();
        let request = build_request(&self.config, &last_event_id)?;

        let response = timeout(self.config.connect_timeout, self.connector.connect(request))
            .await
            .map_err(|_| Error::timeout(self.config.connect_timeout))?
            .map_err(Error::Transport)?;
        check_response(&response)?;

        let scanner = match self.config.max_line_length {
            Some(limit) => LineScanner::with_max_line(limit),
            None => LineScanner::new(),
        };
        Ok(Decoder::with_scanner(response.into_body(), scanner)
            .resume_from(last_event_id)
            .retry(self.shared.retry()))
    }

    /// The long-lived background task.
    async fn run(self, mut body: Body) {
        loop {
            let exit = self.pump(&mut body).await;
            // A `retry:` in a record that never dispatched lands here.
            self.shared.set_retry(body.retry_interval());
            drop(body);

            match exit {
                Exit::Stopped => break,
                Exit::Dropped => match self.reconnect().await {
                    Some(next) => body = next,
                    None => break,
                },
            }
        }
        self.finish();
    }

    /// Forward events until the stream ends or the source is stopped.
    async fn pump(&self, body: &mut Body) -> Exit {
        loop {
            let item = tokio::select! {
                biased;
                () = self.interrupted() => return Exit::Stopped,
                item = body.next() => item,
            };
            self.shared.set_retry(body.retry_interval());

            let event = match item {
                Some(Ok(event)) => event,
                Some(Err(err)) => {
                    warn!(url = %self.config.url, error = %err, "SSE stream error");
                    return Exit::Dropped;
                }
                None => {
                    warn!(url = %self.config.url, "SSE stream ended");
                    return Exit::Dropped;
                }
            };

            self.shared.commit_event_id(event.id());
            debug!(
                event_type = %event.event_type(),
                id = %event.id(),
                len = event.data().len(),
                "SSE event received",
            );

            tokio::select! {
                biased;
                () = self.shared.cancel.cancelled() => return Exit::Stopped,
                sent = self.events.send(event) => {
                    if sent.is_err() {
                        info!("SSE consumer dropped, shutting down");
                        return Exit::Stopped;
                    }
                }
            }
        }
    }

    /// Wait out the retry interval and reconnect, repeating on transient
    /// failures. `None` means the source must close.
    async fn reconnect(&self) -> Option<Body> {
        let mut attempt: u32 = 0;
        loop {
            if let Some(max) = self.config.reconnect_max_attempts
                && attempt >= max
            {
                error!(attempts = max, "Max SSE reconnect attempts exceeded");
                return None;
            }
            attempt = attempt.saturating_add(1);

            // Captured once: a `retry` change lands on the following attempt.
            let delay = self.shared.retry();
            self.shared.transition(ReadyState::Connecting);
            warn!(
                url = %self.config.url,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "SSE reconnecting after retry interval"
            );

            let attempted = tokio::select! {
                biased;
                () = self.interrupted() => return None,
                result = async {
                    sleep(delay).await;
                    self.establish().await
                } => result,
            };

            match attempted {
                Ok(body) => {
                    self.shared.transition(ReadyState::Open);
                    info!(url = %self.config.url, attempt, "SSE connection re-established");
                    return Some(body);
                }
                Err(err) if err.is_permanent() => {
                    error!(url = %self.config.url, error = %err, "SSE reconnect rejected");
                    return None;
                }
                Err(err) => {
                    warn!(url = %self.config.url, attempt, error = %err, "SSE reconnect failed");
                }
            }
        }
    }

    /// Publish `Closed`, then close the queue by dropping the sender.
    fn finish(self) {
        self.shared.state.send_replace(ReadyState::Closed);
        info!(url = %self.config.url, "SSE connection closed");
    }
}
