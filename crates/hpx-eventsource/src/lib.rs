//! # hpx-eventsource
//!
//! A Server-Sent Events client: opens a long-lived `text/event-stream`
//! response, decodes it into [`Event`]s and reconnects when the stream
//! drops, honouring the server's `retry:` interval and replaying from the
//! last seen id via the `Last-Event-ID` header.
//!
//! ## Architecture
//!
//! ```text
//! EventSource::connect()
//!   ├─ first attempt on the caller's task (status + content-type checked)
//!   └─ tokio::spawn(driver) ──► Connector ──► Decoder ──► mpsc ──► Events
//!                                  ▲                                 │
//!                                  └──── sleep(retry) on drop ◄──────┘
//! ```
//!
//! - [`parse`]: I/O-free decoding ([`LineScanner`], [`Decoder`], [`Event`]).
//! - [`EventSource`] / [`EventSourceHandle`] / [`Events`]: the controller.
//! - [`Connector`]: the HTTP seam; [`HyperConnector`] is the default.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hpx_eventsource::{EventSource, ReadyState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut source = EventSource::open("http://127.0.0.1:8080/events").await?;
//!
//! while let Some(event) = source.next_event().await {
//!     println!("{} [{}]: {}", event.event_type(), event.id(), event.text());
//! }
//!
//! // The queue closed: either `close()` was called or the server refused us.
//! assert_eq!(source.ready_state(), ReadyState::Closed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
mod event_source;
pub mod parse;
mod ready_state;
pub mod transport;

pub use config::EventSourceConfig;
pub use error::{BoxError, Error, Result};
pub use event_source::{EventSource, EventSourceHandle, Events, LAST_EVENT_ID};
pub use parse::{DecodeError, Decoder, Event, LineScanner, LineTooLong, decode};
pub use ready_state::ReadyState;
pub use transport::{BodyStream, Connector, HyperConnector};
