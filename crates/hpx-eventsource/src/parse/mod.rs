//! `text/event-stream` decoding.
//!
//! Follows the parsing rules of the
//! [HTML Living Standard](https://html.spec.whatwg.org/multipage/server-sent-events.html#event-stream-interpretation):
//! [`LineScanner`] splits the body into lines, each line is classified as a
//! field, comment or blank line, and [`Decoder`] folds them into [`Event`]s.
//! Nothing here performs I/O.

pub(crate) mod constants;
pub mod decoder;
pub(crate) mod errors;
pub mod event;
pub(crate) mod line;
pub mod scanner;

pub use constants::{DEFAULT_EVENT_TYPE, DEFAULT_RETRY};
pub use decoder::{Decoder, decode};
pub use errors::DecodeError;
pub use event::Event;
pub use scanner::{LineScanner, LineTooLong};
