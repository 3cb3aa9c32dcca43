//! Byte constants shared by the scanner and the decoder.

use core::time::Duration;

use bytes_utils::Str;

pub(crate) const LF: u8 = b'\n';
pub(crate) const CR: u8 = b'\r';
pub(crate) const COLON: u8 = b':';

const BOM_CHAR: char = '\u{FEFF}';
const BOM_LEN: usize = BOM_CHAR.len_utf8();
/// UTF-8 encoding of U+FEFF, skipped once at the very start of a stream.
pub(crate) const BOM: &[u8; BOM_LEN] = &{
    let mut buf = [0u8; BOM_LEN];
    BOM_CHAR.encode_utf8(&mut buf);
    buf
};

pub(crate) const EMPTY_STR: Str = Str::from_static("");

/// Event type reported for records without an `event:` field.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// Reconnection delay used until the server sends a `retry:` field.
pub const DEFAULT_RETRY: Duration = Duration::from_millis(3000);
