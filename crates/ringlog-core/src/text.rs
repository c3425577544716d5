//! Building, sanitizing and bounding log lines before they are appended.

use std::fmt;

use ringlog_types::MAX_LINE_WIDTH;

/// Replacement for bytes outside printable ASCII.
pub const PLACEHOLDER: u8 = b'^';

/// Upper bound on a formatted line before it is cut to the record width.
pub const MAX_FORMATTED_LEN: usize = MAX_LINE_WIDTH as usize + 100;

/// Returns `true` for bytes in `0x20..=0x7E`.
pub fn is_printable(byte: u8) -> bool {
    (0x20..=0x7e).contains(&byte)
}

/// Replace every byte outside printable ASCII with [`PLACEHOLDER`].
///
/// Works byte-wise: a multi-byte UTF-8 character becomes one placeholder
/// per byte, so the output has the same byte length as the input.
pub fn sanitize(text: &str) -> String {
    text.bytes()
        .map(|b| if is_printable(b) { b as char } else { PLACEHOLDER as char })
        .collect()
}

/// Sanitize `text` and cut it to at most `max_len` bytes.
pub fn bounded(text: &str, max_len: usize) -> String {
    let mut line = sanitize(text);
    line.truncate(max_len);
    line
}

/// Format, sanitize and bound a line.
///
/// ```
/// use ringlog_core::text::build_line;
///
/// assert_eq!(build_line(format_args!("temp={}\tC", 21)), "temp=21^C");
/// ```
pub fn build_line(args: fmt::Arguments<'_>) -> String {
    bounded(&fmt::format(args), MAX_FORMATTED_LEN)
}

/// Prefix `message` with a short `tag`, cutting the message so the
/// combined text fits in `line_width - 1` bytes.
///
/// The tag is never cut here; an oversized tag is truncated later by the
/// record encoder like any other payload.
pub fn tagged_line(tag: &str, message: &str, line_width: u32) -> String {
    let mut line = sanitize(tag);
    let limit = (line_width as usize).saturating_sub(1);
    let room = limit.saturating_sub(line.len());
    line.push_str(&bounded(message, room));
    line
}

/// Trim trailing bytes that are blank or outside printable ASCII.
pub fn trim_end(text: &str) -> &str {
    text.trim_end_matches(|c: char| c <= ' ' || c > '~')
}
