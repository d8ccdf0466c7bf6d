//! Single-file `multipart/form-data` extraction.
//!
//! The body is scanned part by part. Each part is read in two states: header
//! lines until the blank separator line, then payload bytes up to the next
//! delimiter. The first part whose `Content-Disposition` carries a non-empty
//! `filename` wins; later file fields are ignored.
//!
//! Known constraints:
//! - payload bytes must not contain `--<boundary>`; the scan stops at the
//!   first occurrence.
//! - `Content-Transfer-Encoding` is not honored; payload bytes are returned
//!   as sent.
//! - a payload with no closing delimiter runs to the end of the body.

use tracing::debug;

/// The file part found in a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFile {
    pub filename: String,
    /// The form field name (`name="..."`), when present.
    pub field_name: Option<String>,
    /// The part's own `Content-Type` header, when present.
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

enum ScanState {
    Headers,
    Payload,
}

#[derive(Default)]
struct PartHeaders {
    filename: Option<String>,
    field_name: Option<String>,
    content_type: Option<String>,
}

/// Locate the first file-bearing part of `body` delimited by `boundary`.
///
/// Returns `None` for empty input, a boundary that never occurs, a body with
/// no file part, or a file part whose header block is never terminated.
pub fn extract_file(body: &[u8], boundary: &str) -> Option<MultipartFile> {
    if body.is_empty() || boundary.is_empty() {
        return None;
    }
    let delimiter = [b"--".as_slice(), boundary.as_bytes()].concat();
    let mut cursor = find(body, &delimiter, 0)? + delimiter.len();

    loop {
        // Close delimiter: no more parts.
        if body[cursor..].starts_with(b"--") {
            debug!("multipart: reached close delimiter without a file part");
            return None;
        }
        // Skip transport padding and the line break that ends the delimiter line.
        let (_, part_start) = next_line(body, cursor)?;
        let next_delimiter = find(body, &delimiter, part_start);
        let part_end = next_delimiter.unwrap_or(body.len());

        let mut state = ScanState::Headers;
        let mut headers = PartHeaders::default();
        let mut pos = part_start;

        loop {
            match state {
                ScanState::Headers => {
                    let Some((line, after)) = next_line(&body[..part_end], pos) else {
                        if headers.filename.is_some() {
                            debug!("multipart: file part has no header/payload separator");
                            return None;
                        }
                        break;
                    };
                    pos = after;
                    if line.is_empty() {
                        if headers.filename.is_none() {
                            break;
                        }
                        state = ScanState::Payload;
                    } else {
                        parse_header_line(line, &mut headers);
                    }
                }
                ScanState::Payload => {
                    let payload = strip_line_break(&body[pos..part_end], next_delimiter.is_some());
                    let filename = headers.filename.unwrap_or_default();
                    debug!(filename = %filename, size = payload.len(), "multipart: file part located");
                    return Some(MultipartFile {
                        filename,
                        field_name: headers.field_name,
                        content_type: headers.content_type,
                        content: payload.to_vec(),
                    });
                }
            }
        }

        cursor = next_delimiter? + delimiter.len();
    }
}

fn parse_header_line(line: &[u8], headers: &mut PartHeaders) {
    let line = String::from_utf8_lossy(line);
    let Some((name, value)) = line.split_once(':') else {
        return;
    };
    let name = name.trim();
    let value = value.trim();

    if name.eq_ignore_ascii_case("content-disposition") {
        for param in split_params(value).into_iter().skip(1) {
            let Some((key, raw)) = param.split_once('=') else {
                continue;
            };
            let parsed = unquote(raw.trim());
            match key.trim().to_ascii_lowercase().as_str() {
                "filename" if !parsed.is_empty() => headers.filename = Some(parsed),
                "name" => headers.field_name = Some(parsed),
                _ => {}
            }
        }
    } else if name.eq_ignore_ascii_case("content-type") && !value.is_empty() {
        headers.content_type = Some(value.to_string());
    }
}

/// Split a header value on `;`, leaving separators inside `"..."` alone.
/// A backslash inside quotes escapes the next character.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        // Only `\"` and `\\` are unescaped; other backslashes (Windows paths) stay.
        if c == '\\' {
            if let Some(next) = chars.next_if(|n| matches!(n, '"' | '\\')) {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Drop the line break that precedes the next delimiter.
fn strip_line_break(payload: &[u8], before_delimiter: bool) -> &[u8] {
    if !before_delimiter {
        return payload;
    }
    payload
        .strip_suffix(b"\r\n")
        .or_else(|| payload.strip_suffix(b"\n"))
        .unwrap_or(payload)
}

/// Return the line starting at `pos` (without its terminator) and the index
/// just past the terminator. Accepts CRLF or bare LF.
fn next_line(bytes: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = bytes.get(pos..)?;
    let newline = rest.iter().position(|&b| b == b'\n')?;
    let line = &rest[..newline];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Some((line, pos + newline + 1))
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| offset + from)
}
