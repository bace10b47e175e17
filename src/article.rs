//! In-memory article representation
//!
//! An article is a header block plus a byte body. This tool relays articles
//! authored by third parties, so headers are kept as an order- and
//! case-preserving multi-valued map rather than a fixed RFC 5536 struct:
//! whatever the source provider returned is carried through untouched until
//! the repost rewrite.

use crate::error::{RefreshError, Result};

/// Headers that survive the repost rewrite; everything else is dropped
const REPOST_HEADERS: [&str; 6] = ["From", "Subject", "Newsgroups", "Message-Id", "Date", "Path"];

/// Path value replacing the source provider's transit path on repost
const REPOST_PATH: &str = "not-for-mail";

/// Article header block
///
/// Names preserve the case the server sent but compare case-insensitively,
/// and a name may carry several values (e.g., repeated `Received` headers).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    /// Create an empty header block
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`, compared case-insensitively
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(|v| v.as_str())
    }

    /// All values for `name`, compared case-insensitively
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// Check whether `name` is present, compared case-insensitively
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Replace every value of `name` with a single value, keeping the
    /// original position and spelling if the header already exists
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, values)) => {
                values.clear();
                values.push(value);
            }
            None => self.entries.push((name.to_string(), vec![value])),
        }
    }

    /// Append a value for `name`, creating the header if needed
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, values)) => values.push(value.into()),
            None => self.entries.push((name.to_string(), vec![value.into()])),
        }
    }

    /// Iterate over `(name, values)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(n, values)| (n.as_str(), values.as_slice()))
    }

    /// Number of distinct header names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the block has no headers
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only headers whose name appears in `keep` (case-insensitive)
    fn retain_names(&mut self, keep: &[&str]) {
        self.entries
            .retain(|(n, _)| keep.iter().any(|k| k.eq_ignore_ascii_case(n)));
    }
}

/// Parse a header block from decoded lines
///
/// Lines starting with space or tab are RFC 5322 folded continuations and
/// are appended to the previous header's value.
pub fn parse_headers(lines: &[String]) -> Result<Headers> {
    let mut headers = Headers::new();
    let mut last_name: Option<String> = None;

    for line in lines {
        if line.is_empty() {
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            // Folded continuation of the previous header
            let name = last_name.as_deref().ok_or_else(|| {
                RefreshError::InvalidResponse(format!("continuation without header: {}", line))
            })?;
            if let Some((_, values)) = headers
                .entries
                .iter_mut()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
            {
                if let Some(last) = values.last_mut() {
                    last.push(' ');
                    last.push_str(line.trim_start());
                }
            }
            continue;
        }

        let (name, value) = line.split_once(':').ok_or_else(|| {
            RefreshError::InvalidResponse(format!("malformed header line: {}", line))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(RefreshError::InvalidResponse(format!(
                "malformed header line: {}",
                line
            )));
        }
        headers.append(name, value.trim_start());
        last_name = Some(name.to_string());
    }

    Ok(headers)
}

/// A Usenet article: headers plus byte body
///
/// Articles are immutable once fetched; [`Article::prepared_for_post`]
/// produces the rewritten deep copy the reposter sends, so rewrites are
/// never visible across repost targets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Article {
    /// Header block
    pub headers: Headers,
    /// Body bytes with CRLF line endings, dot-stuffing removed
    pub body: Vec<u8>,
}

impl Article {
    /// Create an article from parts
    pub fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Parse an article from wire bytes (header block, blank line, body)
    ///
    /// The input is the payload of a 220 ARTICLE response with dot-stuffing
    /// already removed and CRLF line endings preserved.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (header_bytes, body) = match find_blank_line(data) {
            Some((header_end, body_start)) => (&data[..header_end], data[body_start..].to_vec()),
            // No blank line: header-only article
            None => (data, Vec::new()),
        };

        let header_text = String::from_utf8_lossy(header_bytes);
        let lines: Vec<String> = header_text.lines().map(|l| l.to_string()).collect();
        let headers = parse_headers(&lines)?;

        Ok(Self { headers, body })
    }

    /// Message-Id header value, if present
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("Message-Id")
    }

    /// Deep copy rewritten for re-posting
    ///
    /// Headers are reduced to the minimum acceptable set (`From`, `Subject`,
    /// `Newsgroups`, `Message-Id`, `Date`, `Path`), `Path` is replaced with
    /// `not-for-mail` and `Date` with the current time in RFC 1123 format
    /// with a numeric zone. The body is carried unchanged.
    pub fn prepared_for_post(&self) -> Article {
        let mut copy = self.clone();
        copy.headers.retain_names(&REPOST_HEADERS);
        copy.headers.set("Path", REPOST_PATH);
        copy.headers.set(
            "Date",
            chrono::Utc::now()
                .format("%a, %d %b %Y %H:%M:%S %z")
                .to_string(),
        );
        copy
    }

    /// Serialize to the wire format POST and IHAVE expect
    ///
    /// CRLF line endings throughout; body lines starting with `.` are
    /// dot-stuffed. The terminating `.` line is sent by the client, not
    /// included here.
    pub fn serialize_for_posting(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(512 + self.body.len());

        for (name, values) in self.headers.iter() {
            for value in values {
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b": ");
                out.extend_from_slice(value.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
        }
        out.extend_from_slice(b"\r\n");

        for line in body_lines(&self.body) {
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }

        out
    }
}

/// Locate the blank line separating headers from body.
///
/// Returns `(header_end, body_start)` byte offsets. Tolerates bare-LF
/// separators from non-conforming servers.
fn find_blank_line(data: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((pos, pos + 4));
    }
    data.windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| (pos, pos + 2))
}

/// Iterate body lines without their terminators
fn body_lines(body: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut pieces: Vec<&[u8]> = if body.is_empty() {
        Vec::new()
    } else {
        body.split(|&b| b == b'\n').collect()
    };
    // A trailing terminator yields one empty trailing piece; drop it
    if body.ends_with(b"\n") {
        pieces.pop();
    }
    pieces
        .into_iter()
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}
