//! NNTP command builders and response-line parsing

use crate::error::{RefreshError, Result};
use crate::response::NntpResponse;

/// Build HEAD command
pub fn head(id: &str) -> String {
    format!("HEAD {}\r\n", id)
}

/// Build ARTICLE command
pub fn article(id: &str) -> String {
    format!("ARTICLE {}\r\n", id)
}

/// Build POST command
pub fn post() -> &'static str {
    "POST\r\n"
}

/// Build IHAVE command (RFC 3977 §6.3.2)
pub fn ihave(message_id: &str) -> String {
    format!("IHAVE {}\r\n", message_id)
}

/// Build CAPABILITIES command (RFC 3977 §5.2)
///
/// Response is multi-line, starting with 101.
pub fn capabilities() -> &'static str {
    "CAPABILITIES\r\n"
}

/// Build AUTHINFO USER command
pub fn authinfo_user(username: &str) -> String {
    format!("AUTHINFO USER {}\r\n", username)
}

/// Build AUTHINFO PASS command
pub fn authinfo_pass(password: &str) -> String {
    format!("AUTHINFO PASS {}\r\n", password)
}

/// Build DATE command (RFC 3977 §7.1)
///
/// Used as a cheap liveness probe for pooled connections.
pub fn date() -> &'static str {
    "DATE\r\n"
}

/// Build QUIT command
pub fn quit() -> &'static str {
    "QUIT\r\n"
}

/// Wrap a message-id in angle brackets unless it already carries them.
///
/// NZB files store message-ids without the brackets the wire format requires.
pub fn bracketed(message_id: &str) -> String {
    if message_id.starts_with('<') && message_id.ends_with('>') {
        message_id.to_string()
    } else {
        format!("<{}>", message_id)
    }
}

/// Parse NNTP response line into code and message
pub fn parse_response_line(line: &str) -> Result<(u16, String)> {
    // Strip UTF-8 BOM if present (some broken servers/proxies add it)
    let line = line.trim_start_matches('\u{FEFF}');

    let bytes = line.as_bytes();
    if bytes.len() < 3
        || !bytes[0].is_ascii_digit()
        || !bytes[1].is_ascii_digit()
        || !bytes[2].is_ascii_digit()
    {
        return Err(RefreshError::InvalidResponse(
            line.chars().take(100).collect(),
        ));
    }

    // A fourth digit means a malformed code like "99999", not "999" + message
    if bytes.len() > 3 && bytes[3].is_ascii_digit() {
        return Err(RefreshError::InvalidResponse(
            line.chars().take(100).collect(),
        ));
    }

    let code = line[0..3]
        .parse::<u16>()
        .map_err(|_| RefreshError::InvalidResponse(line.chars().take(100).collect()))?;

    let message = if line.len() > 3 {
        if bytes[3] == b' ' {
            line[4..].to_string()
        } else {
            line[3..].to_string()
        }
    } else {
        String::new()
    };

    Ok((code, message))
}

/// Parse single-line NNTP response
pub fn parse_single_response(line: &str) -> Result<NntpResponse> {
    let (code, message) = parse_response_line(line)?;

    Ok(NntpResponse {
        code,
        message,
        lines: vec![],
    })
}
