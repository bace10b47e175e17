//! NZB file parsing
//!
//! NZB is an XML index describing a Usenet binary post: one `<file>` per
//! posted file, each with the newsgroups it went to and one `<segment>`
//! (message-id) per article. The engine only interprets message-ids,
//! filenames and segment counts; everything else is carried for reporting.
//!
//! Reference: https://sabnzbd.org/wiki/extra/nzb-spec

use crate::error::{RefreshError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::Path;

/// Parsed NZB index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nzb {
    /// Metadata from the `<head>` section (title, password, tag, category)
    pub meta: HashMap<String, String>,
    /// Files described by this NZB, in document order
    pub files: Vec<NzbFile>,
}

/// One `<file>` entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NzbFile {
    /// Filename derived from the subject line
    pub filename: String,
    /// Poster name/email
    pub poster: String,
    /// Unix timestamp of posting
    pub date: i64,
    /// Subject line
    pub subject: String,
    /// Newsgroups this file was posted to
    pub groups: Vec<String>,
    /// Segments (articles) making up this file
    pub segments: Vec<NzbSegment>,
}

/// One `<segment>` entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NzbSegment {
    /// Segment size in bytes
    pub bytes: u64,
    /// Segment number (1-based)
    pub number: u32,
    /// Message-id for retrieving this segment (without angle brackets)
    pub message_id: String,
}

impl NzbFile {
    /// Number of segments declared for this file
    pub fn total_segments(&self) -> u64 {
        self.segments.len() as u64
    }
}

impl Nzb {
    /// Total number of segments across all files
    pub fn total_segments(&self) -> u64 {
        self.files.iter().map(|f| f.total_segments()).sum()
    }
}

/// Derive a filename from an NZB subject line.
///
/// Usenet subjects carry the filename in quotes, e.g.
/// `Some.Post [01/50] - "archive.part01.rar" yEnc (1/100)`.
fn filename_from_subject(subject: &str) -> Option<String> {
    let start = subject.find('"')?;
    let rest = &subject[start + 1..];
    let end = rest.find('"')?;
    let name = &rest[..end];
    (!name.is_empty()).then(|| name.to_string())
}

/// Parse an NZB document
///
/// An NZB without any `<file>` entries parses successfully; the run then
/// checks zero segments and reports empty statistics.
pub fn parse_nzb(xml: &str) -> Result<Nzb> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut nzb = Nzb::default();

    let mut in_head = false;
    let mut in_groups = false;
    let mut in_segments = false;
    let mut meta_type: Option<String> = None;
    let mut current_file: Option<NzbFile> = None;
    let mut pending_segment: Option<NzbSegment> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"head" => in_head = true,
                b"meta" if in_head => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"type" {
                            meta_type = Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                    }
                }
                b"file" => {
                    let mut file = NzbFile::default();
                    for attr in e.attributes().flatten() {
                        let value = attr.unescape_value().unwrap_or_default().to_string();
                        match attr.key.as_ref() {
                            b"poster" => file.poster = value,
                            b"date" => file.date = value.parse().unwrap_or(0),
                            b"subject" => file.subject = value,
                            _ => {}
                        }
                    }
                    current_file = Some(file);
                }
                b"groups" if current_file.is_some() => in_groups = true,
                b"segments" if current_file.is_some() => in_segments = true,
                b"segment" if in_segments => {
                    let mut segment = NzbSegment::default();
                    for attr in e.attributes().flatten() {
                        let value = String::from_utf8_lossy(&attr.value).to_string();
                        match attr.key.as_ref() {
                            b"bytes" => segment.bytes = value.parse().unwrap_or(0),
                            b"number" => segment.number = value.parse().unwrap_or(0),
                            _ => {}
                        }
                    }
                    pending_segment = Some(segment);
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if text.is_empty() {
                    // trim_text(true) suppresses whitespace-only events;
                    // an empty segment body still ends up here
                } else if let Some(ref key) = meta_type {
                    nzb.meta.insert(key.clone(), text);
                } else if in_groups {
                    if let Some(ref mut file) = current_file {
                        file.groups.push(text);
                    }
                } else if let Some(ref mut segment) = pending_segment {
                    segment.message_id = text;
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"head" => in_head = false,
                b"meta" => meta_type = None,
                b"groups" => in_groups = false,
                b"segments" => in_segments = false,
                b"segment" => {
                    if let (Some(file), Some(segment)) =
                        (current_file.as_mut(), pending_segment.take())
                    {
                        if !segment.message_id.is_empty() {
                            file.segments.push(segment);
                        }
                    }
                }
                b"file" => {
                    if let Some(mut file) = current_file.take() {
                        file.filename = filename_from_subject(&file.subject)
                            .unwrap_or_else(|| {
                                if file.subject.is_empty() {
                                    format!("file_{}", nzb.files.len() + 1)
                                } else {
                                    file.subject.clone()
                                }
                            });
                        nzb.files.push(file);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(RefreshError::Config(format!("NZB parse error: {}", e)));
            }
            _ => {}
        }

        buf.clear();
    }

    Ok(nzb)
}

/// Load and parse an NZB file from disk
pub fn load_nzb_file(path: &Path) -> Result<Nzb> {
    let xml = std::fs::read_to_string(path).map_err(|e| {
        RefreshError::Config(format!(
            "unable to load NZB file '{}': {}",
            path.display(),
            e
        ))
    })?;
    parse_nzb(&xml)
}
