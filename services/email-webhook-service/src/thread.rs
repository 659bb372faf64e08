//! Thread identification from email threading headers.

use std::fmt;
use std::sync::OnceLock;

use mailparse::MailHeaderMap;
use regex::Regex;
use tracing::{debug, warn};

use crate::text::normalize;

/// Threading headers of one message.  Identifiers carry no angle brackets.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedHeaders {
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
}

impl ParsedHeaders {
    /// Reads the header section of `raw`.  Never fails: a block `mailparse`
    /// rejects is re-read line by line and keeps whatever headers survive.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        let parsed = match mailparse::parse_headers(raw.as_bytes()) {
            Ok((headers, _)) => Self::from_values(
                headers.get_first_value("Message-ID"),
                headers.get_first_value("In-Reply-To"),
                headers.get_first_value("References"),
            ),
            Err(err) => {
                warn!("Header block rejected by parser, scanning leniently: {}", err);
                let fields = scan_fields(raw);
                let lookup = |name: &str| {
                    fields
                        .iter()
                        .find(|(key, _)| key.eq_ignore_ascii_case(name))
                        .map(|(_, value)| value.clone())
                };
                Self::from_values(
                    lookup("Message-ID"),
                    lookup("In-Reply-To"),
                    lookup("References"),
                )
            }
        };
        debug!(
            message_id = ?parsed.message_id,
            in_reply_to = ?parsed.in_reply_to,
            references = ?parsed.references,
            "Parsed threading headers"
        );
        parsed
    }

    fn from_values(
        message_id: Option<String>,
        in_reply_to: Option<String>,
        references: Option<String>,
    ) -> Self {
        let first_id = |value: Option<String>| {
            value.and_then(|value| extract_message_ids(&value).into_iter().next())
        };
        Self {
            message_id: first_id(message_id),
            in_reply_to: first_id(in_reply_to),
            references: references
                .map(|value| extract_message_ids(&value))
                .unwrap_or_default(),
        }
    }
}

/// Which input produced the thread id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadSource {
    References,
    InReplyTo,
    MessageId,
    Sender,
    Placeholder,
}

impl fmt::Display for ThreadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ThreadSource::References => "References",
            ThreadSource::InReplyTo => "In-Reply-To",
            ThreadSource::MessageId => "Message-ID",
            ThreadSource::Sender => "sender",
            ThreadSource::Placeholder => "placeholder",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadResolution {
    pub thread_id: String,
    pub source: ThreadSource,
}

/// Picks the thread id: root of `References`, then `In-Reply-To`, then the
/// message's own `Message-ID`, then the sender address.  Never empty.
pub fn resolve(headers: &ParsedHeaders, sender: &str) -> ThreadResolution {
    let from_headers = headers
        .references
        .first()
        .map(|id| (id.clone(), ThreadSource::References))
        .or_else(|| {
            headers
                .in_reply_to
                .clone()
                .map(|id| (id, ThreadSource::InReplyTo))
        })
        .or_else(|| {
            headers
                .message_id
                .clone()
                .map(|id| (id, ThreadSource::MessageId))
        });

    if let Some((thread_id, source)) = from_headers {
        return ThreadResolution { thread_id, source };
    }

    let sender = normalize(sender);
    if !sender.is_empty() {
        warn!("Could not determine thread ID from headers, falling back to sender");
        return ThreadResolution {
            thread_id: sender,
            source: ThreadSource::Sender,
        };
    }

    warn!("No threading headers and no sender, using placeholder thread ID");
    ThreadResolution {
        thread_id: "unknown_thread_unknown".to_string(),
        source: ThreadSource::Placeholder,
    }
}

/// Thread id for a raw header block and sender.
pub fn resolve_thread(headers_text: &str, sender: &str) -> String {
    resolve(&ParsedHeaders::parse(headers_text), sender).thread_id
}

fn bracketed_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([^<>]*)>").expect("valid message id regex"))
}

/// Message ids in header order, brackets removed.  Falls back to bare
/// whitespace separated tokens when the value has no `<...>` ids.
pub fn extract_message_ids(value: &str) -> Vec<String> {
    let bracketed: Vec<String> = bracketed_id()
        .captures_iter(value)
        .map(|caps| caps[1].trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    if !bracketed.is_empty() {
        return bracketed;
    }

    value
        .split_whitespace()
        .map(|token| token.trim_matches(|ch| matches!(ch, '<' | '>' | ',' | ';')))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// `Name: value` pairs from a header section, unfolding continuation lines
/// and skipping lines that are not headers.  Stops at the first blank line.
fn scan_fields(raw: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    let mut continuing = false;
    for line in raw.lines() {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            if continuing {
                if let Some((_, value)) = fields.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
            }
            continue;
        }
        continuing = match line.split_once(':') {
            Some((name, value)) if is_field_name(name) => {
                fields.push((name.to_string(), value.trim().to_string()));
                true
            }
            _ => false,
        };
    }
    fields
}

fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|ch| ch.is_ascii_graphic() && ch != ':')
}
