//! Separates the newly written part of a plain-text email from the quoted
//! history below it.
//!
//! The body is scanned top-down and cut at the first quoted-history marker:
//!
//! - a line whose first non-blank character is `>` (any nesting depth)
//! - an attribution line such as `On Mon, Aug 5, 2024 at 10:30 AM Bob wrote:`,
//!   also when the client wrapped it over a few lines
//! - an Outlook `-----Original Message-----` separator
//! - an Outlook header block (`From:` followed by `Sent:` or `Date:`)
//! - a bare `... wrote:` line directly above a `>` block
//!
//! What survives is then cut again at a trailing signature: a `--` or `__`
//! delimiter line, or a `Sent from my ...` line, when text remains above it.

use std::sync::OnceLock;

use regex::Regex;

use crate::text::normalize;

/// How many lines an attribution may be wrapped over.
const MAX_ATTRIBUTION_LINES: usize = 3;

fn attribution_start() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*on\s").expect("valid attribution regex"))
}

fn attribution_end() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bwrote:\s*$").expect("valid attribution regex"))
}

fn original_message() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*-{2,}\s*original message\s*-{2,}\s*$").expect("valid separator regex")
    })
}

fn signature_delimiter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(--|__|sent from my (\w+\s*){1,3})\s*$").expect("valid signature regex")
    })
}

fn outlook_field() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*\*?(from|sent|date):\*?\s").expect("valid field regex"))
}

/// Returns the normalized reply text, or an empty string when the body holds
/// nothing but quoted history.
pub fn extract_reply(body: &str) -> String {
    let lines: Vec<&str> = body.lines().collect();
    let end = quote_start(&lines).unwrap_or(lines.len());
    let end = signature_start(&lines[..end]).unwrap_or(end);
    normalize(&lines[..end].join("\n"))
}

/// Index of the lowest signature delimiter that has text above it.
fn signature_start(lines: &[&str]) -> Option<usize> {
    (1..lines.len()).rev().find(|&index| {
        signature_delimiter().is_match(lines[index])
            && lines[..index].iter().any(|line| !line.trim().is_empty())
    })
}

/// Index of the first line that belongs to quoted history.
fn quote_start(lines: &[&str]) -> Option<usize> {
    (0..lines.len()).find(|&index| is_quote_marker(lines, index))
}

fn is_quote_marker(lines: &[&str], index: usize) -> bool {
    let line = lines[index];
    line.trim_start().starts_with('>')
        || original_message().is_match(line)
        || is_attribution(lines, index)
        || is_outlook_header(lines, index)
        || is_bare_attribution(lines, index)
}

fn is_attribution(lines: &[&str], index: usize) -> bool {
    if !attribution_start().is_match(lines[index]) {
        return false;
    }
    let last = (index + MAX_ATTRIBUTION_LINES).min(lines.len());
    let mut joined = String::new();
    for line in &lines[index..last] {
        if line.trim().is_empty() || line.trim_start().starts_with('>') {
            break;
        }
        joined.push(' ');
        joined.push_str(line.trim());
        if attribution_end().is_match(&joined) {
            return true;
        }
    }
    false
}

// `Bob <bob@example.com> wrote:` with no leading "On", followed by quotes.
fn is_bare_attribution(lines: &[&str], index: usize) -> bool {
    attribution_end().is_match(lines[index])
        && lines[index + 1..]
            .iter()
            .find(|next| !next.trim().is_empty())
            .is_some_and(|next| next.trim_start().starts_with('>'))
}

fn is_outlook_header(lines: &[&str], index: usize) -> bool {
    let line = lines[index].trim_start().trim_start_matches('*');
    if !line.to_ascii_lowercase().starts_with("from:") {
        return false;
    }
    lines[index + 1..]
        .iter()
        .find(|next| !next.trim().is_empty())
        .and_then(|next| outlook_field().captures(next))
        .is_some_and(|caps| !caps[1].eq_ignore_ascii_case("from"))
}
