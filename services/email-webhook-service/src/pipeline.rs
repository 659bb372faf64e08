//! Turns one inbound email into a run request for the flow API.

use anyhow::anyhow;
use common::config::LangflowConfig;
use common::{ServiceError, ServiceResult};
use models::{InboundEmail, RunRequest};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::{debug, info, warn};

use crate::dispatcher::DispatchRequest;
use crate::reply::extract_reply;
use crate::text::normalize;
use crate::thread::{self, ParsedHeaders, ThreadResolution};

/// Longest reply, in characters, forwarded downstream.
pub const MAX_REPLY_CHARS: usize = 15_000;
pub const TRUNCATION_MARKER: &str = "... (truncated)";

/// The cleaned fields of an email, ready to be rendered into a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedEmail {
    pub to: String,
    pub sender: String,
    pub subject: String,
    pub thread: ThreadResolution,
    pub reply_text: String,
}

impl PreparedEmail {
    pub fn from_inbound(email: &InboundEmail) -> Self {
        let to = normalize(&email.to);
        let sender = normalize(&email.sender);
        let subject = normalize(&email.subject);

        let mut reply_text = extract_reply(&email.text);
        if reply_text.is_empty() {
            warn!("Could not extract reply, falling back to full text.");
            reply_text = normalize(&email.text);
        } else {
            info!("Extracted reply text (length: {})", reply_text.chars().count());
        }

        let thread = thread::resolve(&ParsedHeaders::parse(&email.headers), &sender);
        info!("Using Thread ID: {} (from {})", thread.thread_id, thread.source);

        Self {
            to,
            sender,
            subject,
            thread,
            reply_text: truncate_reply(reply_text),
        }
    }

    /// Context header followed by the reply, as the flow receives it.
    pub fn input_value(&self) -> String {
        format!(
            "From: {}\nTo: {}\nSubject: {}\nThread ID: {}\n\n{}",
            self.sender, self.to, self.subject, self.thread.thread_id, self.reply_text
        )
    }

    /// Chat run request keyed by the sender address.
    pub fn run_request(&self) -> RunRequest {
        RunRequest::chat(self.sender.clone(), self.input_value())
    }
}

/// Cuts `text` to [`MAX_REPLY_CHARS`] characters and marks the cut.
pub fn truncate_reply(text: String) -> String {
    match text.char_indices().nth(MAX_REPLY_CHARS) {
        Some((cut, _)) => {
            warn!("Truncated long reply text to {} chars.", MAX_REPLY_CHARS);
            format!("{}{}", &text[..cut], TRUNCATION_MARKER)
        }
        None => text,
    }
}

/// Headers for a run request.  The API key value is flagged sensitive.
pub fn request_headers(api_key: Option<&str>) -> ServiceResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = api_key {
        let mut value = HeaderValue::from_str(key).map_err(|_| {
            ServiceError::Internal(anyhow!("LANGFLOW_API_KEY is not a valid header value"))
        })?;
        value.set_sensitive(true);
        headers.insert("x-api-key", value);
        debug!("Adding x-api-key header to Langflow request.");
    }
    Ok(headers)
}

/// Builds the downstream call for `email`.
pub fn build_dispatch(
    email: &InboundEmail,
    langflow: &LangflowConfig,
) -> ServiceResult<DispatchRequest> {
    let prepared = PreparedEmail::from_inbound(email);
    Ok(DispatchRequest {
        url: langflow.run_url(),
        headers: request_headers(langflow.api_key.as_deref())?,
        payload: prepared.run_request(),
    })
}
