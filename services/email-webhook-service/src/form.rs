//! Extractor for the provider's inbound-parse POST.
//!
//! The provider posts either `application/x-www-form-urlencoded` or
//! `multipart/form-data`.  Both are read into the same field map; multipart
//! parts that carry a file name are counted as attachments and dropped.

use std::collections::HashMap;

use anyhow::anyhow;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::Form;
use common::ServiceError;
use models::InboundEmail;
use tracing::{debug, warn};

/// An [`InboundEmail`] read from form data.
#[derive(Debug)]
pub struct InboundForm(pub InboundEmail);

#[axum::async_trait]
impl<S> FromRequest<S> for InboundForm
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let fields = if is_multipart(&req) {
            read_multipart(req, state).await?
        } else {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| rejection(e.status(), e.body_text()))?;
            FormFields::from_pairs(pairs)
        };
        fields.into_email().map(InboundForm)
    }
}

// Keeps the status axum chose for the rejection.
fn rejection(status: StatusCode, message: String) -> ServiceError {
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => ServiceError::PayloadTooLarge(message),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => ServiceError::UnsupportedMediaType(message),
        status if status.is_server_error() => ServiceError::Internal(anyhow!(message)),
        _ => ServiceError::BadRequest(message),
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().starts_with("multipart/form-data"))
}

async fn read_multipart<S>(req: Request, state: &S) -> Result<FormFields, ServiceError>
where
    S: Send + Sync,
{
    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(|e| rejection(e.status(), e.body_text()))?;

    let mut fields = FormFields::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| rejection(e.status(), e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if let Some(file_name) = field.file_name() {
            debug!("Skipping attachment part {} ({})", name, file_name);
            fields.file_parts += 1;
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| rejection(e.status(), e.body_text()))?;
        fields
            .values
            .entry(name)
            .or_insert_with(|| String::from_utf8_lossy(&bytes).into_owned());
    }
    Ok(fields)
}

/// Text fields of one submission plus the number of file parts seen.
#[derive(Debug, Default)]
struct FormFields {
    values: HashMap<String, String>,
    file_parts: usize,
}

impl FormFields {
    // First occurrence of a repeated field wins.
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut values = HashMap::new();
        for (key, value) in pairs {
            values.entry(key).or_insert(value);
        }
        Self {
            values,
            file_parts: 0,
        }
    }

    fn into_email(mut self) -> Result<InboundEmail, ServiceError> {
        let to = self.required("to")?;
        let sender = self.required("from")?;
        let declared = self
            .values
            .remove("attachments")
            .map(|value| match value.trim().parse::<usize>() {
                Ok(count) => count,
                Err(_) => {
                    warn!("Ignoring non-numeric attachments field: {:?}", value);
                    0
                }
            })
            .unwrap_or(0);

        Ok(InboundEmail {
            to,
            sender,
            subject: self.values.remove("subject").unwrap_or_default(),
            text: self.values.remove("text").unwrap_or_default(),
            headers: self.values.remove("headers").unwrap_or_default(),
            attachments: declared.max(self.file_parts),
        })
    }

    fn required(&mut self, key: &str) -> Result<String, ServiceError> {
        self.values
            .remove(key)
            .ok_or_else(|| ServiceError::InvalidForm(format!("missing form field `{}`", key)))
    }
}
