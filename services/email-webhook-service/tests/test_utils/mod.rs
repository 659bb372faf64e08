//! Test utilities for integration tests
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use axum::{
    body::{to_bytes, Body},
    http::Request,
    Router,
};
use common::config::{LangflowConfig, ServiceConfig};
use common::{ServiceError, ServiceResult};
use email_webhook_service::dispatcher::{DispatchQueue, DispatchRequest};
use email_webhook_service::{app, AppState, SERVICE_NAME};

/// Records submitted requests instead of sending them.
#[derive(Default)]
pub struct RecordingQueue {
    requests: Mutex<Vec<DispatchRequest>>,
}

impl RecordingQueue {
    pub fn take(&self) -> Vec<DispatchRequest> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

impl DispatchQueue for RecordingQueue {
    fn submit(&self, request: DispatchRequest) -> ServiceResult<()> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}

/// Rejects every request, like a dispatcher whose worker has stopped.
pub struct FailingQueue;

impl DispatchQueue for FailingQueue {
    fn submit(&self, _request: DispatchRequest) -> ServiceResult<()> {
        Err(ServiceError::Internal(anyhow!("dispatch worker is not running")))
    }
}

/// Panics on submit, standing in for a bug anywhere in the handler.
pub struct PanickingQueue;

impl DispatchQueue for PanickingQueue {
    fn submit(&self, _request: DispatchRequest) -> ServiceResult<()> {
        panic!("queue exploded");
    }
}

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        service_name: SERVICE_NAME.to_string(),
        host: "127.0.0.1".to_string(),
        port: 8000,
        log_level: "info".to_string(),
        max_body_bytes: 1024 * 1024,
        langflow: LangflowConfig {
            api_url: "http://langflow:7860".to_string(),
            endpoint: "email-agent".to_string(),
            api_key: Some("test-key".to_string()),
        },
    }
}

/// Router wired to a [`RecordingQueue`] the test can inspect.
pub fn test_app() -> (Router, Arc<RecordingQueue>) {
    test_app_with_config(test_config())
}

pub fn test_app_with_config(config: ServiceConfig) -> (Router, Arc<RecordingQueue>) {
    let queue = Arc::new(RecordingQueue::default());
    let state = AppState {
        config,
        dispatcher: queue.clone(),
    };
    (app(state), queue)
}

pub fn failing_app() -> Router {
    app(AppState {
        config: test_config(),
        dispatcher: Arc::new(FailingQueue),
    })
}

pub fn panicking_app() -> Router {
    app(AppState {
        config: test_config(),
        dispatcher: Arc::new(PanickingQueue),
    })
}

/// A multipart POST to `/webhook` with one text part per field.
pub fn multipart_request(boundary: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            boundary, name, value
        ));
    }
    body.push_str(&format!("--{}--\r\n", boundary));
    Request::builder()
        .uri("/webhook")
        .method("POST")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

/// A urlencoded POST to `/webhook`.
pub fn webhook_request(fields: &[(&str, &str)]) -> Request<Body> {
    let body = serde_urlencoded::to_string(fields).unwrap();
    Request::builder()
        .uri("/webhook")
        .method("POST")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub const INITIAL_EMAIL: &[(&str, &str)] = &[
    ("to", "travel-agent@yourdomain.com"),
    ("from", "traveler@example.com"),
    ("subject", "Orlando Day Trip - Lake Eola Ideas?"),
    (
        "text",
        "Hi there! Planning a one-day trip to Orlando soon and want to focus \
         on the Lake Eola area. Could you suggest a possible itinerary? \
         Looking for things to do, maybe a nice lunch spot? Thanks!",
    ),
    (
        "headers",
        "Received: by 1.2.3.4 with HTTP; Mon, 05 Aug 2024 09:00:00 -0400\r\n\
         Date: Mon, 05 Aug 2024 09:00:00 -0400\r\n\
         Message-ID: <orlando.request.abc@example.com>\r\n\
         From: Traveler <traveler@example.com>\r\n\
         To: Travel Agent <travel-agent@yourdomain.com>\r\n\
         Subject: Orlando Day Trip - Lake Eola Ideas?\r\n\
         Content-Type: text/plain; charset=\"UTF-8\"\r\n\
         \r\n",
    ),
    ("attachments", "0"),
];

pub const FIRST_REPLY: &[(&str, &str)] = &[
    ("to", "travel-agent@yourdomain.com"),
    ("from", "traveler@example.com"),
    ("subject", "Re: Orlando Day Trip - Lake Eola Ideas?"),
    (
        "text",
        "Thanks for the suggestions! The swan boats sound fun, and the farmer's \
         market on Sunday is a possibility if my trip aligns. For lunch, I \
         prefer something casual with outdoor seating if possible. Any specific \
         recommendations near the park?\n\n\
         On Mon, Aug 5, 2024 at 10:30 AM Travel Agent <travel-agent@yourdomain.com> wrote:\n\
         >\n> Hi Traveler,\n>\n\
         > Great choice! For Lake Eola, you could start with a walk around the lake...\n>\n\
         > Let me know if you'd like more details!\n>\n\
         > Best,\n> Travel Agent",
    ),
    (
        "headers",
        "Received: by 5.6.7.8 with HTTP; Mon, 05 Aug 2024 11:00:00 -0400\r\n\
         Date: Mon, 05 Aug 2024 11:00:00 -0400\r\n\
         Message-ID: <traveler.reply1.ghi@example.com>\r\n\
         In-Reply-To: <agent.lakeeola.reply1.def@yourdomain.com>\r\n\
         References: <orlando.request.abc@example.com> <agent.lakeeola.reply1.def@yourdomain.com>\r\n\
         From: Traveler <traveler@example.com>\r\n\
         To: Travel Agent <travel-agent@yourdomain.com>\r\n\
         Subject: Re: Orlando Day Trip - Lake Eola Ideas?\r\n\
         Content-Type: text/plain; charset=\"UTF-8\"\r\n\
         \r\n",
    ),
    ("attachments", "0"),
];

pub const SECOND_REPLY: &[(&str, &str)] = &[
    ("to", "travel-agent@yourdomain.com"),
    ("from", "traveler@example.com"),
    ("subject", "Re: Orlando Day Trip - Lake Eola Ideas?"),
    (
        "text",
        "Perfect, that casual spot sounds great! One last thing - what's usually \
         the best time of day to do the swan boats to avoid crowds or long waits?\n\n\
         On Mon, Aug 5, 2024 at 11:45 AM Travel Agent <travel-agent@yourdomain.com> wrote:\n\
         >\n> For casual with outdoor seating near Lake Eola, check out Relax Grill. \
         It's right on the lake.\n>\n\
         > > On Mon, Aug 5, 2024 at 11:00 AM Traveler <traveler@example.com> wrote:\n\
         > >\n> > Thanks for the suggestions! ... Any specific recommendations near the park?\n\
         > >\n> > > On Mon, Aug 5, 2024 at 10:30 AM Travel Agent <travel-agent@yourdomain.com> wrote:\n\
         > > > ...\n> \n\
         > Hope this helps!\n> Travel Agent",
    ),
    (
        "headers",
        "Received: by 9.10.11.12 with HTTP; Mon, 05 Aug 2024 12:00:00 -0400\r\n\
         Date: Mon, 05 Aug 2024 12:00:00 -0400\r\n\
         Message-ID: <traveler.reply2.mno@example.com>\r\n\
         In-Reply-To: <agent.lakeeola.reply2.jkl@yourdomain.com>\r\n\
         References: <orlando.request.abc@example.com> <agent.lakeeola.reply1.def@yourdomain.com> <agent.lakeeola.reply2.jkl@yourdomain.com>\r\n\
         From: Traveler <traveler@example.com>\r\n\
         To: Travel Agent <travel-agent@yourdomain.com>\r\n\
         Subject: Re: Orlando Day Trip - Lake Eola Ideas?\r\n\
         Content-Type: text/plain; charset=\"UTF-8\"\r\n\
         \r\n",
    ),
    ("attachments", "0"),
];
