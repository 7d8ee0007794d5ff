use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tier_admin_core::{
    AdminClient, ClientConfig, HttpRequest, HttpResponse, Session, Transport, TransportError,
};

pub const BASE_URL: &str = "http://localhost:3000/api";

/// Replays queued responses in order and records every request it sees.
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<HttpRequest>>,
    replies: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
}

impl RecordingTransport {
    pub fn reply(&self, status: u16, body: serde_json::Value) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }));
        self
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(TransportError(message.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests().pop().expect("no request was sent")
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("no reply queued")
    }
}

pub fn client(token: Option<&str>) -> (AdminClient<Arc<RecordingTransport>>, Arc<RecordingTransport>) {
    let session = Session::in_memory();
    if let Some(token) = token {
        session.set_token(token).unwrap();
    }
    let transport = Arc::new(RecordingTransport::default());
    let client = AdminClient::new(&ClientConfig::new(BASE_URL), Arc::new(session), transport.clone());
    (client, transport)
}

pub fn body_json(request: &HttpRequest) -> serde_json::Value {
    serde_json::from_str(request.body.as_deref().expect("request has no body")).unwrap()
}
