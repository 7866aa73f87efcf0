// Test transport.
// A scriptable stand-in for the HTTP layer that records every outbound
// request and can hold responses open while callers pile up.

use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::watch;

use crate::client::transport::{OutboundRequest, Transport, WireResponse};
use crate::error::ErrorInfo;

type TransportResult = Result<WireResponse, ErrorInfo>;
type Responder = Box<dyn Fn(&OutboundRequest) -> TransportResult + Send + Sync>;

/// In-memory transport for tests.
///
/// Responses come from a responder closure keyed on the request; every
/// request is recorded before the responder runs, so held-open
/// requests are still visible to assertions.
pub struct MockTransport {
    responder: Responder,
    requests: Mutex<Vec<OutboundRequest>>,
    gate: Option<watch::Receiver<bool>>,
}

/// Opens the gate of a gated [`MockTransport`], releasing every
/// request waiting in `send`.
pub struct MockGate {
    open: watch::Sender<bool>,
}

impl MockGate {
    pub fn open(&self) {
        let _ = self.open.send(true);
    }
}

impl MockTransport {
    pub fn new(
        responder: impl Fn(&OutboundRequest) -> TransportResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Transport whose responses are withheld until the gate opens.
    pub fn gated(
        responder: impl Fn(&OutboundRequest) -> TransportResult + Send + Sync + 'static,
    ) -> (Self, MockGate) {
        let (open, gate) = watch::channel(false);
        let transport = Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            gate: Some(gate),
        };
        (transport, MockGate { open })
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// How many recorded requests hit the given method and URL suffix.
    pub fn count_matching(&self, method: &str, url_suffix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| {
                request.method.as_str() == method && request.url.ends_with(url_suffix)
            })
            .count()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: OutboundRequest) -> TransportResult {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            if gate.wait_for(|open| *open).await.is_err() {
                return Err(ErrorInfo::transport("mock gate dropped"));
            }
        }

        (self.responder)(&request)
    }
}

/// A 2xx JSON response.
pub fn json_response(status: u16, body: Value) -> TransportResult {
    Ok(WireResponse {
        status,
        body: body.to_string().into_bytes(),
    })
}

/// A response with no body (e.g. 204 from a DELETE).
pub fn empty_response(status: u16) -> TransportResult {
    Ok(WireResponse {
        status,
        body: Vec::new(),
    })
}
