// HTTP transport.
// The seam between the request executor and the network: a trait the
// tests can stand in for, and the reqwest-backed implementation.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method};
use serde_json::Value;

use crate::error::{ErrorInfo, PlinthError, Result};

/// A fully prepared request, ready for the wire.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    /// Bearer credential, attached as `Authorization: Bearer <token>`
    /// when present.
    pub bearer: Option<String>,
    pub body: RequestBody,
}

/// Request body shapes used by the dashboard endpoints.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Vec<MultipartField>),
}

/// One field of a multipart form. File bytes pass through untouched;
/// binary fidelity is preserved end to end.
#[derive(Debug, Clone)]
pub enum MultipartField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// Raw response from the collaborator, before status checking and
/// body decoding.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Network seam. Returns `Err` only for transport-level failures; HTTP
/// error statuses come back as a normal [`WireResponse`].
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = std::result::Result<WireResponse, ErrorInfo>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn send(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = std::result::Result<WireResponse, ErrorInfo>> + Send {
        self.as_ref().send(request)
    }
}

/// Production transport backed by reqwest.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PlinthError::Http)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> std::result::Result<WireResponse, ErrorInfo> {
        let mut builder = self.client.request(request.method, &request.url);

        if let Some(token) = &request.bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(fields) => {
                let mut form = reqwest::multipart::Form::new();
                for field in fields {
                    form = match field {
                        MultipartField::Text { name, value } => form.text(name, value),
                        MultipartField::File {
                            name,
                            file_name,
                            content_type,
                            bytes,
                        } => {
                            let part = reqwest::multipart::Part::bytes(bytes)
                                .file_name(file_name)
                                .mime_str(&content_type)
                                .map_err(|e| ErrorInfo::transport(e.to_string()))?;
                            form.part(name, part)
                        }
                    };
                }
                builder.multipart(form)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ErrorInfo::transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ErrorInfo::transport(e.to_string()))?;

        Ok(WireResponse {
            status,
            body: body.to_vec(),
        })
    }
}
