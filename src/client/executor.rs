// Request executor.
// Builds outbound requests from endpoint descriptors, deduplicates
// concurrent identical fetches, and applies outcomes to the cache.

use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheKey, EntryPatch};
use crate::error::{ErrorInfo, FetchOutcome};
use crate::registry::{EndpointDescriptor, EndpointKind};

use super::transport::{OutboundRequest, RequestBody, Transport, WireResponse};
use super::{InFlight, ResourceClient};

enum FetchRole {
    /// An identical request is already outstanding; await its outcome.
    Join(watch::Receiver<Option<FetchOutcome>>),
    /// This caller issues the network call and resolves all joiners.
    Lead {
        publisher: watch::Sender<Option<FetchOutcome>>,
        request: OutboundRequest,
        issued_at: Instant,
    },
}

impl<T: Transport> ResourceClient<T> {
    /// Run (or join) the fetch for a cached query key.
    ///
    /// At most one network call is in flight per key: concurrent
    /// callers share the leader's outcome. The in-flight slot is
    /// removed before the outcome is propagated, so a call arriving
    /// after completion starts a fresh fetch.
    ///
    /// Without `force`, a settled entry answers from cache; an entry
    /// whose scheduled fetch was overtaken by an identical one does
    /// not hit the network twice. `force` is the explicit-refetch
    /// path.
    pub(crate) async fn run_fetch(&self, key: &CacheKey, force: bool) -> FetchOutcome {
        let role = {
            let mut state = self.lock_state();

            if let Some(inflight) = state.inflight.get(key) {
                debug!(key = key.as_str(), "joining in-flight request");
                FetchRole::Join(inflight.outcome.clone())
            } else {
                let Some(entry) = state.cache.get(key) else {
                    return Err(ErrorInfo::transport("cache entry no longer present"));
                };

                if !force && !entry.needs_fetch() {
                    if let Some(data) = &entry.data {
                        return Ok(data.clone());
                    }
                    if let Some(error) = &entry.error {
                        return Err(error.clone());
                    }
                }

                let endpoint = entry.endpoint.clone();
                let args = entry.args.clone();

                let descriptor = match self.inner.registry.resolve(&endpoint) {
                    Ok(descriptor) => descriptor.clone(),
                    Err(e) => return Err(ErrorInfo::transport(e.to_string())),
                };
                let request = self.build_request(&descriptor, &args, RequestBody::Empty);

                let issued_at = Instant::now();
                let (publisher, outcome) = watch::channel(None);
                state.inflight.insert(key.clone(), InFlight { outcome });
                state.cache.upsert(key, EntryPatch::loading());

                debug!(key = key.as_str(), url = request.url, "issuing fetch");
                FetchRole::Lead {
                    publisher,
                    request,
                    issued_at,
                }
            }
        };

        match role {
            FetchRole::Join(mut outcome) => match outcome.wait_for(|settled| settled.is_some()).await {
                Ok(settled) => settled
                    .clone()
                    .unwrap_or_else(|| Err(ErrorInfo::transport("in-flight request dropped"))),
                Err(_) => Err(ErrorInfo::transport("in-flight request dropped")),
            },
            FetchRole::Lead {
                publisher,
                request,
                issued_at,
            } => {
                let outcome = self.perform(request).await;
                {
                    let mut state = self.lock_state();
                    state.inflight.remove(key);
                    state
                        .cache
                        .upsert(key, EntryPatch::settled(outcome.clone(), issued_at, Utc::now()));
                }
                let _ = publisher.send(Some(outcome.clone()));
                outcome
            }
        }
    }

    /// Send one request and map the response into a fetch outcome.
    /// Transport failures, non-2xx statuses, and undecodable bodies all
    /// come back as `ErrorInfo` values.
    pub(crate) async fn perform(&self, request: OutboundRequest) -> FetchOutcome {
        let response = self.inner.transport.send(request).await?;
        decode_response(response)
    }

    /// Assemble the outbound request for a descriptor: fill the URL
    /// template from the arguments, append leftover query arguments,
    /// and attach the current session token.
    pub(crate) fn build_request(
        &self,
        descriptor: &EndpointDescriptor,
        args: &Value,
        body: RequestBody,
    ) -> OutboundRequest {
        let (path, leftover) = render_path(descriptor.url_template, args);

        let mut url = format!(
            "{}/{}",
            self.inner.config.base_url.trim_end_matches('/'),
            path
        );
        if descriptor.kind == EndpointKind::Query && !leftover.is_empty() {
            url.push('?');
            for (i, (name, value)) in leftover.iter().enumerate() {
                if i > 0 {
                    url.push('&');
                }
                url.push_str(name);
                url.push('=');
                url.push_str(value);
            }
        }

        OutboundRequest {
            method: descriptor.method.clone(),
            url,
            bearer: self.inner.session.token(),
            body,
        }
    }
}

/// Fill `{name}` segments of a URL template from an argument object.
/// Returns the rendered path and the unused arguments, sorted by name.
pub(crate) fn render_path(template: &str, args: &Value) -> (String, Vec<(String, String)>) {
    let mut path = String::with_capacity(template.len());
    let mut used = Vec::new();

    let mut rest = template;
    while let Some(open) = rest.find('{') {
        path.push_str(&rest[..open]);
        match rest[open..].find('}') {
            Some(close) => {
                let name = &rest[open + 1..open + close];
                match args.get(name) {
                    Some(value) => path.push_str(&plain_string(value)),
                    None => {
                        path.push_str(&rest[open..open + close + 1]);
                    }
                }
                used.push(name.to_string());
                rest = &rest[open + close + 1..];
            }
            None => {
                path.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    path.push_str(rest);

    let mut leftover: Vec<(String, String)> = match args {
        Value::Object(map) => map
            .iter()
            .filter(|(name, _)| !used.contains(name))
            .map(|(name, value)| (name.clone(), plain_string(value)))
            .collect(),
        _ => Vec::new(),
    };
    leftover.sort();

    (path, leftover)
}

fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn decode_response(response: WireResponse) -> FetchOutcome {
    if !(200..300).contains(&response.status) {
        let raw = String::from_utf8_lossy(&response.body).into_owned();
        // The backend reports failures as {"payload": "<message>"}.
        let message = serde_json::from_slice::<Value>(&response.body)
            .ok()
            .and_then(|value| {
                value
                    .get("payload")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("HTTP {}", response.status));
        return Err(ErrorInfo::http(response.status, message, raw));
    }

    if response.body.is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_slice(&response.body).map_err(|e| {
        ErrorInfo::decode(
            e.to_string(),
            String::from_utf8_lossy(&response.body).into_owned(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_render_path_fills_segments() {
        let (path, leftover) = render_path("promotions/{id}", &json!({ "id": 7 }));
        assert_eq!(path, "promotions/7");
        assert!(leftover.is_empty());
    }

    #[test]
    fn test_render_path_collects_leftover_args() {
        let (path, leftover) = render_path("promotions", &json!({ "page": 2, "size": 10 }));
        assert_eq!(path, "promotions");
        assert_eq!(
            leftover,
            vec![
                ("page".to_string(), "2".to_string()),
                ("size".to_string(), "10".to_string())
            ]
        );
    }

    #[test]
    fn test_render_path_with_string_arg() {
        let (path, _) = render_path("users/{name}/roles", &json!({ "name": "john" }));
        assert_eq!(path, "users/john/roles");
    }

    #[test]
    fn test_decode_empty_success_body() {
        let outcome = decode_response(WireResponse {
            status: 204,
            body: Vec::new(),
        });
        assert_eq!(outcome, Ok(Value::Null));
    }

    #[test]
    fn test_decode_error_payload_message() {
        let outcome = decode_response(WireResponse {
            status: 401,
            body: br#"{"payload":"Invalid credentials"}"#.to_vec(),
        });
        let error = outcome.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Http);
        assert_eq!(error.status_code, Some(401));
        assert_eq!(error.message, "Invalid credentials");
    }

    #[test]
    fn test_decode_malformed_body() {
        let outcome = decode_response(WireResponse {
            status: 200,
            body: b"not json".to_vec(),
        });
        assert_eq!(outcome.unwrap_err().kind, ErrorKind::Decode);
    }
}
