//! Collector wire format.
//!
//! One POST body per batch:
//! ```text
//! {
//!   "resource": { "<attr>": <scalar>, ... },
//!   "spans": [
//!     { "scope", "name", "attributes": {..}, "startTime", "endTime", "status" }, ...
//!   ]
//! }
//! ```
//! Timestamps are unix epoch nanoseconds. `status` is `"OK"` or `"ERROR"`.

use serde::Serialize;

use crate::telemetry::error::ExportError;
use crate::telemetry::resource::Resource;
use crate::telemetry::span::Span;

pub const CONTENT_TYPE: &str = "application/json";

/// Borrowed view of one export request body.
#[derive(Debug, Serialize)]
pub struct ExportPayload<'a> {
    pub resource: &'a Resource,
    pub spans: &'a [Span],
}

impl<'a> ExportPayload<'a> {
    pub fn new(resource: &'a Resource, spans: &'a [Span]) -> Self {
        Self { resource, spans }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ExportError> {
        serde_json::to_vec(self).map_err(|e| ExportError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::resource::SERVICE_NAME;

    #[test]
    fn test_payload_layout() {
        let resource = Resource::new([(SERVICE_NAME, "svc")]);
        let mut span = Span::new("metricTracer", "metric");
        span.attributes.set("cpu", "1.50%");
        span.end();
        let spans = vec![span];

        let bytes = ExportPayload::new(&resource, &spans).encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["resource"]["service.name"], "svc");
        assert_eq!(json["spans"].as_array().unwrap().len(), 1);
        assert_eq!(json["spans"][0]["name"], "metric");
        assert_eq!(json["spans"][0]["attributes"]["cpu"], "1.50%");
        assert!(json["spans"][0]["endTime"].is_u64());
    }
}
