//! Response envelope and gzip framing.
//!
//! ```text
//! success: {"status_code":0,"payload":{...}}      (payload omitted when empty)
//! failure: {"status_code":500,"status_text":"..."}  HTTP 401 or 500
//! ```

use std::io::Write;

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use flate2::{Compression, write::GzEncoder};
use serde::Serialize;
use tracing::error;

use corpreg_companies::Company;
use corpreg_core::CompanyId;

use super::errors::{ApiError, SERVER_ERROR_CODE};

/// Successful result of one company operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Companies { companies: Vec<Company> },
    Company { company: Company },
    CompanyId { company_id: CompanyId },
    /// Nothing to return (delete, or get of an absent id).
    Empty,
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_text: Option<String>,
}

/// Serialized envelope body (uncompressed) for an outcome.
pub fn envelope_json(outcome: &Result<Payload, ApiError>) -> Vec<u8> {
    let envelope = match outcome {
        Ok(payload) => Envelope {
            status_code: 0,
            payload: (*payload != Payload::Empty).then_some(payload),
            status_text: None,
        },
        Err(err) => Envelope {
            status_code: SERVER_ERROR_CODE,
            payload: None,
            status_text: Some(err.to_string()),
        },
    };

    serde_json::to_vec(&envelope).unwrap_or_else(|e| {
        error!(error = %e, "response marshalling error");
        format!(
            r#"{{"status_code":{SERVER_ERROR_CODE},"status_text":"internal server error"}}"#
        )
        .into_bytes()
    })
}

/// Build the gzip-compressed HTTP response for an outcome.
pub fn respond(outcome: &Result<Payload, ApiError>) -> Response {
    let status = match outcome {
        Ok(_) => StatusCode::OK,
        Err(err) => err.http_status(),
    };
    let json = envelope_json(outcome);

    let mut response = match gzip(&json) {
        Ok(compressed) => {
            let mut response = Response::new(Body::from(compressed));
            response
                .headers_mut()
                .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            response
        }
        Err(e) => {
            error!(error = %e, "Failed to write response");
            Response::new(Body::from(json))
        }
    };

    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}
