//! Idempotency key extraction
//!
//! Mutating ledger commands accept an `Idempotency-Key` header. The key is
//! handed to the service, which stores it in the same unit of work as the
//! command's effect.

use axum::{
    http::{request::Parts, StatusCode},
    Json,
};

use crate::error::{ErrorDetail, ErrorKind, ErrorResponse};

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

const MAX_KEY_LEN: usize = 255;

/// Optional `Idempotency-Key` header value, trimmed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdempotencyKey(pub Option<String>);

impl IdempotencyKey {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

fn rejection(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    let error = ErrorResponse {
        error: ErrorDetail {
            code: "VALIDATION_ERROR".to_string(),
            kind: ErrorKind::Validation,
            message: message.to_string(),
            field: Some("Idempotency-Key".to_string()),
        },
    };
    (StatusCode::BAD_REQUEST, Json(error))
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(IDEMPOTENCY_HEADER) else {
            return Ok(IdempotencyKey(None));
        };

        let key = value
            .to_str()
            .map_err(|_| rejection("Idempotency-Key must be visible ASCII"))?
            .trim();
        if key.is_empty() {
            return Ok(IdempotencyKey(None));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(rejection("Idempotency-Key is too long"));
        }
        Ok(IdempotencyKey(Some(key.to_string())))
    }
}
