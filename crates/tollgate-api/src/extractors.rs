// SPDX-License-Identifier: BUSL-1.1
//! # Request Extractors
//!
//! JSON extraction with domain validation. Deserialization failures and
//! business-rule violations are both 422 Unprocessable Entity — the client
//! sent syntactically valid HTTP with semantically invalid content.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Request-body validation hook, applied after deserialization.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Unwrap a JSON extraction result and run domain validation.
pub fn extract_validated_json<T: Validate>(
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(value) = body.map_err(|rejection| {
        AppError::Validation(format!("invalid request body: {rejection}"))
    })?;
    value
        .validate()
        .map_err(AppError::Validation)?;
    Ok(value)
}
