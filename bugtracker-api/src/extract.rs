/// Request extractors with tracker error bodies
///
/// axum's own `Json` and `Query` reject with plain-text 415/422 responses.
/// These wrappers turn every rejection into an [`ApiError`] 400 so clients
/// always get the JSON error shape.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use crate::error::{ApiError, ValidationErrorDetail};

/// Longest title a `VARCHAR(255)` column accepts
pub const MAX_TITLE_CHARS: usize = 255;

/// JSON body extractor
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// JSON body extractor that also runs `validator` rules
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let ApiJson(value) = ApiJson::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Rejects empty or whitespace-only strings, and NUL bytes
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    no_nul(value)?;
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// PostgreSQL text columns can't store NUL bytes
pub fn no_nul(value: &str) -> Result<(), ValidationError> {
    if value.contains('\0') {
        return Err(ValidationError::new("nul")
            .with_message("Text must not contain NUL characters".into()));
    }
    Ok(())
}

/// Checks an optional text field of a partial update
///
/// `max_chars` counts characters, the way `VARCHAR(n)` does.
pub fn check_optional_text(
    field: &str,
    value: Option<&str>,
    max_chars: Option<usize>,
) -> Result<(), ApiError> {
    let Some(value) = value else {
        return Ok(());
    };

    let message = if value.contains('\0') {
        format!("{} must not contain NUL characters", capitalize(field))
    } else if let Some(max) = max_chars.filter(|max| value.chars().count() > *max) {
        format!("{} must be at most {} characters", capitalize(field), max)
    } else {
        return Ok(());
    };

    Err(ApiError::ValidationError(vec![ValidationErrorDetail {
        field: field.to_string(),
        message,
    }]))
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Deserializes a field that may be absent, `null`, or a value
///
/// Absent stays `None` (via `#[serde(default)]`), `null` becomes
/// `Some(None)`, and a value becomes `Some(Some(v))`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    <Option<T> as serde::Deserialize>::deserialize(deserializer).map(Some)
}
