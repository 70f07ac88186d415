//! Validation Utilities

use validator::{Validate, ValidationError, ValidationErrors};

use super::error::{ConnectError, SendError};

#[derive(Debug, Validate)]
struct ClientIdentity {
    #[validate(
        length(min = 1, max = 128, message = "must be between 1 and 128 characters"),
        custom(function = "not_blank")
    )]
    client_id: String,
}

#[derive(Debug, Validate)]
struct OutgoingText {
    #[validate(length(min = 1, message = "must not be empty"), custom(function = "not_blank"))]
    text: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    Ok(())
}

/// Flatten validation errors into a single "field: message" description
pub fn describe(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, message)
            })
        })
        .next()
        .unwrap_or_else(|| "Validation failed".into())
}

/// Check a client id before a connection attempt
pub fn validate_client_id(client_id: &str) -> Result<(), ConnectError> {
    ClientIdentity {
        client_id: client_id.to_string(),
    }
    .validate()
    .map_err(|e| ConnectError::InvalidClientId(describe(&e)))
}

/// Check message text before it is published
pub fn validate_message_text(text: &str) -> Result<(), SendError> {
    OutgoingText {
        text: text.to_string(),
    }
    .validate()
    .map_err(|e| SendError::InvalidMessage(describe(&e)))
}
