use validator::Validate;

use crate::error::AppError;

pub mod auth;
pub mod cart;
pub mod orders;
pub mod products;
pub mod users;

/// Run derive-based validation and flatten the failures into one
/// human-readable 400 message.
pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), AppError> {
    payload.validate().map_err(|errs| {
        let mut messages: Vec<String> = Vec::new();
        for (field, errors) in errs.field_errors() {
            for err in errors {
                match &err.message {
                    Some(msg) => messages.push(msg.to_string()),
                    None => messages.push(format!("{field} is invalid")),
                }
            }
        }
        messages.sort();
        AppError::Validation(messages.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::auth::RegisterRequest;

    #[test]
    fn register_request_rejects_bad_email() {
        let payload = RegisterRequest {
            name: "Alice".into(),
            email: "not-an-email".into(),
            password: "Passw0rd1".into(),
            confirm_password: "Passw0rd1".into(),
        };
        let err = validate_payload(&payload).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("valid email"));
    }

    #[test]
    fn register_request_rejects_short_name() {
        let payload = RegisterRequest {
            name: "A".into(),
            email: "a@x.com".into(),
            password: "Passw0rd1".into(),
            confirm_password: "Passw0rd1".into(),
        };
        assert!(validate_payload(&payload).is_err());
    }

    #[test]
    fn valid_register_request_passes() {
        let payload = RegisterRequest {
            name: "Alice".into(),
            email: "a@x.com".into(),
            password: "Passw0rd1".into(),
            confirm_password: "Passw0rd1".into(),
        };
        assert!(validate_payload(&payload).is_ok());
    }
}
