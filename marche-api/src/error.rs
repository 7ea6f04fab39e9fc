use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use marche_core::CoreError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("{0}")]
    AuthenticationError(String),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    JsonRejection(#[from] JsonRejection),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Request structs use snake_case fields; clients see them in camelCase.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Field named by a body deserialization error, e.g. `walletType: unknown
/// variant` or ``missing field `amount` ``.
fn rejected_fields(detail: &str) -> Vec<String> {
    let detail = detail.split_once("target type: ").map_or(detail, |(_, rest)| rest);
    let (path, message) = detail.split_once(": ").unwrap_or(("", detail));
    if !path.is_empty() && !path.contains(' ') {
        return vec![path.to_string()];
    }
    match message.strip_prefix("missing field `").and_then(|rest| rest.split_once('`')) {
        Some((field, _)) => vec![field.to_string()],
        None => Vec::new(),
    }
}

fn internal() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal Server Error" })),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg }))),
            AppError::ValidationError(errors) => {
                let mut fields: Vec<String> = errors.errors().keys().map(|k| camel_case(k)).collect();
                fields.sort();
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Validation failed", "fields": fields })),
                )
            }
            AppError::JsonRejection(rejection) => {
                let status = match rejection {
                    JsonRejection::MissingJsonContentType(_) => rejection.status(),
                    _ => StatusCode::BAD_REQUEST,
                };
                let detail = rejection.body_text();
                (
                    status,
                    Json(json!({ "error": detail, "fields": rejected_fields(&detail) })),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                internal()
            }
            AppError::Core(err) => match err {
                CoreError::Validation { message, fields } => (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": message, "fields": fields })),
                ),
                CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, Json(json!({ "error": err.to_string() }))),
                CoreError::Unauthorized => (StatusCode::UNAUTHORIZED, Json(json!({ "error": err.to_string() }))),
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, Json(json!({ "error": msg }))),
                CoreError::InsufficientBalance { required, available } => (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Insufficient balance",
                        "required": required,
                        "available": available,
                    })),
                ),
                CoreError::InvalidTransition { .. } => {
                    (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() })))
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, Json(json!({ "error": msg }))),
                CoreError::Settlement(failure) => {
                    tracing::error!(
                        "Settlement of order {} incomplete after {:?}: {}",
                        failure.order_id,
                        failure.applied,
                        failure.reason
                    );
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({
                            "error": "Settlement incomplete, retry to finish it",
                            "orderId": failure.order_id,
                        })),
                    )
                }
                CoreError::Storage(_) | CoreError::InternalError(_) => {
                    tracing::error!("Internal Server Error: {}", err);
                    internal()
                }
            },
        };

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_are_camel_cased() {
        assert_eq!(camel_case("wallet_type"), "walletType");
        assert_eq!(camel_case("from_wallet_type"), "fromWalletType");
        assert_eq!(camel_case("amount"), "amount");
    }

    #[test]
    fn test_rejected_body_names_the_field() {
        let prefix = "Failed to deserialize the JSON body into the target type: ";
        assert_eq!(
            rejected_fields(&format!(
                "{prefix}walletType: unknown variant `bogus`, expected one of `buyer`, `seller` at line 1 column 40"
            )),
            vec!["walletType"]
        );
        assert_eq!(
            rejected_fields(&format!("{prefix}missing field `amount` at line 1 column 2")),
            vec!["amount"]
        );
        assert_eq!(
            rejected_fields(&format!("{prefix}items[0].quantity: invalid type: string \"2\", expected i32")),
            vec!["items[0].quantity"]
        );
        assert!(rejected_fields("Failed to parse the request body as JSON: EOF while parsing").is_empty());
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoreError::validation("bad", &["amount"]), StatusCode::BAD_REQUEST),
            (CoreError::not_found("order", "x"), StatusCode::NOT_FOUND),
            (CoreError::Unauthorized, StatusCode::UNAUTHORIZED),
            (CoreError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (CoreError::InsufficientBalance { required: 2, available: 1 }, StatusCode::BAD_REQUEST),
            (
                CoreError::InvalidTransition { from: "delivered".into(), to: "pending".into() },
                StatusCode::BAD_REQUEST,
            ),
            (CoreError::Conflict("dup".into()), StatusCode::CONFLICT),
            (CoreError::Storage("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
