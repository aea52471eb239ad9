//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::FulfillmentError;
use payments::PaymentError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Order, appointment or ledger operation failed.
    Fulfillment(FulfillmentError),
    /// Charge or webhook operation failed.
    Payment(PaymentError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
            ApiError::Payment(err) => payment_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, status = status.as_u16(), "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, String) {
    let status = if err.is_validation()
        || matches!(err.store_error(), Some(StoreError::Domain(_)))
    {
        StatusCode::BAD_REQUEST
    } else if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_conflict() {
        StatusCode::CONFLICT
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, err.to_string())
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, String) {
    let status = match &err {
        PaymentError::InvalidRequest(_)
        | PaymentError::InvalidWebhook(_)
        | PaymentError::UnknownStatus(_) => StatusCode::BAD_REQUEST,
        PaymentError::ChargeNotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::Hub(_) => StatusCode::TOO_MANY_REQUESTS,
        PaymentError::Rejected(_) | PaymentError::Upstream(_) => StatusCode::BAD_GATEWAY,
        PaymentError::Store(e) if e.is_conflict() => StatusCode::CONFLICT,
        PaymentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
