use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{HttpResponse, Result, dev::ServiceResponse};
use serde_json::json;

use crate::utils::error::CustomError;
use crate::utils::helpers::service_name;

/// True when the response was rendered from a `CustomError` and already
/// carries the failure envelope.
pub fn is_enveloped<B>(res: &ServiceResponse<B>) -> bool {
    res.response()
        .error()
        .is_some_and(|e| e.as_error::<CustomError>().is_some())
}

/// Re-wraps framework-generated errors (405, payload errors, ...) in the envelope.
pub fn handle_error<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    if is_enveloped(&res) {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    }

    let status_code = res.status();
    let error_message = res
        .response()
        .error()
        .map(|e| e.to_string())
        .unwrap_or_else(|| status_code.canonical_reason().unwrap_or("Unknown error").to_string());

    let new_response = HttpResponse::build(status_code).json(json!({
        "success": false,
        "message": error_message,
        "httpStatusCode": status_code.as_u16(),
        "error": status_code
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_uppercase()
            .replace(' ', "_"),
        "service": service_name(),
    }));

    let (req, _) = res.into_parts();
    let res = ServiceResponse::new(req, new_response).map_into_right_body();

    Ok(ErrorHandlerResponse::Response(res))
}
