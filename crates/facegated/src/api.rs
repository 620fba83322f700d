//! HTTP edge for the browser client.
//!
//! Validates request shape, decodes image payloads, and delegates to the
//! relay client. Every failure, including warp rejections, is rendered as
//! an `{error, detail}` envelope.

use crate::config::Config;
use facegate_core::{
    decode_image_payload, CodecError, ErrorBody, RecognizeRequest, RecognizeResponse,
    RegisterRequest, RegisterResponse, RelayClient, RelayError,
};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

const VALIDATION_ERROR: &str = "Validation Error";
const SERVER_ERROR: &str = "Server Error";
const DUPLICATE_NAME_ERROR: &str = "Name must be unique";
const DUPLICATE_NAME_MESSAGE: &str = "The name you provided is already registered.";

// =============================================================================
// API Routes
// =============================================================================

/// Build the complete edge route tree.
pub fn api_routes(
    relay: Arc<RelayClient>,
    config: &Config,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let api = warp::path("api");
    let body_limit = config.max_payload_bytes;

    let register = api
        .and(warp::path("register"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(body_limit))
        .and(warp::body::json())
        .and(with_relay(relay.clone()))
        .and_then(handle_register);

    let recognize = api
        .and(warp::path("recognize"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(body_limit))
        .and(warp::body::json())
        .and(with_relay(relay.clone()))
        .and_then(handle_recognize);

    let list_faces = api
        .and(warp::path("faces"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_relay(relay.clone()))
        .and_then(handle_list_faces);

    let delete_faces = api
        .and(warp::path("faces"))
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_relay(relay.clone()))
        .and_then(handle_delete_faces);

    let health = api
        .and(warp::path("health"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_relay(relay))
        .and_then(handle_health);

    // CORS limited to the configured browser origin
    let cors = warp::cors()
        .allow_origin(config.cors_origin())
        .allow_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
        .allow_headers(vec!["content-type", "authorization"]);

    register
        .or(recognize)
        .or(list_faces)
        .or(delete_faces)
        .or(health)
        .recover(handle_rejection)
        .with(cors)
        // CORS refusals happen outside the inner recover
        .recover(handle_rejection)
        .with(warp::trace::request())
}

// =============================================================================
// Filters
// =============================================================================

fn with_relay(
    relay: Arc<RelayClient>,
) -> impl Filter<Extract = (Arc<RelayClient>,), Error = Infallible> + Clone {
    warp::any().map(move || relay.clone())
}

// =============================================================================
// Handlers
// =============================================================================

async fn handle_register(
    body: RegisterRequest,
    relay: Arc<RelayClient>,
) -> Result<warp::reply::Response, Infallible> {
    let (Some(name), Some(image)) = (present(body.name), present(body.image)) else {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            VALIDATION_ERROR,
            "Name and image are required",
        ));
    };

    let bytes = match decode_image_payload(&image) {
        Ok(bytes) => bytes,
        Err(e) => return Ok(codec_error_response(e)),
    };

    match relay.register(&name, &bytes).await {
        Ok(data) => {
            tracing::info!(name = %name, bytes = bytes.len(), "face registered");
            Ok(json_response(
                StatusCode::OK,
                &RegisterResponse {
                    message: "Face registered successfully".to_string(),
                    data,
                },
            ))
        }
        Err(e) => {
            tracing::error!(name = %name, error = %e, "registration failed");
            Ok(relay_error_response(e))
        }
    }
}

async fn handle_recognize(
    body: RecognizeRequest,
    relay: Arc<RelayClient>,
) -> Result<warp::reply::Response, Infallible> {
    let Some(image) = present(body.image) else {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            VALIDATION_ERROR,
            "Image is required",
        ));
    };

    let bytes = match decode_image_payload(&image) {
        Ok(bytes) => bytes,
        Err(e) => return Ok(codec_error_response(e)),
    };

    match relay.recognize(&bytes).await {
        Ok(results) => {
            tracing::debug!(
                bytes = bytes.len(),
                faces = results.as_array().map(Vec::len).unwrap_or(0),
                "recognition relayed"
            );
            Ok(json_response(
                StatusCode::OK,
                &RecognizeResponse {
                    message: "Recognition successful".to_string(),
                    results,
                },
            ))
        }
        Err(e) => {
            tracing::error!(error = %e, "recognition failed");
            Ok(relay_error_response(e))
        }
    }
}

async fn handle_list_faces(relay: Arc<RelayClient>) -> Result<warp::reply::Response, Infallible> {
    match relay.list_faces().await {
        Ok(faces) => Ok(json_response(StatusCode::OK, &faces)),
        Err(e) => {
            tracing::error!(error = %e, "listing faces failed");
            Ok(relay_error_response(e))
        }
    }
}

async fn handle_delete_faces(
    relay: Arc<RelayClient>,
) -> Result<warp::reply::Response, Infallible> {
    match relay.delete_all_faces().await {
        Ok(ack) => {
            tracing::warn!("all registered faces deleted");
            Ok(json_response(StatusCode::OK, &ack))
        }
        Err(e) => {
            tracing::error!(error = %e, "deleting faces failed");
            Ok(relay_error_response(e))
        }
    }
}

async fn handle_health(relay: Arc<RelayClient>) -> Result<warp::reply::Response, Infallible> {
    let upstream = match relay.health().await {
        Ok(_) => serde_json::json!({ "reachable": true }),
        Err(e) => serde_json::json!({ "reachable": false, "detail": e.detail() }),
    };
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "upstream": upstream,
        }),
    ))
}

/// Render warp rejections in the edge error envelope.
async fn handle_rejection(err: Rejection) -> Result<warp::reply::Response, Infallible> {
    let (status, error, detail) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found", "No such endpoint".to_string())
    } else if let Some(e) = err.find::<warp::filters::cors::CorsForbidden>() {
        tracing::debug!(error = %e, "cross-origin request refused");
        (StatusCode::FORBIDDEN, "Forbidden", e.to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            VALIDATION_ERROR,
            format!("Request body must be a JSON object: {e}"),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "Payload Too Large",
            "Request body exceeds the configured size limit".to_string(),
        )
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            "Length Required",
            "Request must declare a Content-Length".to_string(),
        )
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Unsupported Media Type",
            "Request body must be application/json".to_string(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method Not Allowed",
            "Method not allowed for this endpoint".to_string(),
        )
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            SERVER_ERROR,
            "Unhandled request failure".to_string(),
        )
    };

    Ok(error_response(status, error, &detail))
}

// =============================================================================
// Helpers
// =============================================================================

/// Treat an absent or empty field as missing.
fn present(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.is_empty())
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn error_response(status: StatusCode, error: &str, detail: &str) -> warp::reply::Response {
    json_response(status, &ErrorBody::new(error, detail))
}

fn codec_error_response(err: CodecError) -> warp::reply::Response {
    tracing::debug!(error = %err, "rejecting image payload");
    error_response(StatusCode::BAD_REQUEST, VALIDATION_ERROR, &err.to_string())
}

fn relay_error_response(err: RelayError) -> warp::reply::Response {
    match err {
        RelayError::DuplicateName => error_response(
            StatusCode::BAD_REQUEST,
            DUPLICATE_NAME_ERROR,
            DUPLICATE_NAME_MESSAGE,
        ),
        other => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            SERVER_ERROR,
            &other.detail(),
        ),
    }
}
