use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::*;
use std::any::Any;

/// Turns a panicking handler into a 500 response instead of a dropped connection.
pub(crate) fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    error!("Recovered from panic in request handler: {detail}");

    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
}
