//! HTTP API definitions.

pub mod auth;
pub mod note;
#[cfg(test)]
mod spec;

use axum::{
    extract::{FromRequest, FromRequestParts},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::Serialize;

use crate::{Error, Service};

/// Name of the [`tracing::Span`] for the API handlers.
const SPAN_NAME: &str = "HTTP handler";

/// JSON body extractor and response, rejecting with an [`Error`].
#[derive(Clone, Copy, Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Path parameters extractor, rejecting with an [`Error`].
#[derive(Clone, Copy, Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
pub struct Path<T>(pub T);

/// Builds the API [`Router`] serving the provided [`Service`].
pub fn router(service: Service) -> Router {
    Router::new()
        .route("/api/auth/signup", post(auth::sign_up))
        .route("/api/auth/login", post(auth::log_in))
        .route("/api/auth/logout", post(auth::log_out))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/notes", get(note::list).post(note::create))
        .route(
            "/api/notes/:id",
            get(note::get).patch(note::update).delete(note::delete),
        )
        .layer(Extension(service))
}
