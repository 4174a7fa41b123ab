//! Handler contract for routed endpoints.

use std::future::Future;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use futures_util::future::BoxFuture;
use http_body_util::LengthLimitError;

use crate::http::request::RequestContext;

/// Failure returned by a handler.
///
/// Contained at the router: it becomes an error response and is recorded on
/// the request span; it never unwinds past the request.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn internal(message: impl std::fmt::Display) -> Self {
        HandlerError::Internal(message.to_string())
    }

    /// Map a failure to read the request body.
    ///
    /// Bodies are capped at the configured limit; overflowing it surfaces
    /// here as [`HandlerError::PayloadTooLarge`].
    pub fn body(err: axum::Error, limit: usize) -> Self {
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
        while let Some(e) = source {
            if e.is::<LengthLimitError>() {
                return HandlerError::PayloadTooLarge { limit };
            }
            source = e.source();
        }
        HandlerError::BadRequest(err.to_string())
    }

    /// Status code the client sees.
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HandlerError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            HandlerError::Internal(_) | HandlerError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type HandlerResult = Result<Response, HandlerError>;

/// An endpoint the router can dispatch to.
///
/// Implemented for plain async closures taking `(RequestContext, Request<Body>)`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, cx: RequestContext, req: Request<Body>) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(RequestContext, Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, cx: RequestContext, req: Request<Body>) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(cx, req))
    }
}
