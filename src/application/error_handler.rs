//! Fallback responses for unmatched requests and failed handlers.

use tracing::warn;

use crate::http::{Request, Response, StatusCode};
use crate::router::HandlerError;

/// Produces the response when routing did not.
///
/// The dispatcher calls these only while the response is still uncommitted.
pub trait ErrorHandler: Send + Sync + 'static {
    /// No route committed a response; `status` is the outcome to report
    /// (normally `404 Not Found`).
    fn handle_status(&self, status: StatusCode, request: &Request, response: &mut Response);

    /// A handler returned an error.
    fn handle_error(&self, error: &HandlerError, request: &Request, response: &mut Response);
}

/// Writes the status line's reason phrase as a plain-text body.
///
/// Handler errors become `500 Internal Server Error`; the error itself is
/// only logged, never echoed to the client.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorHandler;

impl DefaultErrorHandler {
    fn write(status: StatusCode, response: &mut Response) {
        response.set_status(status);
        if let Err(e) = response.send(status.canonical_reason()) {
            warn!(error = %e, "error handler could not write the response");
        }
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn handle_status(&self, status: StatusCode, _request: &Request, response: &mut Response) {
        Self::write(status, response);
    }

    fn handle_error(&self, _error: &HandlerError, _request: &Request, response: &mut Response) {
        Self::write(StatusCode::InternalServerError, response);
    }
}
