use spin_sdk::http::Response;

use crate::common::helpers::login_redirect_url;
use crate::common::pages::{not_found_page, server_error_page};
use crate::views::redirect_response;

/// Failures a handler can end with. All of them are turned into a response
/// at the router; none escape the request.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Login required for {next}")]
    Unauthenticated { next: String },
    #[error("Not permitted, sending caller to {redirect_to}")]
    Unauthorized { redirect_to: String },
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    /// `path` is the request path echoed on the 404 page.
    pub fn into_response(self, path: &str, login_url: &str) -> Response {
        match self {
            AppError::NotFound(what) => {
                tracing::debug!(%path, %what, "not found");
                not_found_page(path)
            }
            AppError::Unauthenticated { next } => {
                redirect_response(&login_redirect_url(login_url, &next))
            }
            AppError::Unauthorized { redirect_to } => redirect_response(&redirect_to),
            AppError::Internal(err) => {
                tracing::error!(%path, error = ?err, "request failed");
                server_error_page()
            }
        }
    }
}
