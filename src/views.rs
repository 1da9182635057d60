//! Handler outcomes. A handler either hands a template name plus context to
//! the presentation layer, or redirects after a write.

use http::StatusCode;
use serde_json::Value;
use spin_sdk::http::Response;

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Render {
        template: &'static str,
        context: Value,
    },
    Redirect(String),
}

impl View {
    pub fn render(template: &'static str, context: Value) -> Self {
        View::Render { template, context }
    }

    pub fn redirect(to: impl Into<String>) -> Self {
        View::Redirect(to.into())
    }

    pub fn into_response(self) -> anyhow::Result<Response> {
        match self {
            View::Render { template, context } => {
                let body = serde_json::json!({
                    "template": template,
                    "context": context,
                });
                Ok(Response::builder()
                    .status(StatusCode::OK.as_u16())
                    .header("content-type", "application/json")
                    .body(serde_json::to_vec(&body)?)
                    .build())
            }
            View::Redirect(to) => Ok(redirect_response(&to)),
        }
    }
}

pub fn redirect_response(to: &str) -> Response {
    Response::builder()
        .status(StatusCode::FOUND.as_u16())
        .header("location", to)
        .body(Vec::new())
        .build()
}
