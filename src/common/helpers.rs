use std::collections::HashSet;

use ammonia::Builder;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn validate_uuid(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Plain text only: every tag is stripped, script and style bodies dropped.
/// The result is unescaped text; escaping belongs to presentation.
pub fn sanitize_text(text: &str) -> String {
    let cleaned = Builder::default().tags(HashSet::new()).clean(text).to_string();
    html_escape::decode_html_entities(&cleaned).into_owned()
}

/// Login entry point with the return target, e.g. `/auth/login/?next=/new/`.
/// Slashes stay literal in the target.
pub fn login_redirect_url(login_url: &str, next: &str) -> String {
    let encoded = urlencoding::encode(next).replace("%2F", "/");
    format!("{}?next={}", login_url, encoded)
}

/// Only same-site absolute paths are accepted as redirect targets.
pub fn is_local_path(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}
