use std::collections::HashMap;

/// Parse query parameters from a URI string
///
/// Handles URL decoding and returns a HashMap of parameter key-value pairs.
/// Multiple values for the same key are not supported (only the last is kept).
pub fn parse_query_params(uri: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    if let Some(query_start) = uri.find('?') {
        let query = &uri[query_start + 1..];
        for param in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = match param.find('=') {
                Some(eq_idx) => (&param[..eq_idx], &param[eq_idx + 1..]),
                None => (param, ""),
            };
            params.insert(decode(key), decode(value));
        }
    }

    params
}

/// The path plus query of a request URI, scheme and authority removed.
pub fn full_path(path: &str, uri: &str) -> String {
    match uri.find('?') {
        Some(query_start) if query_start + 1 < uri.len() => {
            format!("{}{}", path, &uri[query_start..])
        }
        _ => path.to_string(),
    }
}

/// Get a string parameter from parsed query params with optional default
pub fn get_string(params: &HashMap<String, String>, key: &str, default: Option<&str>) -> Option<String> {
    params
        .get(key)
        .cloned()
        .or_else(|| default.map(|d| d.to_string()))
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}
