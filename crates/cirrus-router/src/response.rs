//! Gateway response construction.
//!
//! Success bodies pick their content type from the value shape; every
//! response, success or failure, carries permissive CORS headers.

use std::collections::HashMap;

use cirrus_core::error::parse_status_prefix;
use cirrus_core::trigger::WebResponse;
use serde_json::Value;

/// 200 response for a handler value. Strings pass through raw, with markup
/// served as `text/html`; anything else is JSON-encoded.
pub fn success(value: &Value) -> WebResponse {
    let (body, content_type) = match value {
        Value::String(text) => (text.clone(), text_content_type(text)),
        other => (other.to_string(), "application/json"),
    };
    WebResponse { status_code: 200, headers: base_headers(content_type), body }
}

/// Failure response carrying a rendered error message as its body.
pub fn failure(status: u16, message: String) -> WebResponse {
    WebResponse { status_code: status, headers: base_headers("text/plain"), body: message }
}

/// Status for an unreported error message: the structured prefix when one
/// parses, else 503.
pub fn status_for(message: &str) -> u16 {
    parse_status_prefix(message).unwrap_or(503)
}

fn text_content_type(text: &str) -> &'static str {
    let trimmed = text.trim();
    if trimmed.starts_with('<') && trimmed.ends_with('>') { "text/html" } else { "text/plain" }
}

fn base_headers(content_type: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), content_type.to_string());
    headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
    headers.insert("Access-Control-Allow-Headers".to_string(), "*".to_string());
    headers.insert("Access-Control-Allow-Credentials".to_string(), "true".to_string());
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_values_are_encoded() {
        let response = success(&json!({ "hello": "world" }));
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, r#"{"hello":"world"}"#);
        assert_eq!(response.headers["Content-Type"], "application/json");
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(response.headers["Access-Control-Allow-Credentials"], "true");
    }

    #[test]
    fn strings_pass_through_unquoted() {
        let response = success(&json!("done"));
        assert_eq!(response.body, "done");
        assert_eq!(response.headers["Content-Type"], "text/plain");
    }

    #[test]
    fn markup_strings_are_html() {
        let response = success(&json!("<h1>hi</h1>"));
        assert_eq!(response.headers["Content-Type"], "text/html");

        let response = success(&json!("  <p>padded</p>  "));
        assert_eq!(response.headers["Content-Type"], "text/html");
    }

    #[test]
    fn failure_keeps_the_message_as_body() {
        let response = failure(404, "404 NOT FOUND - LIST /ghost//".to_string());
        assert_eq!(response.status_code, 404);
        assert_eq!(response.body, "404 NOT FOUND - LIST /ghost//");
        assert_eq!(response.headers["Access-Control-Allow-Headers"], "*");
    }

    #[test]
    fn status_comes_from_the_structured_prefix() {
        assert_eq!(status_for("400 INVALID REQUEST - x"), 400);
        assert_eq!(status_for("403 FORBIDDEN"), 403);
        assert_eq!(status_for("socket hang up"), 503);
    }
}
