//! Interpretation of generated text as an HTTP response.
//!
//! The provider is asked for a full response, but its text is untrusted:
//! - surrounding whitespace and a Markdown code fence are stripped
//! - text starting with `HTTP/` is parsed as status line + headers + body,
//!   accepting `\n` as well as `\r\n` line endings
//! - anything else becomes the body of a `200 OK`
//! - framing and hop-by-hop headers are dropped (the serializer owns framing)
//! - a `Content-Type` is always present

use crate::generator::GenerationError;
use crate::http::headers::{is_token_byte, is_valid_value};
use crate::http::response::reason_phrase;
use crate::http::{Request, Response};

/// Headers never taken from generated output.
const HOP_BY_HOP: &[&str] = &[
    "content-length",
    "transfer-encoding",
    "connection",
    "keep-alive",
    "upgrade",
    "trailer",
    "te",
];

/// Turn provider text into a response for `request`.
pub fn interpret_output(text: &str, request: &Request) -> Result<Response, GenerationError> {
    let text = strip_code_fence(text.trim());
    if text.is_empty() {
        return Err(GenerationError::InvalidOutput("empty output".into()));
    }

    let mut response = if text.starts_with("HTTP/") {
        parse_generated(text)?
    } else {
        Response::new(200, "OK").with_body(text)
    };

    if !response.headers().contains("content-type") {
        response
            .headers_mut()
            .set("Content-Type", guess_content_type(request.path()));
    }
    if matches!(response.status(), 204 | 304) {
        response.clear_body();
    }
    Ok(response)
}

fn parse_generated(text: &str) -> Result<Response, GenerationError> {
    let (head, body) = split_head(text);
    let mut lines = head.lines();

    let status_line = lines.next().unwrap_or_default().trim();
    let mut parts = status_line.splitn(3, ' ');
    let _version = parts.next();
    let status: u16 = parts
        .next()
        .and_then(|code| code.parse().ok())
        .filter(|code| (200..=599).contains(code))
        .ok_or_else(|| GenerationError::InvalidOutput(format!("bad status line '{}'", status_line)))?;
    let reason = match parts.next().map(str::trim) {
        Some(reason) if !reason.is_empty() && is_valid_value(reason) => reason.to_string(),
        _ => reason_phrase(status).to_string(),
    };

    let mut response = Response::new(status, reason).with_body(body);
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            tracing::debug!(line = %line, "Skipping generated header line without colon");
            continue;
        };
        let value = value.trim();
        if name.is_empty() || !name.bytes().all(is_token_byte) || !is_valid_value(value) {
            tracing::debug!(header = %name, "Skipping invalid generated header");
            continue;
        }
        if is_hop_by_hop(name) {
            continue;
        }
        response.headers_mut().append(name, value);
    }
    Ok(response)
}

/// Split at the first blank line, whichever line ending the text uses.
fn split_head(text: &str) -> (&str, &str) {
    let crlf = text.find("\r\n\r\n").map(|i| (i, 4));
    let lf = text.find("\n\n").map(|i| (i, 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };
    match split {
        Some((at, len)) => (&text[..at], &text[at + len..]),
        None => (text, ""),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. "```http") along with the opening fence.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => "",
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn is_hop_by_hop(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    HOP_BY_HOP.contains(&lower.as_str()) || lower.starts_with("proxy-")
}

/// Content type implied by the extension of the requested path.
pub fn guess_content_type(path: &str) -> &'static str {
    let file = path.rsplit('/').next().unwrap_or_default();
    let extension = match file.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    };
    match extension.as_str() {
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "csv" => "text/csv; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        _ => "text/html; charset=utf-8",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str) -> Request {
        Request::parse(format!("GET {} HTTP/1.1\r\n\r\n", path).as_bytes()).unwrap()
    }

    #[test]
    fn parses_full_response_with_lf_endings() {
        let text = "HTTP/1.1 200 OK\nContent-Type: text/html\nX-Powered-By: dreams\n\n<h1>Hi</h1>";
        let response = interpret_output(text, &get("/")).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.reason(), "OK");
        assert_eq!(response.headers().get("x-powered-by"), Some("dreams"));
        assert_eq!(response.body(), b"<h1>Hi</h1>");
    }

    #[test]
    fn strips_fences_and_unsafe_headers() {
        let text = "```http\r\nHTTP/1.1 404 Not Found\r\nContent-Length: 9999\r\nTransfer-Encoding: chunked\r\nConnection: keep-alive\r\nProxy-Authenticate: x\r\nContent-Type: text/plain\r\n\r\nmissing\r\n```";
        let response = interpret_output(text, &get("/nope")).unwrap();
        assert_eq!(response.status(), 404);
        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.headers().get("Content-Type"), Some("text/plain"));
        assert_eq!(response.body(), b"missing");
    }

    #[test]
    fn bare_text_is_wrapped_as_200() {
        let response = interpret_output("body { color: red; }", &get("/style.css")).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get("content-type"),
            Some("text/css; charset=utf-8")
        );
        assert_eq!(response.body(), b"body { color: red; }");
    }

    #[test]
    fn missing_content_type_is_guessed() {
        let response = interpret_output("HTTP/1.1 200 OK\r\n\r\n{}", &get("/api/data.json")).unwrap();
        assert_eq!(response.headers().get("content-type"), Some("application/json"));
    }

    #[test]
    fn rejects_empty_and_informational_output() {
        assert!(matches!(
            interpret_output("   ", &get("/")),
            Err(GenerationError::InvalidOutput(_))
        ));
        assert!(matches!(
            interpret_output("HTTP/1.1 101 Switching Protocols\r\n\r\n", &get("/")),
            Err(GenerationError::InvalidOutput(_))
        ));
        assert!(matches!(
            interpret_output("HTTP/1.1 abc\r\n\r\n", &get("/")),
            Err(GenerationError::InvalidOutput(_))
        ));
    }

    #[test]
    fn missing_reason_uses_canonical_phrase() {
        let response = interpret_output("HTTP/1.1 503\r\n\r\ndown", &get("/")).unwrap();
        assert_eq!(response.reason(), "Service Unavailable");
    }

    #[test]
    fn no_content_drops_body() {
        let response = interpret_output("HTTP/1.1 204 No Content\r\n\r\nstray", &get("/")).unwrap();
        assert!(response.body().is_empty());
    }

    #[test]
    fn content_type_guesses() {
        assert_eq!(guess_content_type("/"), "text/html; charset=utf-8");
        assert_eq!(guess_content_type("/app.JS"), "text/javascript; charset=utf-8");
        assert_eq!(guess_content_type("/v1.2/readme"), "text/html; charset=utf-8");
        assert_eq!(guess_content_type("/notes.txt"), "text/plain; charset=utf-8");
    }
}
