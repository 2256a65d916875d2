//! Prompt construction.
//!
//! The user message is the request itself, written back out as HTTP/1.1
//! text, so the provider sees method, target, headers and body exactly as
//! they were parsed.

use crate::http::Request;

/// Built-in system instruction sent with every generation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are the content engine of a web server. Every message you receive is a raw HTTP/1.1 request \
sent by a browser or another client. Reply with the single HTTP/1.1 response that best answers it.

Response format:
- Start with a status line such as `HTTP/1.1 200 OK`, then headers, a blank line, and the body.
- Always send a Content-Type header. Never send Content-Length, Transfer-Encoding or Connection headers.
- Do not wrap the response in Markdown fences and do not add any commentary.

Content:
- Use the path, query string, cookies and Referer header to decide what the client wants.
- For pages, produce complete HTML with inline CSS and JavaScript, a <title>, and a clean, responsive design.
- For files such as .css, .js, .json or .txt, return only the file content with the matching Content-Type.
- Never return binary media such as images or video.
- Use realistic data, never placeholders. Link to other pages on this same server with descriptive paths; \
the home page `/` should link to at least five of them.";

/// A system instruction plus the rendered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn for_request(request: &Request, system: &str) -> Self {
        Self {
            system: system.to_string(),
            user: render_request(request),
        }
    }
}

/// Render a parsed request back to HTTP/1.1 text. Deterministic for a given
/// request; non-UTF-8 body bytes are replaced.
pub fn render_request(request: &Request) -> String {
    let mut out = format!(
        "{} {} {}\r\n",
        request.method(),
        request.target(),
        request.version()
    );
    out.push_str(&request.headers().to_string());
    out.push_str("\r\n");
    out.push_str(&String::from_utf8_lossy(request.body()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_request_as_http_text() {
        let request = Request::parse(
            b"POST /form?x=1 HTTP/1.1\r\nHost: site\r\nContent-Length: 3\r\n\r\na=b",
        )
        .unwrap();
        assert_eq!(
            render_request(&request),
            "POST /form?x=1 HTTP/1.1\r\nHost: site\r\nContent-Length: 3\r\n\r\na=b"
        );
    }

    #[test]
    fn prompt_is_deterministic() {
        let request = Request::parse(b"GET / HTTP/1.1\r\nHost: site\r\n\r\n").unwrap();
        assert_eq!(
            Prompt::for_request(&request, DEFAULT_SYSTEM_PROMPT),
            Prompt::for_request(&request, DEFAULT_SYSTEM_PROMPT)
        );
    }
}
