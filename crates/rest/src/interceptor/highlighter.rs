//! Browser-friendly response rendering.

use std::fmt::Write;

use serde_json::Value;
use tracing::trace;

use super::{Interceptor, OutgoingResponse, RequestDetails};

/// Renders FHIR JSON responses as highlighted HTML when the request comes
/// from a browser.
///
/// A request counts as a browser request when its `Accept` header lists
/// `text/html` and it did not ask for a specific `_format` (other than
/// `html`). Only JSON bodies are rewritten; everything else passes through.
#[derive(Debug, Default, Clone)]
pub struct ResponseHighlighterInterceptor;

impl ResponseHighlighterInterceptor {
    /// Creates the interceptor.
    pub fn new() -> Self {
        Self
    }

    fn wants_html(request: &RequestDetails) -> bool {
        match request.param("_format") {
            Some(format) => matches!(format.to_lowercase().as_str(), "html" | "text/html"),
            None => request
                .accept()
                .is_some_and(|accept| accept.to_lowercase().contains("text/html")),
        }
    }
}

impl Interceptor for ResponseHighlighterInterceptor {
    fn name(&self) -> &str {
        "responseHighlighter"
    }

    fn outgoing_response(&self, request: &RequestDetails, response: &mut OutgoingResponse) {
        if !Self::wants_html(request) {
            return;
        }

        let is_json = response
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("json"));
        if !is_json {
            return;
        }

        let Ok(value) = serde_json::from_str::<Value>(&response.body) else {
            return;
        };

        trace!(path = %request.path, "Highlighting response for browser");
        response.body = render_page(&request.path, &value);
        response.content_type = Some("text/html;charset=utf-8".to_string());
    }
}

fn render_page(title: &str, value: &Value) -> String {
    let mut body = String::new();
    write_value(&mut body, value, 0);

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n<title>{title}</title>\n<style>\n\
         .hlKey {{ color: #0b5394; }}\n.hlString {{ color: #38761d; }}\n\
         .hlLiteral {{ color: #990000; }}\npre {{ font-size: 13px; }}\n</style>\n</head>\n\
         <body>\n<pre>{body}</pre>\n</body>\n</html>\n",
        title = html_escape::encode_text(title),
        body = body
    )
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Object(map) => {
            if map.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push_str("{\n");
            let last = map.len() - 1;
            for (i, (key, child)) in map.iter().enumerate() {
                indent(out, depth + 1);
                let _ = write!(
                    out,
                    "<span class=\"hlKey\">\"{}\"</span>: ",
                    html_escape::encode_text(key)
                );
                write_value(out, child, depth + 1);
                if i != last {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, depth);
            out.push('}');
        }
        Value::Array(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push_str("[\n");
            let last = items.len() - 1;
            for (i, item) in items.iter().enumerate() {
                indent(out, depth + 1);
                write_value(out, item, depth + 1);
                if i != last {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, depth);
            out.push(']');
        }
        Value::String(s) => {
            // Serialize first so JSON escapes survive, then escape for HTML
            let quoted = serde_json::to_string(s).unwrap_or_default();
            let _ = write!(
                out,
                "<span class=\"hlString\">{}</span>",
                html_escape::encode_text(&quoted)
            );
        }
        other => {
            let _ = write!(out, "<span class=\"hlLiteral\">{}</span>", other);
        }
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}
