//! Preview document generation
//!
//! Builds the complete HTML document that is assigned to the preview
//! iframe's `srcdoc`. The document carries a fixed CSS reset, the user's
//! CSS, HTML and JS, and the bridge script that forwards console calls and
//! runtime errors to the parent page.
//!
//! User CSS and JS are embedded inside `<style>` and `<script>` raw-text
//! blocks, so the only thing that can break out of them is a matching
//! closing tag. [`escape_closing_tags`] neutralizes exactly that. It is not
//! an HTML sanitizer: running the user's script is the point of the preview.

use std::fmt::Write;

use crate::{CodeBuffer, DEFAULT_TARGET_ORIGIN};

/// Options that shape the generated document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOptions {
    /// Target origin passed to every `parent.postMessage` call
    pub target_origin: String,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            target_origin: DEFAULT_TARGET_ORIGIN.to_string(),
        }
    }
}

impl DocumentOptions {
    pub fn with_target_origin(mut self, origin: impl Into<String>) -> Self {
        self.target_origin = origin.into();
        self
    }
}

const RESET_CSS: &str = "    /* Reset styles */
    * { box-sizing: border-box; }
    body {
      margin: 0;
      padding: 16px;
      font-family: system-ui, -apple-system, sans-serif;
      background: white;
      color: #1a1a1a;
    }
";

/// Console interception and error capture. `__TARGET_ORIGIN__` is replaced
/// by a JS string literal.
const BRIDGE_PRELUDE: &str = "    // Console capture - forward to parent
    const originalConsole = { ...console };
    ['log', 'warn', 'error', 'info'].forEach(method => {
      console[method] = (...args) => {
        const formatted = args.map(arg => {
          if (typeof arg === 'object') {
            try {
              return JSON.stringify(arg, null, 2);
            } catch {
              return String(arg);
            }
          }
          return String(arg);
        });
        parent.postMessage({
          type: 'console',
          method,
          args: formatted,
          timestamp: Date.now()
        }, __TARGET_ORIGIN__);
        originalConsole[method](...args);
      };
    });

    // Error capture
    window.onerror = (msg, url, line, col, error) => {
      parent.postMessage({
        type: 'error',
        message: String(msg),
        line: line || 0,
        col: col || 0,
        stack: error && error.stack
      }, __TARGET_ORIGIN__);
      return false;
    };

    // Unhandled promise rejection
    window.onunhandledrejection = (event) => {
      parent.postMessage({
        type: 'error',
        message: 'Unhandled Promise Rejection: ' + event.reason,
        line: 0,
        col: 0
      }, __TARGET_ORIGIN__);
    };
";

const USER_CODE_CATCH: &str = "      } catch (e) {
        console.error(e.message);
        parent.postMessage({
          type: 'error',
          message: String(e.message),
          line: e.lineNumber || 0,
          col: e.columnNumber || 0,
          stack: e.stack
        }, __TARGET_ORIGIN__);
      }
    }

    if (document.readyState === 'loading') {
      document.addEventListener('DOMContentLoaded', runUserCode);
    } else {
      runUserCode();
    }
";

/// Neutralize closing-tag sequences for `tag` inside `code`.
///
/// Every `</tag` (any case) that the HTML tokenizer would treat as an end
/// tag, i.e. followed by `>`, `/`, whitespace or the end of the input, gets
/// a backslash after the `<`. `</styles>` does not close a `<style>` block
/// and is left alone.
pub fn escape_closing_tags(code: &str, tag: &str) -> String {
    if code.is_empty() {
        return String::new();
    }

    let bytes = code.as_bytes();
    let tag = tag.as_bytes();
    let mut out = String::with_capacity(code.len());
    let mut copied = 0;
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i] == b'<' && bytes[i + 1] == b'/' && is_end_tag_at(bytes, i + 2, tag) {
            out.push_str(&code[copied..i]);
            out.push_str("<\\/");
            i += 2;
            copied = i;
        } else {
            i += 1;
        }
    }
    out.push_str(&code[copied..]);
    out
}

fn is_end_tag_at(bytes: &[u8], start: usize, tag: &[u8]) -> bool {
    let end = start + tag.len();
    if end > bytes.len() || !bytes[start..end].eq_ignore_ascii_case(tag) {
        return false;
    }
    match bytes.get(end) {
        None => true,
        Some(b) => *b == b'>' || *b == b'/' || b.is_ascii_whitespace(),
    }
}

/// Generate the preview document with default options.
pub fn generate_preview_document(buffer: &CodeBuffer) -> String {
    generate_preview_document_with(buffer, &DocumentOptions::default())
}

/// Generate the preview document.
pub fn generate_preview_document_with(buffer: &CodeBuffer, options: &DocumentOptions) -> String {
    let safe_css = escape_closing_tags(&buffer.css, "style");
    let safe_js = escape_closing_tags(&buffer.js, "script");
    let origin = origin_literal(&options.target_origin);

    let mut doc = String::with_capacity(
        RESET_CSS.len() + BRIDGE_PRELUDE.len() + USER_CODE_CATCH.len() + buffer.html.len()
            + safe_css.len()
            + safe_js.len()
            + 512,
    );

    // Writing into a String cannot fail.
    let _ = write!(
        doc,
        "<!DOCTYPE html>
<html>
<head>
  <meta charset=\"UTF-8\">
  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">
  <style>
{RESET_CSS}    /* User CSS */
    {safe_css}
  </style>
</head>
<body>
  {html}
  <script>
{prelude}
    // User JavaScript, deferred until the DOM is ready
    function runUserCode() {{
      try {{
        {safe_js}
{catch}  </script>
</body>
</html>
",
        html = buffer.html,
        prelude = BRIDGE_PRELUDE.replace("__TARGET_ORIGIN__", &origin),
        catch = USER_CODE_CATCH.replace("__TARGET_ORIGIN__", &origin),
    );

    doc
}

/// Render the target origin as a JS string literal that cannot close the
/// surrounding script block.
fn origin_literal(origin: &str) -> String {
    let quoted = serde_json::to_string(origin).unwrap_or_else(|_| "\"*\"".to_string());
    escape_closing_tags(&quoted, "script")
}
