//! Splitting a fenced code block into canvas buffers
//!
//! A chat answer usually carries a single code block. Before it can be
//! opened in the canvas it is split into the three buffers: CSS and JS
//! blocks go to their own tab, and an HTML page has its embedded `<style>`
//! and `<script>` bodies lifted out and its document scaffolding stripped.

use lazy_static::lazy_static;
use regex::Regex;

use crate::CodeBuffer;

lazy_static! {
    static ref STYLE_BLOCK: Regex = Regex::new(r"(?is)<style[^>]*>(.*?)</style>").unwrap();
    static ref SCRIPT_BLOCK: Regex = Regex::new(r"(?is)<script[^>]*>(.*?)</script>").unwrap();
    static ref DOCTYPE: Regex = Regex::new(r"(?i)<!DOCTYPE[^>]*>").unwrap();
    static ref HTML_TAG: Regex = Regex::new(r"(?i)</?html[^>]*>").unwrap();
    static ref HEAD_BLOCK: Regex = Regex::new(r"(?is)<head[^>]*>.*?</head>").unwrap();
    static ref BODY_TAG: Regex = Regex::new(r"(?i)</?body[^>]*>").unwrap();
}

/// Language of a fenced code block, as far as the canvas cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Html,
    Css,
    JavaScript,
    Other,
}

impl SourceLanguage {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "html" | "htm" => SourceLanguage::Html,
            "css" => SourceLanguage::Css,
            "javascript" | "js" | "jsx" => SourceLanguage::JavaScript,
            _ => SourceLanguage::Other,
        }
    }

    pub fn is_runnable(&self) -> bool {
        !matches!(self, SourceLanguage::Other)
    }
}

/// Whether a code block with this language tag can be opened in the canvas.
pub fn is_runnable_language(tag: &str) -> bool {
    SourceLanguage::from_tag(tag).is_runnable()
}

/// Split `code` into canvas buffers according to its language tag.
pub fn parse_html_code(code: &str, tag: &str) -> CodeBuffer {
    match SourceLanguage::from_tag(tag) {
        SourceLanguage::Css => CodeBuffer::new("", code, ""),
        SourceLanguage::JavaScript => CodeBuffer::new("", "", code),
        SourceLanguage::Html => split_html_page(code),
        SourceLanguage::Other => CodeBuffer::new(code, "", ""),
    }
}

fn split_html_page(code: &str) -> CodeBuffer {
    let css = collect_block_bodies(&STYLE_BLOCK, code);
    let js = collect_block_bodies(&SCRIPT_BLOCK, code);

    let html = STYLE_BLOCK.replace_all(code, "");
    let html = SCRIPT_BLOCK.replace_all(&html, "");
    let html = DOCTYPE.replace(&html, "");
    let html = HTML_TAG.replace_all(&html, "");
    let html = HEAD_BLOCK.replace_all(&html, "");
    let html = BODY_TAG.replace_all(&html, "");

    CodeBuffer::new(html.trim(), css.trim(), js.trim())
}

fn collect_block_bodies(pattern: &Regex, code: &str) -> String {
    pattern
        .captures_iter(code)
        .filter_map(|caps| caps.get(1))
        .fold(String::new(), |mut acc, body| {
            acc.push_str(body.as_str());
            acc.push('\n');
            acc
        })
}
