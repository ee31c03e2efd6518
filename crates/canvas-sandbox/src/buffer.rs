//! Editable code buffers

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::SandboxError;

/// One of the three editor tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Html,
    Css,
    Js,
}

impl Tab {
    /// All tabs in display order
    pub const ALL: [Tab; 3] = [Tab::Html, Tab::Css, Tab::Js];

    /// Label shown on the tab button
    pub fn label(&self) -> &'static str {
        match self {
            Tab::Html => "HTML",
            Tab::Css => "CSS",
            Tab::Js => "JS",
        }
    }
}

impl std::fmt::Display for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tab::Html => write!(f, "html"),
            Tab::Css => write!(f, "css"),
            Tab::Js => write!(f, "js"),
        }
    }
}

impl FromStr for Tab {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(Tab::Html),
            "css" => Ok(Tab::Css),
            "js" => Ok(Tab::Js),
            other => Err(SandboxError::UnknownTab(other.to_string())),
        }
    }
}

/// HTML, CSS and JS sources of one canvas
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBuffer {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub js: String,
}

impl CodeBuffer {
    pub fn new(html: impl Into<String>, css: impl Into<String>, js: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            css: css.into(),
            js: js.into(),
        }
    }

    pub fn get(&self, tab: Tab) -> &str {
        match tab {
            Tab::Html => &self.html,
            Tab::Css => &self.css,
            Tab::Js => &self.js,
        }
    }

    pub fn set(&mut self, tab: Tab, value: impl Into<String>) {
        let value = value.into();
        match tab {
            Tab::Html => self.html = value,
            Tab::Css => self.css = value,
            Tab::Js => self.js = value,
        }
    }

    pub fn has_content(&self, tab: Tab) -> bool {
        !self.get(tab).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        Tab::ALL.iter().all(|tab| !self.has_content(*tab))
    }

    /// Tab the editor opens on: the first one with content, HTML otherwise.
    pub fn initial_tab(&self) -> Tab {
        Tab::ALL
            .into_iter()
            .find(|tab| self.has_content(*tab))
            .unwrap_or(Tab::Html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_parse_and_display() {
        assert_eq!("JS".parse::<Tab>().unwrap(), Tab::Js);
        assert_eq!("css".parse::<Tab>().unwrap(), Tab::Css);
        assert!("python".parse::<Tab>().is_err());
        assert_eq!(Tab::Html.to_string(), "html");
        assert_eq!(Tab::Js.label(), "JS");
    }

    #[test]
    fn test_get_set() {
        let mut buffer = CodeBuffer::default();
        assert!(buffer.is_empty());

        buffer.set(Tab::Js, "console.log(1)");
        assert_eq!(buffer.get(Tab::Js), "console.log(1)");
        assert!(buffer.has_content(Tab::Js));
        assert!(!buffer.has_content(Tab::Css));
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_initial_tab_prefers_first_non_empty() {
        assert_eq!(CodeBuffer::default().initial_tab(), Tab::Html);
        assert_eq!(CodeBuffer::new("", "a{}", "x()").initial_tab(), Tab::Css);
        assert_eq!(CodeBuffer::new("", "", "x()").initial_tab(), Tab::Js);
        assert_eq!(CodeBuffer::new("<p/>", "", "x()").initial_tab(), Tab::Html);
    }

    #[test]
    fn test_missing_fields_deserialize_empty() {
        let buffer: CodeBuffer = serde_json::from_str(r#"{"js":"go()"}"#).unwrap();
        assert_eq!(buffer, CodeBuffer::new("", "", "go()"));
    }
}
