//! Reading canvas code from files

use anyhow::{bail, Context};
use canvas_sandbox::{is_runnable_language, parse_html_code, CodeBuffer, SourceLanguage};
use clap::Args;
use std::path::{Path, PathBuf};

/// Where the canvas code comes from
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// HTML file
    #[arg(long, value_name = "FILE")]
    pub html: Option<PathBuf>,

    /// CSS file
    #[arg(long, value_name = "FILE")]
    pub css: Option<PathBuf>,

    /// JavaScript file
    #[arg(long, value_name = "FILE")]
    pub js: Option<PathBuf>,

    /// Single file split into buffers by language (a full HTML page, or CSS/JS)
    #[arg(long, value_name = "FILE", conflicts_with_all = ["html", "css", "js"])]
    pub from: Option<PathBuf>,

    /// Language of --from; guessed from the extension when omitted
    #[arg(long, short, requires = "from")]
    pub language: Option<String>,
}

impl SourceArgs {
    pub fn load(&self) -> anyhow::Result<CodeBuffer> {
        if let Some(path) = &self.from {
            return load_single(path, self.language.as_deref());
        }

        if self.html.is_none() && self.css.is_none() && self.js.is_none() {
            bail!("no code given: pass --html/--css/--js or --from");
        }

        Ok(CodeBuffer::new(
            read_optional(self.html.as_deref())?,
            read_optional(self.css.as_deref())?,
            read_optional(self.js.as_deref())?,
        ))
    }
}

/// Split one file into buffers according to `language` or its extension.
pub fn load_single(path: &Path, language: Option<&str>) -> anyhow::Result<CodeBuffer> {
    let language = match language {
        Some(language) => language.to_string(),
        None => guess_language(path),
    };
    if !is_runnable_language(&language) {
        bail!("language '{}' cannot be opened in the canvas", language);
    }

    let code = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_html_code(&code, &language))
}

/// Language tag from a file extension; HTML when unknown.
pub fn guess_language(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    match SourceLanguage::from_tag(ext) {
        SourceLanguage::Css => "css".to_string(),
        SourceLanguage::JavaScript => "javascript".to_string(),
        _ => "html".to_string(),
    }
}

fn read_optional(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => Ok(String::new()),
    }
}
