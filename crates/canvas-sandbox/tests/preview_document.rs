//! Properties of the generated preview document

use canvas_sandbox::{escape_closing_tags, generate_preview_document, CodeBuffer};
use proptest::prelude::*;

/// The user CSS section of the style block
fn style_block(doc: &str) -> &str {
    let start = doc.find("/* User CSS */").unwrap();
    let end = doc.find("\n  </style>").unwrap();
    &doc[start..end]
}

/// From the user code marker up to the end of the script block
fn script_block(doc: &str) -> &str {
    let start = doc.find("function runUserCode()").unwrap();
    let end = doc.find("\n  </script>").unwrap();
    &doc[start..end]
}

fn case_variant(tag: &'static str) -> impl Strategy<Value = String> {
    proptest::collection::vec(any::<bool>(), tag.len()).prop_map(move |upper| {
        tag.chars()
            .zip(upper)
            .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
            .collect()
    })
}

proptest! {
    #[test]
    fn css_cannot_close_style_block(
        prefix in ".{0,40}",
        suffix in ".{0,40}",
        tag in case_variant("style"),
    ) {
        let css = format!("{}</{}>{}", prefix, tag, suffix);
        let doc = generate_preview_document(&CodeBuffer::new("", css, ""));
        let block = style_block(&doc);

        prop_assert!(!block.to_ascii_lowercase().contains("</style>"));
        let escaped_close = format!("<\\/{}>", tag);
        prop_assert!(block.contains(&escaped_close));
        prop_assert_eq!(doc.to_ascii_lowercase().matches("</style>").count(), 1);
    }

    #[test]
    fn js_cannot_close_script_block(
        prefix in ".{0,40}",
        suffix in ".{0,40}",
        tag in case_variant("script"),
    ) {
        let js = format!("{}</{}>{}", prefix, tag, suffix);
        let doc = generate_preview_document(&CodeBuffer::new("", "", js));
        let block = script_block(&doc);

        prop_assert!(!block.to_ascii_lowercase().contains("</script>"));
        let escaped_close = format!("<\\/{}>", tag);
        prop_assert!(block.contains(&escaped_close));
        prop_assert_eq!(doc.to_ascii_lowercase().matches("</script>").count(), 1);
    }

    #[test]
    fn escaping_only_inserts_backslashes(code in ".{0,80}") {
        let escaped = escape_closing_tags(&code, "script");
        prop_assert_eq!(escaped.replace("<\\/", "</"), code.replace("<\\/", "</"));
    }
}

#[test]
fn reference_buffer_layout() {
    let buffer = CodeBuffer::new("<p>hi</p>", "body{color:red}", "console.log(1)");
    let doc = generate_preview_document(&buffer);

    assert_eq!(doc.matches("<body>").count(), 1);
    assert_eq!(doc.matches("<style>").count(), 1);

    let body = &doc[doc.find("<body>").unwrap()..doc.find("</body>").unwrap()];
    assert!(body.contains("<p>hi</p>"));
    assert!(style_block(&doc).contains("body{color:red}"));

    let script = script_block(&doc);
    assert!(doc.contains("console[method] = (...args)"));
    assert!(script.contains("console.log(1)"));
    assert!(script.contains("document.addEventListener('DOMContentLoaded', runUserCode)"));
}
