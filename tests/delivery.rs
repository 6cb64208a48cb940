use std::collections::HashMap;
use std::path::Path;

use clap::Parser;
use pagewatch::delivery::{build_document, escape_html, render, write_document, BuildArgs, OBSERVER_SCRIPT_SLOT};
use pagewatch::RenderError;

fn insertions(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

#[test]
fn test_triple_stache_inserts_verbatim() {
    let script = "if (a < b && c) { window.x = \"y\"; }";
    let rendered = render(
        "<script>{{{observer-script}}}</script>",
        &insertions(&[(OBSERVER_SCRIPT_SLOT, script)]),
    )
    .unwrap();

    assert_eq!(rendered, format!("<script>{script}</script>"));
}

#[test]
fn test_double_stache_escapes_html() {
    let rendered = render("<p>{{ title }}</p>", &insertions(&[("title", "<a href='x'>`=&")])).unwrap();
    assert_eq!(rendered, "<p>&lt;a href&#x3D;&#x27;x&#x27;&gt;&#x60;&#x3D;&amp;</p>");

    let raw = render("{{& title}}", &insertions(&[("title", "<b>")])).unwrap();
    assert_eq!(raw, "<b>");
}

#[test]
fn test_backslash_escapes_a_tag() {
    let values = insertions(&[("x", "v")]);

    assert_eq!(render(r"\{{x}}", &values).unwrap(), "{{x}}");
    assert_eq!(render(r"\\{{x}}", &values).unwrap(), r"\v");
    assert_eq!(render(r"a\b {{x}}", &values).unwrap(), r"a\b v");
}

#[test]
fn test_unknown_names_and_comments_render_empty() {
    let rendered = render("[{{missing}}][{{! a note }}][{{{also-missing}}}]", &HashMap::new()).unwrap();
    assert_eq!(rendered, "[][][]");
}

#[test]
fn test_text_without_tags_is_unchanged() {
    let template = "<html>{ not a tag } }} </html>";
    assert_eq!(render(template, &HashMap::new()).unwrap(), template);
}

#[test]
fn test_malformed_tags_are_errors() {
    let none = HashMap::new();

    assert_eq!(render("abc {{x", &none).unwrap_err(), RenderError::Unterminated { offset: 4 });
    assert_eq!(render("{{{x}}", &none).unwrap_err(), RenderError::Unterminated { offset: 0 });
    assert_eq!(render("ab{{  }}", &none).unwrap_err(), RenderError::EmptyTag { offset: 2 });
    assert!(matches!(
        render("{{#each items}}", &none),
        Err(RenderError::UnsupportedTag { ref tag, offset: 0 }) if tag == "#each items"
    ));
}

#[test]
fn test_escape_html_leaves_plain_text_alone() {
    assert_eq!(escape_html("plain text 123"), "plain text 123");
    assert_eq!(escape_html("\"quoted\""), "&quot;quoted&quot;");
}

#[tokio::test]
async fn test_build_document_reads_both_sources() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("loader.html");
    let payload = dir.path().join("observer.js");
    std::fs::write(&template, "<html><script>{{{observer-script}}}</script></html>").unwrap();
    std::fs::write(&payload, "observe(window);").unwrap();

    let document = build_document(&template, &payload).await.unwrap();
    assert_eq!(document, "<html><script>observe(window);</script></html>");

    let output = dir.path().join("out.html");
    write_document(&document, Some(output.as_path())).await.unwrap();
    assert_eq!(std::fs::read_to_string(&output).unwrap(), document);
}

#[tokio::test]
async fn test_build_document_names_the_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("loader.html");
    std::fs::write(&template, "{{{observer-script}}}").unwrap();
    let payload = dir.path().join("absent.js");

    let err = build_document(&template, &payload).await.unwrap_err();
    assert!(format!("{err:#}").contains("absent.js"), "Error should name the file: {err:#}");
}

#[test]
fn test_command_line_takes_two_inputs_and_an_optional_output() {
    let args = BuildArgs::try_parse_from(["pagewatch-build", "loader.html", "observer.js"]).unwrap();
    assert_eq!(args.template, Path::new("loader.html"));
    assert_eq!(args.payload, Path::new("observer.js"));
    assert!(args.output.is_none(), "Without an output path the document goes to stdout");

    let args = BuildArgs::try_parse_from(["pagewatch-build", "a.html", "b.js", "out.html"]).unwrap();
    assert_eq!(args.output.as_deref(), Some(Path::new("out.html")));

    assert!(BuildArgs::try_parse_from(["pagewatch-build", "a.html"]).is_err());
    assert!(BuildArgs::try_parse_from(["pagewatch-build", "a", "b", "c", "d"]).is_err());
}
