mod common;

use folio_pdf::{TemplateContext, substitute};
use serde_json::json;

#[test]
fn unresolvable_token_is_left_verbatim() {
    let layout = common::layout(json!({
        "metadata": {"title": "Quarterly"},
        "elements": [{"type": "text", "content": "Owner: {{missing.path}}"}]
    }));
    assert_eq!(common::texts(&layout.pages[0]), vec!["Owner: {{missing.path}}"]);
    assert!(layout.warnings.is_empty());
}

#[test]
fn metadata_context_and_clock_tokens_resolve() {
    let layout = common::layout(json!({
        "metadata": {"title": "Quarterly", "department": "Finance"},
        "context": {"company": {"name": "Acme"}},
        "elements": [
            {"type": "heading", "text": "{{metadata.title}} for {{company.name}}"},
            {"type": "text", "content": "{{metadata.department}} {{date}} {{year}}"}
        ]
    }));
    let texts = common::texts(&layout.pages[0]);
    assert_eq!(texts, vec!["Quarterly for Acme", "Finance 2024-03-01 2024"]);
    assert_eq!(layout.headings[0].title, "Quarterly for Acme");
}

#[test]
fn page_tokens_only_resolve_in_overlays() {
    let ctx = TemplateContext::new(serde_json::Map::new(), common::clock());
    assert_eq!(substitute("{{page}} of {{total}}", &ctx), "{{page}} of {{total}}");
    assert_eq!(substitute("{{page}} of {{total}}", &ctx.for_page(3, 8)), "3 of 8");
    assert_eq!(substitute("{{datetime}}", &ctx), "2024-03-01 09:30");

    let layout = common::layout(json!({
        "pageTemplate": {"footer": {"enabled": true, "left": {"content": "{{page}}/{{total}} {{nope}}"}}},
        "elements": [{"type": "text", "content": "{{page}}"}]
    }));
    let texts = common::texts(&layout.pages[0]);
    assert_eq!(texts, vec!["{{page}}", "1/1 {{nope}}"]);
}
