//! Rendering of stored rich-text documents.
//!
//! Message content is stored as the composer's serialized JSON document:
//! a `doc` node containing block nodes (`paragraph`, `heading`,
//! `bulletList`, `orderedList`, `listItem`, `codeBlock`, `hardBreak`) whose
//! leaves are `text` nodes with optional marks (`bold`, `italic`, `strike`,
//! `code`).  The editor itself is an external collaborator; this module only
//! renders what it produced.
//!
//! Two projections are provided:
//! - [`plain_text`] strips all structure, used for length validation.
//! - [`to_html`] renders an escaped HTML fragment for display.
//!
//! Content that does not parse as a document is treated as plain text, so
//! legacy or test fixtures round-trip unharmed.

use serde_json::Value;

/// Extract the concatenated text content of a serialized document.
///
/// Falls back to the raw string when the content is not a JSON document.
pub fn plain_text(content: &str) -> String {
    match serde_json::from_str::<Value>(content) {
        Ok(doc) if doc.is_object() => {
            let mut out = String::new();
            collect_text(&doc, &mut out);
            out
        }
        _ => content.to_string(),
    }
}

/// Render a serialized document as an escaped HTML fragment.
///
/// Unknown node types render their children transparently; content that is
/// not a JSON document is escaped and wrapped in a paragraph.
pub fn to_html(content: &str) -> String {
    match serde_json::from_str::<Value>(content) {
        Ok(doc) if doc.is_object() => {
            let mut out = String::new();
            render_node(&doc, &mut out);
            out
        }
        _ => format!("<p>{}</p>", escape(content)),
    }
}

fn collect_text(node: &Value, out: &mut String) {
    if node.get("type").and_then(Value::as_str) == Some("text") {
        if let Some(text) = node.get("text").and_then(Value::as_str) {
            out.push_str(text);
        }
        return;
    }

    if node.get("type").and_then(Value::as_str) == Some("hardBreak") {
        out.push('\n');
        return;
    }

    if let Some(children) = node.get("content").and_then(Value::as_array) {
        let is_block = matches!(
            node.get("type").and_then(Value::as_str),
            Some("paragraph" | "heading" | "codeBlock" | "listItem")
        );
        for child in children {
            collect_text(child, out);
        }
        if is_block && !out.ends_with('\n') && !out.is_empty() {
            out.push('\n');
        }
    }
}

fn render_node(node: &Value, out: &mut String) {
    let node_type = node.get("type").and_then(Value::as_str).unwrap_or("");

    match node_type {
        "text" => {
            let text = node.get("text").and_then(Value::as_str).unwrap_or("");
            render_marked_text(text, node.get("marks"), out);
        }
        "hardBreak" => out.push_str("<br>"),
        "paragraph" => wrap(node, "p", out),
        "heading" => {
            // Levels outside 1..=6 are clamped; the composer only emits 1-3.
            let level = node
                .get("attrs")
                .and_then(|a| a.get("level"))
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, 6);
            let tag = format!("h{level}");
            wrap(node, &tag, out);
        }
        "bulletList" => wrap(node, "ul", out),
        "orderedList" => wrap(node, "ol", out),
        "listItem" => wrap(node, "li", out),
        "codeBlock" => {
            out.push_str("<pre><code>");
            render_children(node, out);
            out.push_str("</code></pre>");
        }
        // `doc` and anything unknown: render children only.
        _ => render_children(node, out),
    }
}

fn render_children(node: &Value, out: &mut String) {
    if let Some(children) = node.get("content").and_then(Value::as_array) {
        for child in children {
            render_node(child, out);
        }
    }
}

fn wrap(node: &Value, tag: &str, out: &mut String) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    render_children(node, out);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn render_marked_text(text: &str, marks: Option<&Value>, out: &mut String) {
    let mark_tags: Vec<&str> = marks
        .and_then(Value::as_array)
        .map(|marks| {
            marks
                .iter()
                .filter_map(|m| m.get("type").and_then(Value::as_str))
                .filter_map(|t| match t {
                    "bold" => Some("strong"),
                    "italic" => Some("em"),
                    "strike" => Some("s"),
                    "code" => Some("code"),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    for tag in &mark_tags {
        out.push('<');
        out.push_str(tag);
        out.push('>');
    }
    out.push_str(&escape(text));
    for tag in mark_tags.iter().rev() {
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
}

/// Minimal HTML escaping for text content.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
