//! Canonical text for response bodies
//!
//! Every registered content type maps to a [`Normalizer`] that turns a raw
//! body into text that is stable under insignificant changes (key order for
//! JSON, whitespace and attribute order for HTML). Canonical JSON is a single
//! line without a trailing newline; canonical HTML ends every node line with
//! one.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use ego_tree::NodeRef;
use scraper::{Html, Node};
use serde::Serialize;
use serde_json::Value;

use crate::dispatch::fold_content_type;
use crate::error::{TowelError, TowelResult};

pub const JSON: &str = "application/json";
pub const HTML: &str = "text/html";

/// Turns a response body into canonical text
pub trait Normalizer: Send + Sync {
    fn normalize(&self, text: &str) -> TowelResult<String>;
}

/// Content type to normalizer mapping
#[derive(Clone)]
pub struct NormalizerRegistry {
    handlers: HashMap<String, Arc<dyn Normalizer>>,
}

impl NormalizerRegistry {
    /// Registry without any handler
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register (or replace) the handler for a content type
    pub fn register<N>(&mut self, content_type: &str, normalizer: N) -> &mut Self
    where
        N: Normalizer + 'static,
    {
        self.handlers
            .insert(fold_content_type(content_type), Arc::new(normalizer));
        self
    }

    pub fn get(&self, content_type: &str) -> TowelResult<&dyn Normalizer> {
        self.handlers
            .get(&fold_content_type(content_type))
            .map(|n| n.as_ref())
            .ok_or_else(|| TowelError::UnsupportedContentType(content_type.to_string()))
    }

    pub fn normalize(&self, content_type: &str, text: &str) -> TowelResult<String> {
        self.get(content_type)?.normalize(text)
    }

    pub fn content_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl Default for NormalizerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(JSON, JsonNormalizer).register(HTML, HtmlNormalizer);
        registry
    }
}

/// Sorted keys, single line, `", "` and `": "` separators
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonNormalizer;

impl Normalizer for JsonNormalizer {
    fn normalize(&self, text: &str) -> TowelResult<String> {
        let value: Value = serde_json::from_str(text).map_err(|e| TowelError::MalformedBody {
            content_type: JSON.to_string(),
            reason: e.to_string(),
        })?;

        let mut out = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, SpacedFormatter);
        sort_keys(value).serialize(&mut serializer)?;

        String::from_utf8(out).map_err(|e| TowelError::MalformedBody {
            content_type: JSON.to_string(),
            reason: e.to_string(),
        })
    }
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        scalar => scalar,
    }
}

struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// One node per line, two-space indent, sorted attributes, collapsed text
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlNormalizer;

const INDENT: &str = "  ";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

// Text inside these is not entity-decoded by the parser, so it must not be escaped
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe", "noembed", "noframes", "noscript", "script", "style", "xmp",
];

impl Normalizer for HtmlNormalizer {
    fn normalize(&self, text: &str) -> TowelResult<String> {
        let document = Html::parse_document(text);
        let mut out = String::new();
        render(document.tree.root(), 0, false, &mut out);
        Ok(out)
    }
}

fn render(node: NodeRef<'_, Node>, depth: usize, raw_text: bool, out: &mut String) {
    match node.value() {
        Node::Document | Node::Fragment => {
            for child in node.children() {
                render(child, depth, raw_text, out);
            }
        }
        Node::Doctype(doctype) => push_line(out, depth, &format!("<!DOCTYPE {}>", doctype.name())),
        Node::Comment(comment) => {
            let comment: &str = comment;
            push_line(out, depth, &format!("<!--{}-->", collapse_whitespace(comment)));
        }
        Node::Text(text) => {
            let text: &str = text;
            let collapsed = collapse_whitespace(text);
            if collapsed.is_empty() {
                return;
            }
            if raw_text {
                push_line(out, depth, &collapsed);
            } else {
                push_line(out, depth, &escape(&collapsed, false));
            }
        }
        Node::Element(element) => {
            let name = element.name();
            let mut attrs: Vec<(&str, &str)> = element.attrs().collect();
            attrs.sort_unstable();

            let mut open = format!("<{}", name);
            for (key, value) in attrs {
                open.push_str(&format!(" {}=\"{}\"", key, escape(value, true)));
            }
            open.push('>');

            if VOID_ELEMENTS.contains(&name) {
                push_line(out, depth, &open);
                return;
            }

            let mut inner = String::new();
            let child_raw = RAW_TEXT_ELEMENTS.contains(&name);
            for child in node.children() {
                render(child, depth + 1, child_raw, &mut inner);
            }

            if inner.is_empty() {
                push_line(out, depth, &format!("{}</{}>", open, name));
            } else {
                push_line(out, depth, &open);
                out.push_str(&inner);
                push_line(out, depth, &format!("</{}>", name));
            }
        }
        _ => {}
    }
}

fn push_line(out: &mut String, depth: usize, line: &str) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(line);
    out.push('\n');
}

fn collapse_whitespace(text: &str) -> String {
    text.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape(text: &str, attribute: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' if !attribute => escaped.push_str("&lt;"),
            '>' if !attribute => escaped.push_str("&gt;"),
            '"' if attribute => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}
