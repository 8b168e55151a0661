//! Canonical markup formatting
//!
//! The canonical form is UTF-8 without a byte-order mark, `\n` line
//! endings, a fixed `<?xml version="1.0" encoding="utf-8"?>` declaration
//! and a trailing newline. Attributes of every element are reordered by
//! namespace, then local name. Element order is never touched because
//! sibling order can be meaningful to the environment that reads the file
//! back.
//!
//! Only whitespace that carries no data is rewritten. An element whose
//! children are elements, comments or processing instructions separated by
//! whitespace gets one child per line, indented by two spaces. Everything
//! else is written exactly as parsed: text values, whitespace-only leaf
//! values, mixed content and anything under `xml:space="preserve"`. An
//! element with no content at all is written as `<X/>`.

use std::borrow::Cow;

use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use quick_xml::writer::Writer;
use tracing::trace;

use crate::scrub::{self, ScrubRule, Scrubber};
use crate::{Error, Result};

const INDENT_WIDTH: usize = 2;

/// Canonicalizes artifact markup, optionally scrubbing volatile fields.
///
/// Without scrubbers, `normalize(normalize(x)) == normalize(x)` for every
/// well-formed `x`. With scrubbers the same holds as long as each
/// replacement is itself a fixed point of its pattern.
#[derive(Debug, Clone, Default)]
pub struct ContentNormalizer {
    scrubbers: Vec<Scrubber>,
}

/// Attribute after namespace resolution, ready for sorting.
struct SortableAttribute {
    namespace: Vec<u8>,
    local: Vec<u8>,
    qualified: String,
    value: String,
}

/// Parsed markup, kept only long enough to decide where whitespace may go.
enum Node {
    Element(Element),
    /// Unescaped character data
    Text(String),
    /// Comments, CDATA, processing instructions and doctypes, kept verbatim
    Verbatim(Event<'static>),
}

struct Element {
    start: BytesStart<'static>,
    /// Value of an `xml:space` attribute on this element, if any
    preserve: Option<bool>,
    children: Vec<Node>,
}

impl Node {
    fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(text) if is_blank(text))
    }
}

impl Element {
    /// True when every child is markup and all text between them is blank.
    fn has_element_content(&self) -> bool {
        let mut has_markup = false;
        for child in &self.children {
            match child {
                Node::Text(text) if !is_blank(text) => return false,
                Node::Text(_) => {}
                Node::Verbatim(Event::CData(_)) => return false,
                Node::Element(_) | Node::Verbatim(_) => has_markup = true,
            }
        }
        has_markup
    }
}

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

impl ContentNormalizer {
    /// A normalizer that only formats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `scrubbers` in order after formatting.
    pub fn with_scrubbers(scrubbers: Vec<Scrubber>) -> Self {
        Self { scrubbers }
    }

    /// Build a normalizer from configured scrub rules.
    pub fn from_rules(rules: &[ScrubRule]) -> Result<Self> {
        Ok(Self::with_scrubbers(scrub::compile_all(rules)?))
    }

    pub fn scrubbers(&self) -> &[Scrubber] {
        &self.scrubbers
    }

    /// Produce the canonical form of `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] or [`Error::Unbalanced`] for input that
    /// is not well-formed markup. Nothing is swallowed.
    pub fn normalize(&self, raw: &str) -> Result<String> {
        let formatted = canonicalize(raw)?;
        Ok(self
            .scrubbers
            .iter()
            .fold(formatted, |text, scrubber| scrubber.apply(&text)))
    }
}

/// Strip the BOM and apply XML end-of-line handling (`\r\n` and lone `\r`
/// become `\n`).
fn prepare(raw: &str) -> Cow<'_, str> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

fn utf8(bytes: &[u8], position: u64) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::malformed(position, e.to_string()))
}

fn render_err(e: impl std::fmt::Display) -> Error {
    Error::Render(e.to_string())
}

fn canonicalize(raw: &str) -> Result<String> {
    let input = prepare(raw);
    let document = parse(&input)?;

    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(render_err)?;
    for node in &document {
        writer.get_mut().push(b'\n');
        write_node(&mut writer, node, 0, false)?;
    }

    let mut out = String::from_utf8(writer.into_inner()).map_err(render_err)?;
    out.push('\n');
    trace!(input_len = raw.len(), output_len = out.len(), "normalized markup");
    Ok(out)
}

/// Read `input` into top-level nodes, dropping blank text outside the root.
fn parse(input: &str) -> Result<Vec<Node>> {
    let mut reader = NsReader::from_str(input);
    reader.config_mut().trim_text(false);

    let mut document: Vec<Node> = Vec::new();
    let mut open: Vec<Element> = Vec::new();

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event()
            .map_err(|e| Error::malformed(reader.error_position() as u64, e.to_string()))?;

        let node = match event {
            Event::Start(start) => {
                open.push(element(&reader, &start, position)?);
                continue;
            }
            Event::Empty(start) => Node::Element(element(&reader, &start, position)?),
            Event::End(_) => {
                let closed = open
                    .pop()
                    .ok_or_else(|| Error::malformed(position, "unexpected closing tag"))?;
                Node::Element(closed)
            }
            Event::Text(text) => {
                let unescaped = text
                    .unescape()
                    .map_err(|e| Error::malformed(position, e.to_string()))?;
                if unescaped.is_empty() {
                    continue;
                }
                Node::Text(unescaped.into_owned())
            }
            Event::Decl(_) => {
                // Replaced by the fixed declaration.
                continue;
            }
            Event::Eof => break,
            other => Node::Verbatim(other.into_owned()),
        };

        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None if node.is_blank_text() => {}
            None if matches!(node, Node::Text(_)) => {
                return Err(Error::malformed(position, "text outside the root element"));
            }
            None => document.push(node),
        }
    }

    if !open.is_empty() {
        return Err(Error::Unbalanced { open: open.len() });
    }
    if !document.iter().any(|node| matches!(node, Node::Element(_))) {
        return Err(Error::malformed(0, "document has no root element"));
    }
    Ok(document)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node, depth: usize, preserve: bool) -> Result<()> {
    match node {
        Node::Element(element) => write_element(writer, element, depth, preserve),
        Node::Text(text) => writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(render_err),
        Node::Verbatim(event) => writer.write_event(event.clone()).map_err(render_err),
    }
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &Element,
    depth: usize,
    inherited_preserve: bool,
) -> Result<()> {
    let preserve = element.preserve.unwrap_or(inherited_preserve);
    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(element.start.borrow()))
            .map_err(render_err);
    }

    writer
        .write_event(Event::Start(element.start.borrow()))
        .map_err(render_err)?;
    if !preserve && element.has_element_content() {
        for child in element.children.iter().filter(|c| !c.is_blank_text()) {
            newline(writer, depth + 1);
            write_node(writer, child, depth + 1, preserve)?;
        }
        newline(writer, depth);
    } else {
        for child in &element.children {
            write_node(writer, child, depth, preserve)?;
        }
    }
    writer
        .write_event(Event::End(element.start.to_end()))
        .map_err(render_err)
}

fn newline(writer: &mut Writer<Vec<u8>>, depth: usize) {
    let out = writer.get_mut();
    out.push(b'\n');
    out.resize(out.len() + depth * INDENT_WIDTH, b' ');
}

fn element(reader: &NsReader<&[u8]>, start: &BytesStart<'_>, position: u64) -> Result<Element> {
    let (start, preserve) = sorted_element(reader, start, position)?;
    Ok(Element {
        start,
        preserve,
        children: Vec::new(),
    })
}

/// Rebuild `start` with its attributes in canonical order and with values
/// re-escaped uniformly. Also reports the element's `xml:space` setting.
fn sorted_element(
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
    position: u64,
) -> Result<(BytesStart<'static>, Option<bool>)> {
    let name = utf8(start.name().as_ref(), position)?.to_string();

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| Error::malformed(position, e.to_string()))?;
        let (resolved, local) = reader.resolve_attribute(attribute.key);
        let namespace = match resolved {
            ResolveResult::Bound(ns) => ns.as_ref().to_vec(),
            ResolveResult::Unbound => Vec::new(),
            ResolveResult::Unknown(prefix) => prefix,
        };
        let value = attribute
            .unescape_value()
            .map_err(|e| Error::malformed(position, e.to_string()))?
            .into_owned();

        attributes.push(SortableAttribute {
            namespace,
            local: local.as_ref().to_vec(),
            qualified: utf8(attribute.key.as_ref(), position)?.to_string(),
            value,
        });
    }

    attributes.sort_by(|a, b| {
        (&a.namespace, &a.local, &a.qualified).cmp(&(&b.namespace, &b.local, &b.qualified))
    });

    let preserve = attributes
        .iter()
        .find(|a| a.qualified == "xml:space")
        .map(|a| a.value == "preserve");

    let mut element = BytesStart::new(name);
    for attribute in &attributes {
        element.push_attribute((attribute.qualified.as_str(), attribute.value.as_str()));
    }
    Ok((element, preserve))
}
