//! Minimal XML handling for GMP: an owned element tree for responses, response
//! framing over a byte stream, and report body extraction.
use std::borrow::Cow;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::GmpError;

/// An owned XML element with its attributes, direct text and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Parse a complete document into its root element.
    pub fn parse(doc: &str) -> Result<Element, GmpError> {
        let mut reader = Reader::from_str(doc);
        let mut stack: Vec<Element> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(start_element(&e)?),
                Event::Empty(e) => {
                    let el = start_element(&e)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(el),
                        None => return Ok(el),
                    }
                }
                Event::End(_) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| GmpError::Malformed("unbalanced end tag".into()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(el),
                        None => return Ok(el),
                    }
                }
                Event::Text(t) => {
                    if let Some(cur) = stack.last_mut() {
                        cur.text.push_str(&t.unescape()?);
                    }
                }
                Event::CData(c) => {
                    if let Some(cur) = stack.last_mut() {
                        cur.text.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Event::Eof => {
                    return Err(GmpError::Malformed("document ended before root closed".into()))
                }
                _ => {}
            }
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first child called `name`.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }
}

fn start_element(e: &BytesStart<'_>) -> Result<Element, GmpError> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        attrs.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            attr.unescape_value()?.into_owned(),
        ));
    }
    Ok(Element {
        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        attrs,
        ..Element::default()
    })
}

/// Tracks whether the bytes received so far hold one complete response document.
///
/// Only the buffer tail is inspected on each chunk; a full parse runs once the
/// tail looks like the root's closing tag.
#[derive(Debug, Default)]
pub struct ResponseFramer {
    closing_tag: Option<Vec<u8>>,
}

impl ResponseFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete(&mut self, buf: &[u8]) -> Result<bool, GmpError> {
        if self.closing_tag.is_none() {
            match root_start(buf)? {
                RootStart::Pending => return Ok(false),
                RootStart::Empty => return Ok(true),
                RootStart::Open(name) => {
                    let mut tag = b"</".to_vec();
                    tag.extend_from_slice(&name);
                    tag.push(b'>');
                    self.closing_tag = Some(tag);
                }
            }
        }
        let Some(tag) = self.closing_tag.as_deref() else {
            return Ok(false);
        };
        if !trim_end(buf).ends_with(tag) {
            return Ok(false);
        }
        document_complete(buf)
    }
}

enum RootStart {
    Pending,
    Empty,
    Open(Vec<u8>),
}

fn root_start(buf: &[u8]) -> Result<RootStart, GmpError> {
    let mut reader = Reader::from_reader(buf);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                return Ok(RootStart::Open(e.name().as_ref().to_vec()));
            }
            Ok(Event::Empty(_)) => return Ok(RootStart::Empty),
            Ok(Event::Eof) | Err(quick_xml::Error::Syntax(_)) => {
                return Ok(RootStart::Pending);
            }
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
    }
}

// An unterminated construct at the end of `buf` means more bytes are due, not an error.
fn document_complete(buf: &[u8]) -> Result<bool, GmpError> {
    let mut reader = Reader::from_reader(buf);
    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::Empty(_)) if depth == 0 => return Ok(true),
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(true);
                }
            }
            Ok(Event::Eof) | Err(quick_xml::Error::Syntax(_)) => return Ok(false),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
    }
}

fn trim_end(buf: &[u8]) -> &[u8] {
    let end = buf
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|i| i + 1)
        .unwrap_or(0);
    &buf[..end]
}

/// The root element's name and attributes, without reading past its start tag.
pub fn root_element(doc: &str) -> Result<Element, GmpError> {
    let mut reader = Reader::from_str(doc);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => return start_element(&e),
            Event::Eof => return Err(GmpError::Malformed("document has no root element".into())),
            _ => {}
        }
    }
}

/// Extract the body of the `<report>` element directly under the response root.
///
/// Text-only bodies are unescaped; bodies with child elements are returned as
/// the raw inner XML.
pub fn report_body(doc: &str) -> Result<String, GmpError> {
    let mut reader = Reader::from_str(doc);
    let mut depth = 0usize;
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if depth == 1 && e.name().as_ref() == b"report" {
                    return report_content(&mut reader, doc);
                }
                depth += 1;
            }
            Event::Empty(e) if depth == 1 && e.name().as_ref() == b"report" => {
                return Ok(String::new());
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => {
                return Err(GmpError::Malformed("response holds no report element".into()))
            }
            _ => {}
        }
    }
}

/// Read up to the close of the element whose start tag was just consumed.
fn report_content(reader: &mut Reader<&[u8]>, doc: &str) -> Result<String, GmpError> {
    let start = reader.buffer_position() as usize;
    let mut text = String::new();
    let mut has_children = false;
    let mut depth = 0usize;
    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(_) => {
                has_children = true;
                depth += 1;
            }
            Event::Empty(_) => has_children = true,
            Event::End(_) if depth == 0 => {
                return Ok(if has_children {
                    doc[start..before].to_string()
                } else {
                    text
                });
            }
            Event::End(_) => depth -= 1,
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::Eof => return Err(GmpError::Malformed("report element is not closed".into())),
            _ => {}
        }
    }
}

/// Escape a value for use in element text or a double-quoted attribute.
pub fn esc(s: &str) -> Cow<'_, str> {
    escape(s)
}
