//! Minimal XML support for the PRTL codec: an element tree for the reader
//! and a push-based document builder for the writer.
//!
//! Every string entering or leaving a document passes through quick-xml's
//! escaping at this single boundary.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Nesting bound against pathological input.
const MAX_DEPTH: usize = 128;

// ── Element tree ──────────────────────────────────────────────────────

/// A parsed XML element with its attributes, children, and text content.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Concatenated character data directly inside this element.
    pub text: String,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First descendant with the given name, depth first. Excludes `self`.
    pub fn find(&self, name: &str) -> Option<&Element> {
        let mut stack: Vec<&Element> = self.children.iter().rev().collect();
        while let Some(el) = stack.pop() {
            if el.name == name {
                return Some(el);
            }
            for c in el.children.iter().rev() {
                stack.push(c);
            }
        }
        None
    }

    /// All descendants with the given name, in document order.
    pub fn find_all(&self, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        let mut stack: Vec<&Element> = self.children.iter().rev().collect();
        while let Some(el) = stack.pop() {
            if el.name == name {
                found.push(el);
            }
            for c in el.children.iter().rev() {
                stack.push(c);
            }
        }
        found
    }
}

/// Parses a document into its root element.
///
/// Errors are reported as strings; the codec wraps them in its own error
/// type. Text is kept verbatim (no trimming) so literal caption content
/// survives.
pub fn parse(input: &str) -> Result<Element, String> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(start) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(format!("markup nested deeper than {MAX_DEPTH} levels"));
                }
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let el = element_from_start(&start)?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::End(_) => {
                // quick-xml has already validated the tag name matches
                let el = stack
                    .pop()
                    .ok_or_else(|| "closing tag without an open element".to_string())?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape().map_err(|e| e.to_string())?);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    let bytes = data.into_inner();
                    top.text.push_str(&String::from_utf8_lossy(&bytes));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err("document ends with unclosed elements".to_string());
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, String> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| e.to_string())?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(Element {
        name,
        attrs,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    el: Element,
) -> Result<(), String> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(el);
        Ok(())
    } else if root.is_none() {
        *root = Some(el);
        Ok(())
    } else {
        Err("content after the document root".to_string())
    }
}

// ── Document builder ──────────────────────────────────────────────────

/// Assembles an XML document string element by element.
///
/// Used by the encoder so every attribute and text value is escaped in one
/// place rather than scattered across string templates.
#[derive(Debug, Default)]
pub struct XmlBuilder {
    buf: String,
    stack: Vec<String>,
}

impl XmlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decl(&mut self, version: &str, encoding: &str) {
        self.buf
            .push_str(&format!("<?xml version=\"{version}\" encoding=\"{encoding}\" ?>"));
    }

    pub fn open(&mut self, name: &str) {
        self.open_with(name, &[]);
    }

    pub fn open_with(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.start_tag(name, attrs);
        self.buf.push('>');
        self.stack.push(name.to_string());
    }

    pub fn close(&mut self) {
        // Stack underflow is an encoder bug, not an input condition.
        let name = self.stack.pop().expect("close() without matching open()");
        self.buf.push_str("</");
        self.buf.push_str(&name);
        self.buf.push('>');
    }

    /// `<name attr... />`
    pub fn empty_with(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.start_tag(name, attrs);
        self.buf.push_str(" />");
    }

    /// `<name>text</name>`
    pub fn leaf(&mut self, name: &str, text: &str) {
        self.open(name);
        self.text(text);
        self.close();
    }

    pub fn text(&mut self, text: &str) {
        self.buf.push_str(&escape(text));
    }

    pub fn finish(self) -> String {
        assert!(self.stack.is_empty(), "unclosed elements at finish()");
        self.buf
    }

    fn start_tag(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.buf.push('<');
        self.buf.push_str(name);
        for (key, value) in attrs {
            self.buf.push(' ');
            self.buf.push_str(key);
            self.buf.push_str("=\"");
            self.buf.push_str(&escape(*value));
            self.buf.push('"');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree_shape() {
        let root = parse(
            r#"<Root><A k="v"><B>one</B><B>two</B></A><C leaf="yes" /></Root>"#,
        )
        .unwrap();
        assert_eq!(root.name, "Root");
        assert_eq!(root.children.len(), 2);
        let a = root.child("A").unwrap();
        assert_eq!(a.attr("k"), Some("v"));
        assert_eq!(root.find_all("B").len(), 2);
        assert_eq!(root.find("B").unwrap().text, "one");
        assert_eq!(root.child("C").unwrap().attr("leaf"), Some("yes"));
    }

    #[test]
    fn test_parse_unescapes_text() {
        let root = parse("<T>a &amp; b &lt;c&gt;</T>").unwrap();
        assert_eq!(root.text, "a & b <c>");
    }

    #[test]
    fn test_parse_keeps_whitespace() {
        let root = parse("<T>  padded  </T>").unwrap();
        assert_eq!(root.text, "  padded  ");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse("<A><B></A>").is_err());
        assert!(parse("<A>").is_err());
        assert!(parse("not xml").is_err());
    }

    #[test]
    fn test_builder_escapes_once() {
        let mut x = XmlBuilder::new();
        x.open_with("T", &[("a", "x\"y")]);
        x.leaf("L", "a & <b>");
        x.close();
        let doc = x.finish();
        assert_eq!(doc, "<T a=\"x&quot;y\"><L>a &amp; &lt;b&gt;</L></T>");
        // What the builder wrote, the parser reads back verbatim
        let tree = parse(&doc).unwrap();
        assert_eq!(tree.child("L").unwrap().text, "a & <b>");
        assert_eq!(tree.attr("a"), Some("x\"y"));
    }
}
