use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::{ExtractError, Result};

/// A parsed XML element.
///
/// Feed pages are small, so the whole document is materialized before template
/// evaluation instead of being streamed.
#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    pub tag: String,
    pub attrs: HashMap<String, String>,
    pub children: Vec<XmlChild>,
}

#[derive(Debug, Clone)]
pub enum XmlChild {
    Element(XmlNode),
    Text(String),
}

impl XmlNode {
    /// Parse a document into a synthetic root node whose children are the
    /// top-level elements.
    pub fn parse(body: &str) -> Result<XmlNode> {
        let mut reader = Reader::from_reader(body.as_bytes());
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = vec![XmlNode::default()];
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let node = node_from_start(&e)?;
                    stack.push(node);
                }
                Ok(Event::Empty(e)) => {
                    let node = node_from_start(&e)?;
                    push_child(&mut stack, XmlChild::Element(node));
                }
                Ok(Event::End(_)) => {
                    // The root is never popped; a stray close tag is a parse error.
                    if stack.len() < 2 {
                        return Err(ExtractError::Xml("unbalanced close tag".into()));
                    }
                    let node = stack.pop().unwrap_or_default();
                    push_child(&mut stack, XmlChild::Element(node));
                }
                Ok(Event::Text(e)) => {
                    let text = e
                        .unescape()
                        .map_err(|e| ExtractError::Xml(e.to_string()))?
                        .to_string();
                    if !text.is_empty() {
                        push_child(&mut stack, XmlChild::Text(text));
                    }
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(e.as_ref()).to_string();
                    if !text.is_empty() {
                        push_child(&mut stack, XmlChild::Text(text));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(ExtractError::Xml(e.to_string())),
                _ => {}
            }
            buf.clear();
        }

        if stack.len() != 1 {
            return Err(ExtractError::Xml("unclosed element at end of input".into()));
        }
        Ok(stack.pop().unwrap_or_default())
    }

    /// First child element with the given tag.
    pub fn child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find_map(|c| match c {
            XmlChild::Element(n) if n.tag == tag => Some(n),
            _ => None,
        })
    }

    /// All descendant elements with the given tag, in document order.
    pub fn descendants<'a>(&'a self, tag: &str, out: &mut Vec<&'a XmlNode>) {
        for child in &self.children {
            if let XmlChild::Element(n) = child {
                if n.tag == tag {
                    out.push(n);
                }
                n.descendants(tag, out);
            }
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out.trim().to_string()
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlChild::Text(t) => out.push_str(t),
                XmlChild::Element(n) => n.collect_text(out),
            }
        }
    }

    /// Children re-serialized as markup, text nodes included.
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                XmlChild::Text(t) => out.push_str(t),
                XmlChild::Element(n) => n.write_xml(&mut out),
            }
        }
        out.trim().to_string()
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(v);
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlChild::Text(t) => out.push_str(t),
                XmlChild::Element(n) => n.write_xml(out),
            }
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

fn node_from_start(e: &quick_xml::events::BytesStart<'_>) -> Result<XmlNode> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let mut attrs = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| ExtractError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| ExtractError::Xml(e.to_string()))?
            .to_string();
        attrs.insert(key, value);
    }
    Ok(XmlNode {
        tag,
        attrs,
        children: Vec::new(),
    })
}

fn push_child(stack: &mut [XmlNode], child: XmlChild) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_elements() {
        let doc = XmlNode::parse("<rss><channel><title>Feed</title></channel></rss>").unwrap();
        let title = doc
            .child("rss")
            .and_then(|n| n.child("channel"))
            .and_then(|n| n.child("title"))
            .unwrap();
        assert_eq!(title.plain_text(), "Feed");
    }

    #[test]
    fn test_parse_attributes_and_empty_element() {
        let doc =
            XmlNode::parse(r#"<item><enclosure url="http://x/a.torrent" type="t"/></item>"#)
                .unwrap();
        let enclosure = doc.child("item").and_then(|n| n.child("enclosure")).unwrap();
        assert_eq!(
            enclosure.attrs.get("url").map(String::as_str),
            Some("http://x/a.torrent")
        );
    }

    #[test]
    fn test_descendants_in_document_order() {
        let doc = XmlNode::parse(
            "<channel><item><title>a</title></item><item><title>b</title></item></channel>",
        )
        .unwrap();
        let mut items = Vec::new();
        doc.descendants("item", &mut items);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].child("title").unwrap().plain_text(), "a");
        assert_eq!(items[1].child("title").unwrap().plain_text(), "b");
    }

    #[test]
    fn test_cdata_is_text() {
        let doc = XmlNode::parse("<description><![CDATA[<b>hi</b>]]></description>").unwrap();
        assert_eq!(doc.child("description").unwrap().plain_text(), "<b>hi</b>");
    }

    #[test]
    fn test_unclosed_document_is_an_error() {
        assert!(XmlNode::parse("<a><b></b>").is_err());
    }
}
