use serde::{Deserialize, Serialize};

use crate::dom::XmlNode;
use crate::{FeedItem, Result};

/// One step of a field's extraction path, evaluated against an item element.
///
/// `Node` descends into the first child element with the tag; the remaining
/// variants are terminal and produce the field text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractStep {
    /// Descend into the first child element with this tag
    Node(String),
    /// Take the value of this attribute
    Attr(String),
    /// Take the concatenated plain text of the current element
    Plain,
    /// Take the inner markup of the current element
    Xml,
}

/// Per-site extraction template.
///
/// Each field is an ordered path of [`ExtractStep`]s walked from the item
/// element. A path that runs off the document yields the empty string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractTemplate {
    /// Tag that delimits one feed item within the page
    #[serde(default = "default_item_tag")]
    pub item_tag: String,
    pub title: Vec<ExtractStep>,
    pub guid: Vec<ExtractStep>,
    pub torrent: Vec<ExtractStep>,
    #[serde(default)]
    pub description: Vec<ExtractStep>,
}

fn default_item_tag() -> String {
    "item".to_string()
}

impl Default for ExtractTemplate {
    /// The standard RSS 2.0 item shape: enclosure carries the download link.
    fn default() -> Self {
        Self {
            item_tag: default_item_tag(),
            title: vec![ExtractStep::Node("title".into()), ExtractStep::Plain],
            guid: vec![ExtractStep::Node("link".into()), ExtractStep::Plain],
            torrent: vec![
                ExtractStep::Node("enclosure".into()),
                ExtractStep::Attr("url".into()),
            ],
            description: vec![ExtractStep::Node("description".into()), ExtractStep::Xml],
        }
    }
}

impl ExtractTemplate {
    /// Extract all items from a fetched page body.
    ///
    /// Items missing a download link are dropped with a warning; they cannot
    /// be dispatched and would poison the dedup ledger with empty keys.
    pub fn extract(&self, body: &str) -> Result<Vec<FeedItem>> {
        let doc = XmlNode::parse(body)?;
        let mut nodes = Vec::new();
        doc.descendants(&self.item_tag, &mut nodes);

        let mut items = Vec::with_capacity(nodes.len());
        for node in nodes {
            let title = eval_path(node, &self.title);
            let torrent_url = eval_path(node, &self.torrent);
            if torrent_url.is_empty() {
                tracing::warn!("Dropping item without a download link: {}", title);
                continue;
            }
            items.push(FeedItem {
                title,
                guid: eval_path(node, &self.guid),
                torrent_url,
                description: eval_path(node, &self.description),
            });
        }
        Ok(items)
    }
}

fn eval_path(node: &XmlNode, path: &[ExtractStep]) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut current = node;
    for step in path {
        match step {
            ExtractStep::Node(tag) => match current.child(tag) {
                Some(child) => current = child,
                None => return String::new(),
            },
            ExtractStep::Attr(name) => {
                return current.attrs.get(name).cloned().unwrap_or_default();
            }
            ExtractStep::Plain => return current.plain_text(),
            ExtractStep::Xml => return current.inner_xml(),
        }
    }
    // Path with no terminal step falls back to plain text.
    current.plain_text()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<rss version="2.0"><channel>
  <title>feed</title>
  <item>
    <title>Show S01E02</title>
    <link>http://example.com/ep2</link>
    <enclosure url="http://example.com/ep2.torrent" type="application/x-bittorrent"/>
    <description><![CDATA[second <b>episode</b>]]></description>
  </item>
  <item>
    <title>Show S01E01</title>
    <link>http://example.com/ep1</link>
    <enclosure url="http://example.com/ep1.torrent" type="application/x-bittorrent"/>
    <description>first episode</description>
  </item>
</channel></rss>"#;

    #[test]
    fn test_default_template_extracts_items_in_order() {
        let items = ExtractTemplate::default().extract(PAGE).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Show S01E02");
        assert_eq!(items[0].guid, "http://example.com/ep2");
        assert_eq!(items[0].torrent_url, "http://example.com/ep2.torrent");
        assert_eq!(items[1].torrent_url, "http://example.com/ep1.torrent");
    }

    #[test]
    fn test_description_keeps_markup() {
        let items = ExtractTemplate::default().extract(PAGE).unwrap();
        assert_eq!(items[0].description, "second <b>episode</b>");
    }

    #[test]
    fn test_item_without_download_link_is_dropped() {
        let page = r#"<channel>
            <item><title>no enclosure</title><link>http://x</link></item>
            <item><title>ok</title><enclosure url="http://x/a.torrent"/></item>
        </channel>"#;
        let items = ExtractTemplate::default().extract(page).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "ok");
    }

    #[test]
    fn test_custom_template_plain_link() {
        let template = ExtractTemplate {
            item_tag: "entry".into(),
            title: vec![ExtractStep::Node("name".into()), ExtractStep::Plain],
            guid: vec![ExtractStep::Node("id".into()), ExtractStep::Plain],
            torrent: vec![ExtractStep::Node("file".into()), ExtractStep::Plain],
            description: vec![],
        };
        let page = "<feed><entry><name>a</name><id>1</id><file>http://x/a.torrent</file></entry></feed>";
        let items = template.extract(page).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].torrent_url, "http://x/a.torrent");
        assert_eq!(items[0].description, "");
    }

    #[test]
    fn test_missing_path_yields_empty_field() {
        let template = ExtractTemplate::default();
        let page = r#"<channel><item><enclosure url="http://x/a.torrent"/></item></channel>"#;
        let items = template.extract(page).unwrap();
        assert_eq!(items[0].title, "");
        assert_eq!(items[0].guid, "");
    }
}
