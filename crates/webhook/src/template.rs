use serde::{Deserialize, Serialize};

/// An outbound notification body with `$title` / `$subscribe` / `$torrent`
/// placeholders.
///
/// The body is arbitrary JSON matching whatever the receiving service expects
/// (Feishu cards, Slack blocks, plain `{"text": ...}` hooks). Placeholders are
/// substituted textually in the serialized form; unknown `$words` are left
/// intact so template bodies may carry their own dollar syntax.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookTemplate {
    /// Whether this template shipped with the binary
    #[serde(default)]
    pub builtin: bool,
    pub body: serde_json::Value,
}

impl WebhookTemplate {
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            builtin: false,
            body,
        }
    }

    /// Render the body for one item.
    pub fn render(&self, title: &str, subscribe: &str, torrent: &str) -> String {
        let text = self.body.to_string();
        substitute(&text, &[
            ("title", title),
            ("subscribe", subscribe),
            ("torrent", torrent),
        ])
    }
}

/// `$name` substitution. Values are JSON-escaped so they stay valid inside
/// the serialized body.
fn substitute(text: &str, vars: &[(&str, &str)]) -> String {
    let mut out = text.to_string();
    for (name, value) in vars {
        let escaped = escape_json(value);
        out = out.replace(&format!("${name}"), &escaped);
    }
    out
}

fn escape_json(value: &str) -> String {
    // String-serialize and strip the surrounding quotes.
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_substitutes_all_placeholders() {
        let template = WebhookTemplate::new(json!({
            "text": "$subscribe updated: $title",
            "url": "$torrent"
        }));
        let rendered = template.render("Ep 3", "Show", "http://x/3.torrent");
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["text"], "Show updated: Ep 3");
        assert_eq!(parsed["url"], "http://x/3.torrent");
    }

    #[test]
    fn test_unknown_placeholder_left_intact() {
        let template = WebhookTemplate::new(json!({"text": "$title $other"}));
        let rendered = template.render("a", "b", "c");
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["text"], "a $other");
    }

    #[test]
    fn test_values_with_quotes_stay_valid_json() {
        let template = WebhookTemplate::new(json!({"text": "$title"}));
        let rendered = template.render(r#"he said "hi""#, "s", "t");
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["text"], r#"he said "hi""#);
    }
}
