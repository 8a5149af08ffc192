use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::{Result, WebhookError, WebhookTemplate};

/// Webhook templates keyed by kind.
///
/// Builtins ship with the binary; user templates are `<kind>.json` files in
/// the template directory and shadow builtins of the same kind. Removing a
/// user template uncovers the builtin again.
pub struct TemplateStore {
    user_dir: PathBuf,
    templates: HashMap<String, WebhookTemplate>,
}

impl TemplateStore {
    pub fn new(user_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self {
            user_dir: user_dir.into(),
            templates: builtin_templates(),
        };
        store.reload_user_templates()?;
        Ok(store)
    }

    fn reload_user_templates(&mut self) -> Result<()> {
        if !self.user_dir.is_dir() {
            return Ok(());
        }
        for entry in std::fs::read_dir(&self.user_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(kind) = path.file_stem().and_then(|s| s.to_str()) {
                let template = load_template(&path)?;
                self.templates.insert(kind.to_string(), template);
            }
        }
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Result<&WebhookTemplate> {
        self.templates
            .get(kind)
            .ok_or_else(|| WebhookError::UnknownTemplate(kind.to_string()))
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Add or replace a user template, persisting it to the template dir.
    pub fn add(&mut self, kind: &str, template: WebhookTemplate) -> Result<()> {
        std::fs::create_dir_all(&self.user_dir)?;
        let path = self.user_dir.join(format!("{kind}.json"));
        std::fs::write(&path, serde_json::to_string_pretty(&template.body).map_err(|e| {
            WebhookError::Template {
                path: path.display().to_string(),
                message: e.to_string(),
            }
        })?)?;
        self.templates.insert(kind.to_string(), template);
        Ok(())
    }

    /// Remove a user template; a shadowed builtin becomes visible again.
    pub fn remove(&mut self, kind: &str) -> Result<()> {
        let path = self.user_dir.join(format!("{kind}.json"));
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        self.templates.remove(kind);
        if let Some(builtin) = builtin_templates().remove(kind) {
            self.templates.insert(kind.to_string(), builtin);
        }
        Ok(())
    }
}

fn load_template(path: &Path) -> Result<WebhookTemplate> {
    let content = std::fs::read_to_string(path)?;
    let body: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| WebhookError::Template {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    Ok(WebhookTemplate::new(body))
}

fn builtin_templates() -> HashMap<String, WebhookTemplate> {
    let mut templates = HashMap::new();
    templates.insert(
        "feishu".to_string(),
        WebhookTemplate {
            builtin: true,
            body: json!({
                "msg_type": "post",
                "content": {
                    "post": {
                        "zh_cn": {
                            "title": "$subscribe",
                            "content": [[
                                {"tag": "text", "text": "$title"},
                                {"tag": "a", "text": "下载链接", "href": "$torrent"}
                            ]]
                        }
                    }
                }
            }),
        },
    );
    templates.insert(
        "slack".to_string(),
        WebhookTemplate {
            builtin: true,
            body: json!({"text": "$subscribe updated: $title\n$torrent"}),
        },
    );
    templates
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_kinds_present() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path()).unwrap();
        assert!(store.get("feishu").is_ok());
        assert!(store.get("slack").is_ok());
        assert!(matches!(
            store.get("nope"),
            Err(WebhookError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_add_persists_and_remove_uncovers_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TemplateStore::new(dir.path()).unwrap();

        store
            .add("slack", WebhookTemplate::new(json!({"text": "custom"})))
            .unwrap();
        assert_eq!(store.get("slack").unwrap().body["text"], "custom");
        assert!(dir.path().join("slack.json").exists());

        store.remove("slack").unwrap();
        assert!(store.get("slack").unwrap().builtin);
        assert!(!dir.path().join("slack.json").exists());
    }

    #[test]
    fn test_user_template_loaded_on_startup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gotify.json"), r#"{"message": "$title"}"#).unwrap();
        let store = TemplateStore::new(dir.path()).unwrap();
        assert_eq!(store.get("gotify").unwrap().body["message"], "$title");
    }
}
