use std::collections::HashMap;
use std::path::Path;

use url::Url;

use crate::{ExtractError, ExtractTemplate, Result};

/// Extraction templates keyed by source hostname.
///
/// Builtin templates ship with the binary; user templates are JSON files named
/// `<hostname>.json` in the template directory and shadow builtins of the same
/// name.
pub struct TemplateStore {
    templates: HashMap<String, ExtractTemplate>,
    fallback: ExtractTemplate,
}

impl TemplateStore {
    pub fn builtin() -> Self {
        let mut templates = HashMap::new();
        // nyaa puts the torrent link in <link> rather than an enclosure.
        templates.insert(
            "nyaa.si".to_string(),
            ExtractTemplate {
                torrent: vec![
                    crate::ExtractStep::Node("link".into()),
                    crate::ExtractStep::Plain,
                ],
                guid: vec![
                    crate::ExtractStep::Node("guid".into()),
                    crate::ExtractStep::Plain,
                ],
                ..ExtractTemplate::default()
            },
        );
        Self {
            templates,
            fallback: ExtractTemplate::default(),
        }
    }

    /// Load user templates from a directory of `<hostname>.json` files.
    /// A missing directory is not an error; a malformed file is.
    pub fn load_user_dir(&mut self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(host) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = std::fs::read_to_string(&path)?;
            let template: ExtractTemplate =
                serde_json::from_str(&content).map_err(|e| ExtractError::Template {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            tracing::info!("Loaded extraction template for {}", host);
            self.templates.insert(host.to_string(), template);
        }
        Ok(())
    }

    /// Template for a source url, keyed by its hostname; unknown hosts get the
    /// standard RSS template.
    pub fn for_url(&self, url: &str) -> &ExtractTemplate {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .and_then(|host| self.templates.get(&host))
            .unwrap_or(&self.fallback)
    }
}
