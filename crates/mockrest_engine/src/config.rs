use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use mockrest_base::{FilePath, MockrestResult, Pal, ResultExt};

use crate::render::TemplateKey;

/* 📖 # Why is Options immutable?

Options are read once before the router is built (file first, then CLI overrides)
and then shared behind an Arc by every stage. No stage can change the foreign key
convention or template table halfway through serving, so two requests with the same
shape are always routed and rendered the same way.
*/

/// Process-wide routing and rendering options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Suffix appended to a singular resource name to form a foreign key (`postId`).
    #[serde(alias = "foreign_key_suffix")]
    pub foreign_key_suffix: String,
    /// Name of the identity field of collection records.
    pub id: String,
    /// Render responses through templates instead of JSON.
    pub hypermedia: bool,
    /// Resource name -> template key (`GET-ALL`, `GET`, ...) -> template path.
    pub templates: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            foreign_key_suffix: "Id".to_string(),
            id: "id".to_string(),
            hypermedia: false,
            templates: BTreeMap::new(),
        }
    }
}

impl Options {
    pub fn with_foreign_key_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.foreign_key_suffix = suffix.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_hypermedia(mut self, hypermedia: bool) -> Self {
        self.hypermedia = hypermedia;
        self
    }

    /// Map a resource and template key to a template path.
    pub fn with_template(
        mut self,
        resource: impl Into<String>,
        key: TemplateKey,
        path: impl Into<String>,
    ) -> Self {
        self.templates
            .entry(resource.into())
            .or_default()
            .insert(key.as_str().to_string(), path.into());
        self
    }

    /// The template path configured for `resource` and `key`, if any.
    pub fn template_path(&self, resource: &str, key: TemplateKey) -> Option<&str> {
        self.templates
            .get(resource)
            .and_then(|keys| keys.get(key.as_str()))
            .map(String::as_str)
    }

    /// Foreign key name pointing at records of `collection` (`posts` -> `postId`).
    pub fn foreign_key_for(&self, collection: &str) -> String {
        format!(
            "{}{}",
            crate::inflect::singular(collection),
            self.foreign_key_suffix
        )
    }
}

/// Load options from a TOML file. Missing keys keep their defaults.
pub fn load_options(pal: &dyn Pal, path: &FilePath) -> MockrestResult<Options> {
    let content = pal
        .read_file_to_string(path)
        .with_context(|| format!("Failed to read options file {}", path))?;
    let options: Options = toml::from_str(&content)
        .map_err(|e| mockrest_base::err!("Invalid options file {}: {}", path, e))?;
    debug!(?options, "loaded options");
    Ok(options)
}
