//! Renderers for the human-readable "shutting down" page.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template `{0}` not found")]
    NotFound(String),
    #[error("template `{name}` failed to render: {reason}")]
    Failed { name: String, reason: String },
}

/// Produces an HTML body for a template name.
pub trait Renderer: Send + Sync {
    fn render(&self, template: &str) -> Result<String, RenderError>;
}

/// Templates held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplates {
    templates: HashMap<String, String>,
}

impl StaticTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.templates.insert(name.into(), body.into());
        self
    }

    /// Load every `<name>.html` file in `dir`, keyed by `<name>`.
    ///
    /// Read once at startup so the request path never touches the disk.
    pub fn from_dir(dir: &Path) -> io::Result<Self> {
        let mut templates = HashMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("html") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            templates.insert(name.to_string(), fs::read_to_string(&path)?);
        }

        tracing::info!(
            dir = %dir.display(),
            count = templates.len(),
            "Templates loaded"
        );
        Ok(Self { templates })
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Renderer for StaticTemplates {
    fn render(&self, template: &str) -> Result<String, RenderError> {
        self.templates
            .get(template)
            .cloned()
            .ok_or_else(|| RenderError::NotFound(template.to_string()))
    }
}
