//! Prompt templates: the category catalog, a caller-owned registry, and
//! placeholder rendering.
//!
//! Templates use `{name}` placeholders. Rendering is a single literal pass,
//! so a substituted value is never itself expanded again. The registry is a
//! plain owned value; callers that need to mutate it while requests are in
//! flight wrap it in a lock and render from a snapshot.

pub mod catalog;
pub mod plan;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use self::catalog::Category;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Error type for template operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template with given name not found in the registry.
    #[error("template not found: {0}")]
    NotFound(String),
    /// A placeholder required by the template had no value.
    #[error("missing parameter '{parameter}' for template '{template}'")]
    MissingParameter {
        /// Template being rendered.
        template: String,
        /// Placeholder without a value.
        parameter: String,
    },
    /// I/O error reading or writing template files.
    #[error("template file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// A JSON template export could not be read or written.
    #[error("invalid template JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A TOML template file could not be parsed.
    #[error("failed to parse template TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A named template body with `{placeholder}` slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Registry key.
    pub id: String,
    /// What the template is for.
    #[serde(default)]
    pub description: String,
    /// Template text.
    pub body: String,
}

impl PromptTemplate {
    /// Build the built-in template for a category.
    pub fn builtin(category: Category) -> Self {
        Self {
            id: category.id().to_owned(),
            description: category.description().to_owned(),
            body: category.default_body().to_owned(),
        }
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn required_parameters(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&self.body) {
            let name = &caps[1];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_owned());
            }
        }
        names
    }

    /// Substitute every placeholder with its value.
    ///
    /// Extra parameters are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingParameter`] when a placeholder has no value.
    pub fn render(&self, params: &[(&str, &str)]) -> Result<String, TemplateError> {
        let values: HashMap<&str, &str> = params.iter().copied().collect();

        if let Some(missing) = self
            .required_parameters()
            .into_iter()
            .find(|name| !values.contains_key(name.as_str()))
        {
            return Err(TemplateError::MissingParameter {
                template: self.id.clone(),
                parameter: missing,
            });
        }

        let rendered = PLACEHOLDER.replace_all(&self.body, |caps: &Captures<'_>| {
            values.get(&caps[1]).copied().unwrap_or_default().to_owned()
        });
        Ok(rendered.into_owned())
    }
}

/// Summary of one registered template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateInfo {
    /// Registry key.
    pub id: String,
    /// What the template is for.
    pub description: String,
    /// Placeholders the template needs.
    pub parameters: Vec<String>,
}

/// Caller-owned set of templates, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, PromptTemplate>,
}

impl TemplateRegistry {
    /// Create an empty template registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the four catalog templates.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for category in Category::ALL {
            registry.register(PromptTemplate::builtin(category));
        }
        registry
    }

    /// Register a template, replacing any template with the same id.
    pub fn register(&mut self, template: PromptTemplate) {
        debug!(id = %template.id, "registering prompt template");
        self.templates.insert(template.id.clone(), template);
    }

    /// Replace the body of an existing template.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::NotFound`] if no template has this id.
    pub fn update(&mut self, id: &str, body: impl Into<String>) -> Result<(), TemplateError> {
        let template = self
            .templates
            .get_mut(id)
            .ok_or_else(|| TemplateError::NotFound(id.to_owned()))?;
        template.body = body.into();
        Ok(())
    }

    /// Get a template by its id.
    pub fn get(&self, id: &str) -> Option<&PromptTemplate> {
        self.templates.get(id)
    }

    /// Template currently registered for a category.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::NotFound`] if the category's template was removed.
    pub fn for_category(&self, category: Category) -> Result<&PromptTemplate, TemplateError> {
        self.get(category.id())
            .ok_or_else(|| TemplateError::NotFound(category.id().to_owned()))
    }

    /// Render the template for `category`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingParameter`] when a placeholder has no value.
    pub fn render(
        &self,
        category: Category,
        params: &[(&str, &str)],
    ) -> Result<String, TemplateError> {
        self.for_category(category)?.render(params)
    }

    /// Remove a template, returning it if present.
    pub fn remove(&mut self, id: &str) -> Option<PromptTemplate> {
        self.templates.remove(id)
    }

    /// Catalog templates first in catalog order, then custom ones by id.
    pub fn available(&self) -> Vec<TemplateInfo> {
        let catalog = Category::ALL.iter().filter_map(|c| self.get(c.id()));
        let custom = self
            .templates
            .values()
            .filter(|t| t.id.parse::<Category>().is_err());

        catalog
            .chain(custom)
            .map(|t| TemplateInfo {
                id: t.id.clone(),
                description: t.description.clone(),
                parameters: t.required_parameters(),
            })
            .collect()
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the registry holds no templates.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Write all template bodies as a JSON object `{id: body}`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub fn export_to_file(&self, path: impl AsRef<Path>) -> Result<(), TemplateError> {
        let bodies: BTreeMap<&str, &str> = self
            .templates
            .values()
            .map(|t| (t.id.as_str(), t.body.as_str()))
            .collect();
        let json = serde_json::to_string_pretty(&bodies)?;
        std::fs::write(path.as_ref(), json)?;
        info!(path = %path.as_ref().display(), count = bodies.len(), "exported prompt templates");
        Ok(())
    }

    /// Merge a JSON `{id: body}` file. Existing ids keep their description.
    ///
    /// Returns the number of templates imported.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a string map.
    pub fn import_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize, TemplateError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let bodies: BTreeMap<String, String> = serde_json::from_str(&contents)?;
        let count = bodies.len();
        for (id, body) in bodies {
            match self.templates.get_mut(&id) {
                Some(existing) => existing.body = body,
                None => self.register(PromptTemplate {
                    id,
                    description: String::new(),
                    body,
                }),
            }
        }
        info!(path = %path.as_ref().display(), count, "imported prompt templates");
        Ok(count)
    }

    /// Merge every `.toml` template file in a directory.
    ///
    /// Returns the number of templates loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a file cannot be read or parsed.
    pub fn load_dir(&mut self, path: impl AsRef<Path>) -> Result<usize, TemplateError> {
        let mut count: usize = 0;
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();
            if file_path.extension().and_then(|e| e.to_str()) == Some("toml") {
                let contents = std::fs::read_to_string(&file_path)?;
                let template: PromptTemplate = toml::from_str(&contents)?;
                self.register(template);
                count = count.saturating_add(1);
            }
        }
        Ok(count)
    }
}
