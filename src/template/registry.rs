//! Template registry.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};

use super::Template;

const BUILTIN_TEMPLATES: [(&str, &str); 4] = [
    ("ieee", include_str!("../../templates/ieee.json")),
    ("apa", include_str!("../../templates/apa.json")),
    ("mla", include_str!("../../templates/mla.json")),
    ("chicago", include_str!("../../templates/chicago.json")),
];

/// Registry of named templates.
///
/// Templates are validated when registered and handed out as shared
/// immutable `Arc<Template>`s. Build the registry fully before sharing it.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Arc<Template>>,
}

impl TemplateRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in IEEE, APA, MLA and Chicago templates.
    ///
    /// Parsed and validated on first use, then shared for the life of the
    /// process.
    pub fn builtins() -> Result<&'static Self> {
        static BUILTINS: OnceLock<TemplateRegistry> = OnceLock::new();
        if let Some(registry) = BUILTINS.get() {
            return Ok(registry);
        }
        let registry = Self::load_builtins()?;
        Ok(BUILTINS.get_or_init(|| registry))
    }

    /// Create a registry holding the built-in templates, ready for
    /// additional registrations. Templates are shared with [`builtins`](Self::builtins).
    pub fn with_builtins() -> Result<Self> {
        Self::builtins().cloned()
    }

    fn load_builtins() -> Result<Self> {
        let mut registry = Self::new();
        for (name, json) in BUILTIN_TEMPLATES {
            let template = Template::from_json(json).map_err(|e| match e {
                Error::Json(err) => Error::InvalidTemplate {
                    name: name.to_string(),
                    reason: err.to_string(),
                },
                other => other,
            })?;
            registry.register(template)?;
        }
        Ok(registry)
    }

    /// Validate and register a template, replacing one with the same name.
    pub fn register(&mut self, template: Template) -> Result<()> {
        template.validate()?;
        let key = template.name.to_lowercase();
        log::debug!("registered template '{}'", key);
        self.templates.insert(key, Arc::new(template));
        Ok(())
    }

    /// Look up a template by name (case-insensitive).
    pub fn resolve(&self, name: &str) -> Result<Arc<Template>> {
        self.templates
            .get(&name.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| Error::UnknownTemplate(name.to_string()))
    }

    /// Check if a template is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(&name.trim().to_lowercase())
    }

    /// Registered template names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    /// Iterate over registered templates.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Template>> {
        self.templates.values()
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{CitationStyle, HeadingNumbering, ReferenceOrder};

    #[test]
    fn test_builtins_load() {
        let registry = TemplateRegistry::with_builtins().unwrap();
        assert_eq!(registry.names(), vec!["apa", "chicago", "ieee", "mla"]);
        for template in registry.iter() {
            assert!(template.check_expressible().is_ok(), "{}", template.name);
        }
    }

    #[test]
    fn test_builtins_are_shared() {
        let first = TemplateRegistry::builtins().unwrap();
        let second = TemplateRegistry::builtins().unwrap();
        assert!(std::ptr::eq(first, second));

        let mut extended = TemplateRegistry::with_builtins().unwrap();
        let ieee = first.resolve("ieee").unwrap();
        assert!(Arc::ptr_eq(&ieee, &extended.resolve("ieee").unwrap()));

        let mut custom = (*ieee).clone();
        custom.name = "house".to_string();
        extended.register(custom).unwrap();
        assert!(extended.contains("house"));
        assert!(!TemplateRegistry::builtins().unwrap().contains("house"));
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let registry = TemplateRegistry::with_builtins().unwrap();
        let ieee = registry.resolve("IEEE").unwrap();
        assert_eq!(ieee.name, "ieee");
        assert_eq!(ieee.heading_numbering, HeadingNumbering::Roman);
        assert_eq!(ieee.citation.style, CitationStyle::Numeric);
        assert_eq!(ieee.references.order, ReferenceOrder::Appearance);
    }

    #[test]
    fn test_unknown_template() {
        let registry = TemplateRegistry::with_builtins().unwrap();
        let err = registry.resolve("vancouver").unwrap_err();
        assert!(matches!(err, Error::UnknownTemplate(name) if name == "vancouver"));
    }

    #[test]
    fn test_reference_headings() {
        let registry = TemplateRegistry::with_builtins().unwrap();
        assert_eq!(registry.resolve("mla").unwrap().references.heading, "Works Cited");
        assert_eq!(registry.resolve("apa").unwrap().references.heading, "References");
        assert_eq!(
            registry.resolve("apa").unwrap().references.order,
            ReferenceOrder::Alphabetical
        );
    }

    #[test]
    fn test_register_custom_rejects_invalid() {
        let mut registry = TemplateRegistry::with_builtins().unwrap();
        let mut custom = registry.resolve("ieee").unwrap().as_ref().clone();
        custom.name = "my style".to_string();
        assert!(matches!(
            registry.register(custom.clone()),
            Err(Error::InvalidTemplate { .. })
        ));

        custom.name = "house".to_string();
        registry.register(custom).unwrap();
        assert!(registry.contains("HOUSE"));
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_shared_instances() {
        let registry = TemplateRegistry::with_builtins().unwrap();
        let a = registry.resolve("apa").unwrap();
        let b = registry.resolve("apa").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
