//! Reformatting and re-emission of classified documents.
//!
//! [`Renderer`] applies a [`Template`] to a classified document, writes the
//! result as WordprocessingML and replaces the main document part of the
//! source package. Every other part is carried over unchanged.

mod bibliography;
mod docx_writer;
mod formatter;
mod json;
mod numbering;
mod result;

use std::sync::Arc;

use crate::analyze::ClassifiedDocument;
use crate::budget::StageBudget;
use crate::error::Result;
use crate::model::Reference;
use crate::package::Package;
use crate::template::Template;

pub use bibliography::{format_authors, format_entry, format_name, Bibliography};
pub use docx_writer::write_document;
pub use formatter::{Reformatted, Reformatter};
pub use json::{to_json, JsonFormat};
pub use numbering::{to_roman, HeadingCounter};
pub use result::{RenderOutput, RenderStats, RenderWarning};

/// Renders classified documents with one template.
#[derive(Debug, Clone)]
pub struct Renderer {
    reformatter: Reformatter,
}

impl Renderer {
    /// Create a renderer for a template.
    pub fn new(template: Arc<Template>) -> Self {
        Self {
            reformatter: Reformatter::new(template),
        }
    }

    /// The template in use.
    pub fn template(&self) -> &Template {
        self.reformatter.template()
    }

    /// Render without a time budget.
    pub fn render(
        &self,
        package: &Package,
        classified: &ClassifiedDocument,
        references: &[Reference],
    ) -> Result<RenderOutput> {
        self.render_with_budget(package, classified, references, &StageBudget::unlimited("render"))
    }

    /// Render under a time budget.
    pub fn render_with_budget(
        &self,
        package: &Package,
        classified: &ClassifiedDocument,
        references: &[Reference],
        budget: &StageBudget,
    ) -> Result<RenderOutput> {
        let reformatted = self.reformatter.apply(classified, references, budget)?;
        let markup = write_document(&reformatted.document, self.template(), budget)?;

        let mut output = package.clone();
        output.insert(package.main_document_name(), markup);
        let bytes = output.write()?;

        log::debug!(
            "rendered {} blocks with template '{}' ({} bytes)",
            reformatted.stats.block_count,
            self.template().name,
            bytes.len()
        );

        Ok(RenderOutput {
            document: reformatted.document,
            references: reformatted.references,
            bytes,
            warnings: reformatted.warnings,
            stats: reformatted.stats,
        })
    }
}
