//! # paperfmt
//!
//! Manuscript reformatting for Rust.
//!
//! This library reads a DOCX manuscript, works out which blocks are the
//! title, abstract, headings, body, figures, tables and references, and
//! writes a new DOCX styled after a publication template (IEEE, APA, MLA or
//! Chicago). Citations are renumbered or rewritten, references are
//! reordered and reformatted, and every package part other than the main
//! document is carried over unchanged.
//!
//! ## Quick Start
//!
//! ```no_run
//! use paperfmt::format_file;
//!
//! fn main() -> paperfmt::Result<()> {
//!     let output = format_file("paper.docx", "ieee")?;
//!     std::fs::write("paper_ieee.docx", &output.bytes)?;
//!     for warning in &output.warnings {
//!         eprintln!("warning: {}", warning);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Template driven**: styles, numbering and citation formats are JSON data
//! - **Lossless packaging**: untouched parts survive a rewrite byte-for-byte
//! - **Job orchestration**: staged processing with status, retention and cancellation
//! - **Bounded work**: archive limits and per-stage time budgets
//! - **Parallel batches**: uses Rayon for independent documents

pub mod analyze;
pub mod budget;
pub mod detect;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod package;
pub mod parser;
pub mod render;
pub mod template;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use analyze::{ClassifiedDocument, ClassifierOptions, Section, SectionClassifier, SectionKind};
pub use budget::StageBudget;
pub use detect::{detect_format_from_bytes, detect_format_from_path, is_package, PackageFormat};
pub use error::{Error, ErrorBody, Result};
pub use model::{
    Alignment, Block, BlockKind, Citation, CitationTarget, Classification, Document, Hyperlink,
    Metadata, ParagraphStyle, Reference, Table, TableCell, TableRow, TextRun, TextStyle,
};
pub use orchestrator::{
    Analysis, Download, FileId, JobStatus, Orchestrator, OrchestratorConfig, Stage,
};
pub use package::{Package, PackageLimits};
pub use parser::{BuildOptions, DocxParser};
pub use render::{JsonFormat, RenderOutput, RenderStats, RenderWarning, Renderer};
pub use template::{Template, TemplateRegistry};

use std::path::Path;

use rayon::prelude::*;

/// Parse a DOCX file into a document model.
///
/// # Example
///
/// ```no_run
/// use paperfmt::parse_file;
///
/// let doc = parse_file("paper.docx").unwrap();
/// println!("Blocks: {}", doc.block_count());
/// ```
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Document> {
    let data = std::fs::read(path)?;
    parse_bytes(&data)
}

/// Parse DOCX bytes into a document model.
pub fn parse_bytes(data: &[u8]) -> Result<Document> {
    let package = Package::open(data)?;
    DocxParser::new(&package).parse()
}

/// Format DOCX bytes with a built-in template.
pub fn format_bytes(data: &[u8], template: &str) -> Result<RenderOutput> {
    Paperfmt::new().open_bytes(data)?.render(template)
}

/// Format a DOCX file with a built-in template.
pub fn format_file<P: AsRef<Path>>(path: P, template: &str) -> Result<RenderOutput> {
    Paperfmt::new().open(path)?.render(template)
}

/// Format several documents in parallel.
///
/// Results are returned in input order; one failing document does not
/// affect the others.
pub fn format_batch<D>(documents: &[D], template: &str) -> Result<Vec<Result<RenderOutput>>>
where
    D: AsRef<[u8]> + Sync,
{
    let renderer = Renderer::new(TemplateRegistry::builtins()?.resolve(template)?);
    let pipeline = Paperfmt::new();

    log::debug!(
        "formatting {} document(s) with template '{}'",
        documents.len(),
        renderer.template().name
    );

    Ok(documents
        .par_iter()
        .map(|data| {
            let manuscript = pipeline.open_bytes(data.as_ref())?;
            manuscript.render_with(&renderer)
        })
        .collect())
}

/// Builder for one-shot, in-process formatting.
///
/// # Example
///
/// ```no_run
/// use paperfmt::{ClassifierOptions, Paperfmt};
///
/// let manuscript = Paperfmt::new()
///     .with_classifier_options(ClassifierOptions::new().with_reference_label("literature"))
///     .open("paper.docx")?;
/// println!("{} references", manuscript.references.len());
/// let output = manuscript.render("apa")?;
/// # Ok::<(), paperfmt::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Paperfmt {
    limits: PackageLimits,
    build_options: BuildOptions,
    classifier_options: ClassifierOptions,
}

impl Paperfmt {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set archive limits.
    pub fn with_limits(mut self, limits: PackageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set document builder options.
    pub fn with_build_options(mut self, options: BuildOptions) -> Self {
        self.build_options = options;
        self
    }

    /// Set classifier options.
    pub fn with_classifier_options(mut self, options: ClassifierOptions) -> Self {
        self.classifier_options = options;
        self
    }

    /// Open, build and classify a DOCX file.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<Manuscript> {
        let data = std::fs::read(path)?;
        self.open_bytes(&data)
    }

    /// Open, build and classify DOCX bytes.
    pub fn open_bytes(&self, data: &[u8]) -> Result<Manuscript> {
        let package = Package::open_with_limits(data, &self.limits, &StageBudget::unlimited("build"))?;
        let document = DocxParser::with_options(&package, self.build_options.clone()).parse()?;
        let classified = SectionClassifier::with_options(self.classifier_options.clone()).classify(&document)?;
        let references = analyze::extract_references(&classified.document);
        Ok(Manuscript {
            package,
            classified,
            references,
        })
    }
}

/// A classified manuscript ready to render.
#[derive(Debug, Clone)]
pub struct Manuscript {
    /// The source package
    pub package: Package,
    /// Classified document
    pub classified: ClassifiedDocument,
    /// References in source order
    pub references: Vec<Reference>,
}

impl Manuscript {
    /// Render with a built-in template.
    pub fn render(&self, template: &str) -> Result<RenderOutput> {
        self.render_with(&Renderer::new(TemplateRegistry::builtins()?.resolve(template)?))
    }

    /// Render with a prepared renderer.
    pub fn render_with(&self, renderer: &Renderer) -> Result<RenderOutput> {
        renderer.render(&self.package, &self.classified, &self.references)
    }

    /// The classified document.
    pub fn document(&self) -> &Document {
        &self.classified.document
    }

    /// Classification results as JSON.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        render::to_json(&self.classified, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{package_bytes, single_reference_body};

    #[test]
    fn test_builder() {
        let pipeline = Paperfmt::new()
            .with_limits(PackageLimits::new().with_max_entries(8))
            .with_classifier_options(ClassifierOptions::new().with_title_scan_limit(2));
        assert_eq!(pipeline.limits.max_entries, 8);
        assert_eq!(pipeline.classifier_options.title_scan_limit, 2);
    }

    #[test]
    fn test_parse_bytes_empty_data() {
        let result = parse_bytes(&[]);
        assert!(matches!(result, Err(Error::CorruptArchive(_))));
    }

    #[test]
    fn test_parse_bytes_not_a_package() {
        let result = parse_bytes(b"<!DOCTYPE html><html></html>");
        assert!(matches!(result, Err(Error::CorruptArchive(_))));
    }

    #[test]
    fn test_format_bytes() {
        let output = format_bytes(&package_bytes(&single_reference_body()), "ieee").unwrap();
        assert!(output.warnings.is_empty());
        assert_eq!(output.references.len(), 1);
        assert!(Package::open(&output.bytes).is_ok());
    }

    #[test]
    fn test_format_unknown_template() {
        let result = format_bytes(&package_bytes(&single_reference_body()), "vancouver");
        assert!(matches!(result, Err(Error::UnknownTemplate(_))));
    }

    #[test]
    fn test_format_batch_keeps_order() {
        let good = package_bytes(&single_reference_body());
        let documents = vec![good.clone(), b"garbage".to_vec(), good];
        let results = format_batch(&documents, "apa").unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_manuscript_json() {
        let manuscript = Paperfmt::new()
            .open_bytes(&package_bytes(&single_reference_body()))
            .unwrap();
        let json = manuscript.to_json(JsonFormat::Compact).unwrap();
        assert!(json.contains("\"sections\""));
    }
}
