//! Applies a template to a classified document.

use std::collections::HashSet;
use std::sync::Arc;

use crate::analyze::{ClassifiedDocument, SectionKind};
use crate::budget::StageBudget;
use crate::error::Result;
use crate::model::{Block, BlockKind, Classification, Document, Reference, TextRun};
use crate::template::{BlockStyle, Template};

use super::bibliography::{format_entry, Bibliography};
use super::numbering::HeadingCounter;
use super::{RenderStats, RenderWarning};

/// A reformatted document before serialization.
#[derive(Debug, Clone)]
pub struct Reformatted {
    /// The new document
    pub document: Document,
    /// References in output order
    pub references: Vec<Reference>,
    /// Non-fatal problems
    pub warnings: Vec<RenderWarning>,
    /// Statistics
    pub stats: RenderStats,
}

/// Produces a new document laid out per a template.
#[derive(Debug, Clone)]
pub struct Reformatter {
    template: Arc<Template>,
}

impl Reformatter {
    /// Create a reformatter for a template.
    pub fn new(template: Arc<Template>) -> Self {
        Self { template }
    }

    /// The template in use.
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Reformat a classified document.
    ///
    /// Fails with [`Error::Render`](crate::Error::Render) when the template
    /// cannot be expressed in the output markup.
    pub fn apply(
        &self,
        classified: &ClassifiedDocument,
        references: &[Reference],
        budget: &StageBudget,
    ) -> Result<Reformatted> {
        let template = self.template.as_ref();
        template.check_expressible()?;

        let bibliography =
            Bibliography::build(references, &classified.citations, template.references.order);
        let mut stats = RenderStats::new();
        let mut blocks = classified.document.blocks.clone();

        let mut unresolved = Vec::new();
        for citation in classified.citations.iter().rev() {
            budget.check()?;
            let Some(block) = blocks.get_mut(citation.block) else {
                continue;
            };
            match bibliography.citation_text(&citation.target, &template.citation) {
                Some(text) if block.replace_text_range(citation.span.start, citation.span.end, &text) => {
                    stats.citations_rewritten += 1;
                }
                _ => unresolved.push(RenderWarning::UnresolvedCitation {
                    block: citation.block,
                    text: citation.text.clone(),
                }),
            }
        }
        unresolved.reverse();
        let mut warnings = unresolved;

        let reference_headings: HashSet<usize> = classified
            .sections
            .iter()
            .filter(|s| s.kind == SectionKind::References)
            .filter_map(|s| s.heading_block)
            .collect();

        let mut counter = HeadingCounter::new(template.heading_numbering);
        let mut body: Vec<Block> = Vec::with_capacity(blocks.len());
        let mut reference_heading: Option<Block> = None;
        let mut reference_slot: Option<usize> = None;

        for (index, mut block) in blocks.into_iter().enumerate() {
            budget.check()?;

            if reference_headings.contains(&index) {
                // Several reference lists are merged under the first heading.
                if reference_heading.is_none() {
                    block.set_text(template.references.heading.as_str());
                    reference_heading = Some(block);
                    reference_slot.get_or_insert(body.len());
                }
                continue;
            }
            if block.label == Classification::ReferenceEntry {
                reference_slot.get_or_insert(body.len());
                continue;
            }

            if let Classification::Heading(level) = block.label {
                if let Some(number) = counter.next(level) {
                    let style = block.runs.first().map(|r| r.style.clone()).unwrap_or_default();
                    block.runs.insert(0, TextRun::styled(format!("{} ", number), style));
                    stats.numbered_headings += 1;
                }
            }
            apply_style(&mut block, template);
            body.push(block);
        }

        let mut section = Vec::new();
        if reference_heading.is_some() || !references.is_empty() {
            let mut heading = reference_heading.unwrap_or_else(|| {
                let mut heading = Block::heading(template.references.heading.as_str(), 1);
                heading.label = Classification::Heading(1);
                heading
            });
            apply_style(&mut heading, template);
            section.push(heading);
        }
        for &index in bibliography.order() {
            budget.check()?;
            let number = bibliography.number_of(index).unwrap_or(index + 1);
            let (runs, fallback) = format_entry(&references[index], number, &template.references);
            if fallback {
                warnings.push(RenderWarning::RawReference { number });
            }
            let mut entry = Block::new(BlockKind::ReferenceEntry);
            entry.runs = runs;
            entry.label = Classification::ReferenceEntry;
            apply_style(&mut entry, template);
            section.push(entry);
        }
        stats.reference_count = references.len() as u32;

        match reference_slot {
            Some(slot) if !template.references.at_end => {
                body.splice(slot..slot, section);
            }
            _ => body.extend(section),
        }
        stats.block_count = body.len() as u32;

        for warning in &warnings {
            log::warn!("{}", warning);
        }

        Ok(Reformatted {
            document: Document {
                metadata: classified.document.metadata.clone(),
                blocks: body,
                markup: classified.document.markup.clone(),
            },
            references: bibliography.ordered_references(),
            warnings,
            stats,
        })
    }
}

/// Apply the role style of a block's label to the block and its runs.
///
/// Titles, author lines and headings take their emphasis from the template;
/// other roles keep run-level emphasis from the source.
fn apply_style(block: &mut Block, template: &Template) {
    let style: &BlockStyle = template.styles.for_label(block.label);

    block.style.alignment = style.alignment;
    if matches!(block.kind, BlockKind::Figure { .. } | BlockKind::Table(_)) {
        return;
    }

    block.style.line_spacing = Some(style.line_spacing);
    block.style.space_before = Some(style.space_before);
    block.style.space_after = Some(style.space_after);
    if style.hanging_indent > 0.0 {
        block.style.left_indent = Some(style.hanging_indent);
        block.style.first_line_indent = Some(-style.hanging_indent);
    } else {
        block.style.left_indent = None;
        block.style.first_line_indent = (style.first_line_indent > 0.0).then_some(style.first_line_indent);
    }

    let replaces_emphasis = matches!(
        block.label,
        Classification::Title | Classification::AuthorBlock | Classification::Heading(_)
    );
    block.style.keep_with_next = block.label.heading_level().is_some();

    for run in &mut block.runs {
        run.style.font_name = Some(style.font_family.clone());
        run.style.font_size = Some(style.font_size);
        if replaces_emphasis {
            run.style.bold = style.bold;
            run.style.italic = style.italic;
            run.style.small_caps = style.small_caps;
        } else {
            run.style.bold |= style.bold;
            run.style.italic |= style.italic;
            run.style.small_caps |= style.small_caps;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{extract_references, SectionClassifier};
    use crate::model::Alignment;
    use crate::template::TemplateRegistry;

    fn scenario() -> ClassifiedDocument {
        let doc = Document::from_blocks(vec![
            Block::heading("Introduction", 1),
            Block::paragraph("cites [1]"),
            Block::heading("References", 1),
            Block::paragraph("[1] Smith, J. (2020). Title. Venue."),
        ]);
        SectionClassifier::new().classify(&doc).unwrap()
    }

    fn reformat(name: &str, classified: &ClassifiedDocument) -> Reformatted {
        let registry = TemplateRegistry::with_builtins().unwrap();
        let references = extract_references(&classified.document);
        Reformatter::new(registry.resolve(name).unwrap())
            .apply(classified, &references, &StageBudget::default())
            .unwrap()
    }

    fn texts(doc: &Document) -> Vec<String> {
        doc.blocks.iter().map(|b| b.plain_text()).collect()
    }

    #[test]
    fn test_ieee_scenario() {
        let out = reformat("ieee", &scenario());
        assert_eq!(
            texts(&out.document),
            vec![
                "I. Introduction",
                "cites [1]",
                "References",
                "[1] J. Smith, \"Title,\" Venue, 2020.",
            ]
        );
        assert_eq!(out.references.len(), 1);
        assert_eq!(out.references[0].authors, vec!["Smith, J."]);
        assert_eq!(out.references[0].raw, "[1] Smith, J. (2020). Title. Venue.");
        assert!(out.warnings.is_empty());
        assert_eq!(out.stats.numbered_headings, 1);
        assert_eq!(out.stats.citations_rewritten, 1);
    }

    #[test]
    fn test_apa_rewrites_numeric_citation() {
        let out = reformat("apa", &scenario());
        let text = texts(&out.document);
        assert_eq!(text[0], "Introduction");
        assert_eq!(text[1], "cites (Smith, 2020)");
        assert_eq!(text[3], "Smith, J. (2020). Title. Venue.");
        assert!(out.document.blocks[3]
            .runs
            .iter()
            .any(|r| r.text == "Venue" && r.style.italic));
    }

    #[test]
    fn test_mla_retitles_reference_heading() {
        let out = reformat("mla", &scenario());
        assert_eq!(out.document.blocks[2].plain_text(), "Works Cited");
        assert_eq!(out.document.blocks[2].label, Classification::Heading(1));
    }

    #[test]
    fn test_unresolved_citation_left_untouched() {
        let doc = Document::from_blocks(vec![
            Block::heading("Intro", 1),
            Block::paragraph("see [1] and [7]"),
            Block::heading("References", 1),
            Block::paragraph("[1] Smith, J. (2020). Title. Venue."),
        ]);
        let classified = SectionClassifier::new().classify(&doc).unwrap();
        let out = reformat("ieee", &classified);
        assert_eq!(out.document.blocks[1].plain_text(), "see [1] and [7]");
        assert_eq!(
            out.warnings,
            vec![RenderWarning::UnresolvedCitation {
                block: 1,
                text: "[7]".to_string()
            }]
        );
    }

    #[test]
    fn test_references_move_to_end() {
        let doc = Document::from_blocks(vec![
            Block::heading("Intro", 1),
            Block::paragraph("see [1]"),
            Block::heading("References", 1),
            Block::paragraph("[1] Smith, J. (2020). Title. Venue."),
            Block::heading("Appendix", 1),
            Block::paragraph("extra material"),
        ]);
        let classified = SectionClassifier::new().classify(&doc).unwrap();
        let out = reformat("ieee", &classified);
        let text = texts(&out.document);
        assert_eq!(text[2], "II. Appendix");
        assert_eq!(text[4], "References");
        assert_eq!(out.document.blocks[5].label, Classification::ReferenceEntry);
    }

    #[test]
    fn test_references_stay_in_place_when_template_says_so() {
        let doc = Document::from_blocks(vec![
            Block::heading("Intro", 1),
            Block::heading("References", 1),
            Block::paragraph("[1] Smith, J. (2020). Title. Venue."),
            Block::heading("Appendix", 1),
        ]);
        let classified = SectionClassifier::new().classify(&doc).unwrap();
        let registry = TemplateRegistry::with_builtins().unwrap();
        let mut template = registry.resolve("ieee").unwrap().as_ref().clone();
        template.references.at_end = false;
        let references = extract_references(&classified.document);
        let out = Reformatter::new(Arc::new(template))
            .apply(&classified, &references, &StageBudget::default())
            .unwrap();
        let text = texts(&out.document);
        assert_eq!(text[1], "References");
        assert_eq!(text[3], "II. Appendix");
    }

    #[test]
    fn test_styles_applied() {
        let out = reformat("ieee", &scenario());
        let heading = &out.document.blocks[0];
        assert_eq!(heading.style.alignment, Alignment::Center);
        assert!(heading.runs.iter().all(|r| r.style.small_caps && !r.style.bold));
        let body = &out.document.blocks[1];
        assert_eq!(body.runs[0].style.font_size, Some(10.0));
        assert_eq!(body.runs[0].style.font_name.as_deref(), Some("Times New Roman"));
        let entry = &out.document.blocks[3];
        assert_eq!(entry.style.first_line_indent, Some(-18.0));
    }

    #[test]
    fn test_unsupported_style_is_render_error() {
        let registry = TemplateRegistry::with_builtins().unwrap();
        let mut template = registry.resolve("apa").unwrap().as_ref().clone();
        template.styles.title.font_size = 11.25;
        let err = Reformatter::new(Arc::new(template))
            .apply(&scenario(), &[], &StageBudget::default())
            .unwrap_err();
        assert!(matches!(err, crate::Error::Render(_)));
    }

    #[test]
    fn test_raw_reference_warning() {
        let doc = Document::from_blocks(vec![
            Block::heading("References", 1),
            Block::paragraph("Some notes collected in 1999"),
        ]);
        let classified = SectionClassifier::new().classify(&doc).unwrap();
        let out = reformat("apa", &classified);
        assert_eq!(out.warnings, vec![RenderWarning::RawReference { number: 1 }]);
        assert_eq!(out.document.blocks[1].plain_text(), "Some notes collected in 1999");
    }
}
