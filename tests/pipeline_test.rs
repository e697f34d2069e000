//! End-to-end tests for the in-process formatting pipeline.

mod common;

use common::{block_texts, single_reference, two_references, DocxBuilder};
use paperfmt::{
    format_batch, format_bytes, format_file, Error, Package, PackageLimits, Paperfmt,
    RenderWarning,
};

#[test]
fn test_ieee_single_reference() {
    let output = format_bytes(&single_reference().build(), "ieee").unwrap();
    let texts = block_texts(&output.bytes);

    assert_eq!(texts[0], "I. Introduction");
    assert_eq!(texts[1], "cites [1]");
    assert_eq!(texts[2], "References");
    assert!(texts[3].starts_with("[1] J. Smith"));
    assert!(texts[3].contains("2020"));

    assert_eq!(output.references.len(), 1);
    assert_eq!(output.references[0].authors, vec!["Smith, J.".to_string()]);
    assert_eq!(output.references[0].year.as_deref(), Some("2020"));
    assert!(output.warnings.is_empty());
}

#[test]
fn test_numeric_order_follows_first_citation() {
    let output = format_bytes(&two_references().build(), "ieee").unwrap();
    let texts = block_texts(&output.bytes);

    assert!(texts.contains(&"First see [1], then [2].".to_string()));
    assert!(texts.contains(&"II. Method".to_string()));
    assert!(output.references[0].raw.contains("Adams"));
    assert!(output.references[1].raw.contains("Smith"));

    let entries: Vec<&String> = texts.iter().filter(|t| t.starts_with('[')).collect();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].starts_with("[1] B. Adams"));
    assert!(entries[1].starts_with("[2] J. Smith"));
}

#[test]
fn test_author_year_citations() {
    let output = format_bytes(&two_references().build(), "apa").unwrap();
    let texts = block_texts(&output.bytes);

    assert!(texts.iter().any(|t| t.contains("(Adams, 2018)")));
    assert!(texts.iter().any(|t| t.contains("(Smith, 2020)")));
    // Alphabetical by surname.
    assert!(output.references[0].raw.contains("Adams"));
    // No heading numbers in APA.
    assert!(texts.contains(&"Introduction".to_string()));
}

#[test]
fn test_suffixed_author_year_citations() {
    let input = DocxBuilder::new()
        .heading(1, "Introduction")
        .paragraph("Both (Smith, 2020b) and (Smith, 2020a) agree.")
        .heading(1, "References")
        .paragraph("Smith, J. (2020a). First study. Venue.")
        .paragraph("Smith, J. (2020b). Second study. Venue.")
        .build();

    let output = format_bytes(&input, "ieee").unwrap();
    assert!(output.warnings.is_empty(), "{:?}", output.warnings);
    let texts = block_texts(&output.bytes);
    assert!(texts.contains(&"Both [1] and [2] agree.".to_string()));
    assert!(output.references[0].raw.contains("Second study"));

    let output = format_bytes(&input, "apa").unwrap();
    let texts = block_texts(&output.bytes);
    assert!(texts.contains(&"Both (Smith, 2020b) and (Smith, 2020a) agree.".to_string()));
}

#[test]
fn test_note_anchors_and_links_survive() {
    let input = DocxBuilder::new()
        .heading(1, "Introduction")
        .raw(r#"<w:p><w:r><w:t xml:space="preserve">Known result [1]</w:t></w:r><w:r><w:footnoteReference w:id="1"/></w:r><w:r><w:t xml:space="preserve"> from </w:t></w:r><w:hyperlink r:id="rId9"><w:r><w:t>the archive</w:t></w:r></w:hyperlink><w:r><w:t>.</w:t></w:r></w:p>"#)
        .heading(1, "References")
        .paragraph("[1] Smith, J. (2020). Title. Venue.")
        .part("word/footnotes.xml", b"<w:footnotes/>")
        .build();

    let output = format_bytes(&input, "ieee").unwrap();
    let package = Package::open(&output.bytes).unwrap();
    let main = package.get_text("word/document.xml").unwrap();
    assert!(main.contains(r#"<w:footnoteReference w:id="1"/>"#));
    assert!(main.contains(r#"<w:hyperlink r:id="rId9">"#));

    let texts = block_texts(&output.bytes);
    assert!(texts.contains(&"Known result [1] from the archive.".to_string()));
}

#[test]
fn test_references_round_trip() {
    let input = two_references().build();
    let manuscript = Paperfmt::new().open_bytes(&input).unwrap();

    for template in ["ieee", "apa", "mla", "chicago"] {
        let output = manuscript.render(template).unwrap();
        assert_eq!(output.references.len(), manuscript.references.len());
        for reference in &manuscript.references {
            assert!(output.references.iter().any(|r| r.raw == reference.raw));
        }
    }
}

#[test]
fn test_mla_heading_title() {
    let output = format_bytes(&single_reference().build(), "mla").unwrap();
    let texts = block_texts(&output.bytes);
    assert!(texts.contains(&"Works Cited".to_string()));
    assert!(!texts.contains(&"References".to_string()));
}

#[test]
fn test_unresolved_citation_is_reported() {
    let input = DocxBuilder::new()
        .heading(1, "Introduction")
        .paragraph("As shown in [9].")
        .heading(1, "References")
        .paragraph("[1] Smith, J. (2020). Title. Venue.")
        .build();
    let output = format_bytes(&input, "ieee").unwrap();

    assert_eq!(output.warnings.len(), 1);
    assert!(matches!(
        &output.warnings[0],
        RenderWarning::UnresolvedCitation { text, .. } if text == "[9]"
    ));
    assert!(block_texts(&output.bytes).contains(&"As shown in [9].".to_string()));
}

#[test]
fn test_other_parts_survive_unchanged() {
    let image = [0x89, b'P', b'N', b'G', 1, 2, 3, 4];
    let input = single_reference().part("word/media/image1.png", &image).build();
    let source = Package::open(&input).unwrap();

    let output = format_bytes(&input, "chicago").unwrap();
    let rendered = Package::open(&output.bytes).unwrap();

    assert_eq!(rendered.len(), source.len());
    for name in source.names() {
        if name != source.main_document_name() {
            assert_eq!(rendered.get(name), source.get(name), "part {} changed", name);
        }
    }
    assert_eq!(rendered.get("word/media/image1.png"), Some(&image[..]));
}

#[test]
fn test_output_is_deterministic() {
    let input = two_references().build();
    let a = format_bytes(&input, "ieee").unwrap();
    let b = format_bytes(&input, "ieee").unwrap();
    assert_eq!(a.bytes, b.bytes);
}

#[test]
fn test_limits_reject_oversized_parts() {
    let input = single_reference().build();
    let result = Paperfmt::new()
        .with_limits(PackageLimits::new().with_max_part_size(64))
        .open_bytes(&input);
    assert!(matches!(result, Err(Error::CorruptArchive(_))));
}

#[test]
fn test_highly_compressible_part_rejected() {
    let bomb = vec![b'a'; 1 << 20];
    let input = single_reference().part("word/media/padding.bin", &bomb).build();
    let result = Paperfmt::new().open_bytes(&input);
    assert!(matches!(result, Err(Error::CorruptArchive(_))));
}

#[test]
fn test_not_a_package() {
    assert!(matches!(
        format_bytes(b"%PDF-1.7 not a docx", "ieee"),
        Err(Error::CorruptArchive(_))
    ));
}

#[test]
fn test_batch() {
    let documents = vec![single_reference().build(), two_references().build()];
    let results = format_batch(&documents, "ieee").unwrap();
    assert!(results.iter().all(|r| r.is_ok()));
    assert!(format_batch(&documents, "vancouver").is_err());
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("paper.docx");
    std::fs::write(&input, single_reference().build()).unwrap();

    let output = format_file(&input, "apa").unwrap();
    let out_path = dir.path().join("paper_apa.docx");
    std::fs::write(&out_path, &output.bytes).unwrap();

    let reopened = paperfmt::parse_file(&out_path).unwrap();
    assert_eq!(reopened.blocks.len(), 4);
    assert!(paperfmt::is_package(&out_path));
}
