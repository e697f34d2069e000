//! Benchmarks for paperfmt pipeline performance.
//!
//! Run with: cargo bench
//!
//! These benchmarks use synthetic manuscripts of increasing length.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use paperfmt::package::{CONTENT_TYPES_PART, DEFAULT_DOCUMENT_PART, PACKAGE_RELS_PART};
use paperfmt::parser::W_NS;
use paperfmt::{Package, Paperfmt, Renderer, TemplateRegistry};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

fn paragraph(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, text)
}

fn heading(text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:outlineLvl w:val="0"/></w:pPr><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        text
    )
}

/// Creates a manuscript with the given number of sections, each citing
/// one reference.
fn create_manuscript(sections: usize) -> Vec<u8> {
    let mut body = String::new();
    for i in 0..sections {
        body.push_str(&heading(&format!("Section {}", i + 1)));
        for _ in 0..4 {
            body.push_str(&paragraph(&format!(
                "Benchmark paragraph text for section {} as reported in [{}].",
                i + 1,
                i + 1
            )));
        }
    }
    body.push_str(&heading("References"));
    for i in 0..sections {
        body.push_str(&paragraph(&format!(
            "[{}] Author{}, A. ({}). Work number {}. Journal of Benchmarks.",
            i + 1,
            i,
            2000 + i % 20,
            i
        )));
    }

    let mut package = Package::new();
    package.insert(CONTENT_TYPES_PART, CONTENT_TYPES.as_bytes().to_vec());
    package.insert(PACKAGE_RELS_PART, PACKAGE_RELS.as_bytes().to_vec());
    package.insert(
        DEFAULT_DOCUMENT_PART,
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
            W_NS, body
        )
        .into_bytes(),
    );
    package.write().unwrap()
}

/// Benchmark package format detection.
fn bench_format_detection(c: &mut Criterion) {
    let data = create_manuscript(1);
    let not_a_package = b"Not a package at all, just random text content";

    c.bench_function("detect_valid_package", |b| {
        b.iter(|| paperfmt::detect_format_from_bytes(black_box(&data)).unwrap());
    });

    c.bench_function("detect_non_package", |b| {
        b.iter(|| paperfmt::detect_format_from_bytes(black_box(not_a_package)).is_err());
    });
}

/// Benchmark build and classification at various sizes.
fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");
    let pipeline = Paperfmt::new();

    for sections in [1, 10, 50].iter() {
        let data = create_manuscript(*sections);
        group.bench_function(format!("{}_sections", sections), |b| {
            b.iter(|| pipeline.open_bytes(black_box(&data)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark rendering with each built-in template.
fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let templates = TemplateRegistry::with_builtins().unwrap();
    let manuscript = Paperfmt::new().open_bytes(&create_manuscript(20)).unwrap();

    for name in templates.names() {
        let renderer = Renderer::new(templates.resolve(name).unwrap());
        group.bench_function(name, |b| {
            b.iter(|| manuscript.render_with(black_box(&renderer)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_format_detection, bench_analysis, bench_render);
criterion_main!(benches);
