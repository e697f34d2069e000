//! Style sheet resolution for `word/styles.xml`.
//!
//! Formatting in WordprocessingML is layered: document defaults, then the
//! paragraph style chain (`w:basedOn`), then the character style chain,
//! then direct run properties. [`StyleSheet`] resolves the style layers;
//! the builder applies direct formatting on top.

use std::collections::{HashMap, HashSet};

use roxmltree::Node;

use crate::model::{Alignment, ParagraphStyle, TextStyle};

/// WordprocessingML main namespace.
pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Longest `basedOn` chain followed before giving up.
const MAX_CHAIN: usize = 32;

/// Run properties where every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RunProps {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strikethrough: Option<bool>,
    pub superscript: Option<bool>,
    pub subscript: Option<bool>,
    pub small_caps: Option<bool>,
    pub font_name: Option<String>,
    pub font_size: Option<f32>,
}

impl RunProps {
    /// Read a `w:rPr` element.
    pub fn from_node(rpr: Node) -> Self {
        let mut props = RunProps::default();
        for child in rpr.children().filter(|n| is_w(n)) {
            match child.tag_name().name() {
                "b" => props.bold = Some(on_off(child)),
                "i" => props.italic = Some(on_off(child)),
                "u" => props.underline = Some(w_attr(child, "val").map_or(true, |v| v != "none")),
                "strike" | "dstrike" => props.strikethrough = Some(on_off(child)),
                "smallCaps" => props.small_caps = Some(on_off(child)),
                "vertAlign" => match w_attr(child, "val") {
                    Some("superscript") => {
                        props.superscript = Some(true);
                        props.subscript = Some(false);
                    }
                    Some("subscript") => {
                        props.superscript = Some(false);
                        props.subscript = Some(true);
                    }
                    _ => {
                        props.superscript = Some(false);
                        props.subscript = Some(false);
                    }
                },
                "rFonts" => {
                    props.font_name = w_attr(child, "ascii")
                        .or_else(|| w_attr(child, "hAnsi"))
                        .or_else(|| w_attr(child, "cs"))
                        .map(String::from);
                }
                "sz" => {
                    props.font_size = w_attr(child, "val")
                        .and_then(|v| v.parse::<f32>().ok())
                        .map(|half_points| half_points / 2.0);
                }
                _ => {}
            }
        }
        props
    }

    /// Layer `over` on top of `self`.
    pub fn overlay(&self, over: &RunProps) -> RunProps {
        RunProps {
            bold: over.bold.or(self.bold),
            italic: over.italic.or(self.italic),
            underline: over.underline.or(self.underline),
            strikethrough: over.strikethrough.or(self.strikethrough),
            superscript: over.superscript.or(self.superscript),
            subscript: over.subscript.or(self.subscript),
            small_caps: over.small_caps.or(self.small_caps),
            font_name: over.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: over.font_size.or(self.font_size),
        }
    }

    /// Collapse into a concrete text style.
    pub fn to_text_style(&self) -> TextStyle {
        TextStyle {
            bold: self.bold.unwrap_or(false),
            italic: self.italic.unwrap_or(false),
            underline: self.underline.unwrap_or(false),
            strikethrough: self.strikethrough.unwrap_or(false),
            superscript: self.superscript.unwrap_or(false),
            subscript: self.subscript.unwrap_or(false),
            small_caps: self.small_caps.unwrap_or(false),
            font_name: self.font_name.clone(),
            font_size: self.font_size,
        }
    }
}

/// Paragraph properties, optional per field for the same reason.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ParaProps {
    pub alignment: Option<Alignment>,
    pub line_spacing: Option<f32>,
    pub space_before: Option<f32>,
    pub space_after: Option<f32>,
    pub left_indent: Option<f32>,
    pub first_line_indent: Option<f32>,
    pub keep_with_next: Option<bool>,
    pub outline_level: Option<u8>,
}

impl ParaProps {
    /// Read a `w:pPr` element.
    pub fn from_node(ppr: Node) -> Self {
        let mut props = ParaProps::default();
        for child in ppr.children().filter(|n| is_w(n)) {
            match child.tag_name().name() {
                "jc" => props.alignment = w_attr(child, "val").map(Alignment::from_markup),
                "spacing" => {
                    props.space_before = w_attr(child, "before").and_then(twips_to_points);
                    props.space_after = w_attr(child, "after").and_then(twips_to_points);
                    let auto = w_attr(child, "lineRule").map_or(true, |r| r == "auto");
                    if auto {
                        props.line_spacing = w_attr(child, "line")
                            .and_then(|v| v.parse::<f32>().ok())
                            .map(|v| v / 240.0);
                    }
                }
                "ind" => {
                    props.left_indent = w_attr(child, "left")
                        .or_else(|| w_attr(child, "start"))
                        .and_then(twips_to_points);
                    props.first_line_indent = match w_attr(child, "hanging") {
                        Some(h) => twips_to_points(h).map(|v| -v),
                        None => w_attr(child, "firstLine").and_then(twips_to_points),
                    };
                }
                "keepNext" => props.keep_with_next = Some(on_off(child)),
                "outlineLvl" => {
                    // Level 9 means body text.
                    props.outline_level = w_attr(child, "val")
                        .and_then(|v| v.parse::<u8>().ok())
                        .filter(|l| *l < 9);
                }
                _ => {}
            }
        }
        props
    }

    pub fn overlay(&self, over: &ParaProps) -> ParaProps {
        ParaProps {
            alignment: over.alignment.or(self.alignment),
            line_spacing: over.line_spacing.or(self.line_spacing),
            space_before: over.space_before.or(self.space_before),
            space_after: over.space_after.or(self.space_after),
            left_indent: over.left_indent.or(self.left_indent),
            first_line_indent: over.first_line_indent.or(self.first_line_indent),
            keep_with_next: over.keep_with_next.or(self.keep_with_next),
            outline_level: over.outline_level.or(self.outline_level),
        }
    }

    /// Concrete paragraph style, with the style identity filled in.
    pub fn to_paragraph_style(&self, id: Option<&str>, name: Option<&str>) -> ParagraphStyle {
        ParagraphStyle {
            style_id: id.map(String::from),
            style_name: name.map(String::from),
            alignment: self.alignment.unwrap_or_default(),
            line_spacing: self.line_spacing,
            space_before: self.space_before,
            space_after: self.space_after,
            left_indent: self.left_indent,
            first_line_indent: self.first_line_indent,
            keep_with_next: self.keep_with_next.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct StyleDef {
    name: Option<String>,
    based_on: Option<String>,
    run: RunProps,
    para: ParaProps,
}

/// A paragraph or character style with its chain resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ResolvedStyle {
    pub name: Option<String>,
    pub run: RunProps,
    pub para: ParaProps,
}

/// Styles declared in `word/styles.xml`.
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    defaults: RunProps,
    paragraph_default: Option<String>,
    styles: HashMap<String, StyleDef>,
}

impl StyleSheet {
    /// An empty style sheet; every lookup falls back to defaults.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a style sheet. Malformed style sheets are not fatal: the
    /// document is still readable, only with less formatting information.
    pub fn parse(markup: &str, options: roxmltree::ParsingOptions) -> Self {
        let doc = match roxmltree::Document::parse_with_options(markup, options) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("ignoring unreadable style sheet: {}", e);
                return Self::empty();
            }
        };

        let mut sheet = Self::empty();
        let root = doc.root_element();

        if let Some(rpr) = root
            .children()
            .find(|n| is_w_named(n, "docDefaults"))
            .and_then(|d| d.children().find(|n| is_w_named(n, "rPrDefault")))
            .and_then(|d| d.children().find(|n| is_w_named(n, "rPr")))
        {
            sheet.defaults = RunProps::from_node(rpr);
        }

        for style in root.children().filter(|n| is_w_named(n, "style")) {
            let Some(id) = w_attr(style, "styleId") else {
                continue;
            };

            let mut def = StyleDef::default();
            for child in style.children().filter(|n| is_w(n)) {
                match child.tag_name().name() {
                    "name" => def.name = w_attr(child, "val").map(String::from),
                    "basedOn" => def.based_on = w_attr(child, "val").map(String::from),
                    "rPr" => def.run = RunProps::from_node(child),
                    "pPr" => def.para = ParaProps::from_node(child),
                    _ => {}
                }
            }

            let is_paragraph = w_attr(style, "type").map_or(true, |t| t == "paragraph");
            if is_paragraph && w_attr(style, "default").map_or(false, |d| d == "1" || d == "true") {
                sheet.paragraph_default = Some(id.to_string());
            }
            sheet.styles.insert(id.to_string(), def);
        }

        log::debug!("style sheet: {} styles", sheet.styles.len());
        sheet
    }

    /// Number of declared styles.
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Check if no styles are declared.
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Human-readable name of a style.
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.styles.get(id).and_then(|s| s.name.as_deref())
    }

    /// Document-wide default run properties.
    pub(crate) fn defaults(&self) -> &RunProps {
        &self.defaults
    }

    /// The paragraph style applied when a paragraph names none.
    pub(crate) fn paragraph_default(&self) -> Option<&str> {
        self.paragraph_default.as_deref()
    }

    /// Resolve a style through its `basedOn` chain. Unknown ids resolve to
    /// an empty style; cycles are cut.
    pub(crate) fn resolve(&self, id: &str) -> ResolvedStyle {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id);

        while let Some(style_id) = current {
            if chain.len() >= MAX_CHAIN || !seen.insert(style_id) {
                log::debug!("style chain for '{}' cut at '{}'", id, style_id);
                break;
            }
            let Some(def) = self.styles.get(style_id) else {
                break;
            };
            chain.push(def);
            current = def.based_on.as_deref();
        }

        let mut resolved = ResolvedStyle {
            name: chain.first().and_then(|d| d.name.clone()),
            ..Default::default()
        };
        for def in chain.iter().rev() {
            resolved.run = resolved.run.overlay(&def.run);
            resolved.para = resolved.para.overlay(&def.para);
        }
        resolved
    }
}

/// Heading depth implied by a style name such as "heading 2".
pub(crate) fn heading_level_from_name(name: &str) -> Option<u8> {
    let lower = name.trim().to_ascii_lowercase();
    let rest = lower.strip_prefix("heading")?.trim();
    let level = rest.parse::<u8>().ok()?;
    (1..=9).contains(&level).then_some(level)
}

pub(crate) fn is_w(node: &Node) -> bool {
    node.is_element() && node.tag_name().namespace() == Some(W_NS)
}

pub(crate) fn is_w_named(node: &Node, name: &str) -> bool {
    is_w(node) && node.tag_name().name() == name
}

pub(crate) fn w_attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute((W_NS, name))
}

/// Read a toggle property: absent `w:val` means on.
pub(crate) fn on_off(node: Node) -> bool {
    !matches!(w_attr(node, "val"), Some("0") | Some("false") | Some("off"))
}

fn twips_to_points(value: &str) -> Option<f32> {
    value.parse::<f32>().ok().map(|t| t / 20.0)
}
