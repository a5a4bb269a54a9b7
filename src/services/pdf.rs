//! PDF access through lopdf: page text, the bookmark tree, and page-subset output.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use crate::error::PdfError;
use crate::models::{OutlineEntry, OutlineNode, TextBlock};
use crate::utils::write_atomic;

/// Guard against malformed outlines with `Next`/`First` cycles.
const MAX_OUTLINE_ITEMS: usize = 10_000;

// A4 in points, 2cm margins. Courier glyphs are 0.6em wide.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 57.0;
const BODY_SIZE: f32 = 11.0;
const TITLE_SIZE: f32 = 18.0;
const GLYPH_WIDTH: f32 = 0.6;

/// A loaded PDF.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    path: PathBuf,
    doc: Document,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self, PdfError> {
        let doc = Document::load(path).map_err(|e| PdfError::LoadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without extension.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Text of every page, one block per page with a zero-based page number.
    ///
    /// Pages whose text cannot be extracted are logged and yield an empty block.
    pub fn page_texts(&self) -> Vec<TextBlock> {
        self.doc
            .get_pages()
            .keys()
            .map(|&number| {
                let text = match self.doc.extract_text(&[number]) {
                    Ok(text) => text,
                    Err(e) => {
                        let error = PdfError::TextError {
                            page: number,
                            reason: e.to_string(),
                        };
                        tracing::warn!("[pdf] {}: {}", self.path.display(), error);
                        String::new()
                    }
                };
                TextBlock::page(number - 1, text)
            })
            .collect()
    }

    /// The bookmark tree. Children of an entry follow it as a `Group`. Entries whose
    /// destination cannot be resolved to a page are dropped.
    pub fn outline(&self) -> Vec<OutlineNode> {
        let page_numbers: HashMap<ObjectId, u32> = self
            .doc
            .get_pages()
            .into_iter()
            .map(|(number, id)| (id, number - 1))
            .collect();

        let Some(first) = self
            .catalog()
            .and_then(|c| c.get(b"Outlines").ok())
            .and_then(|o| self.resolve_dict(o))
            .and_then(|outlines| outlines.get(b"First").ok())
            .and_then(|o| o.as_reference().ok())
        else {
            return Vec::new();
        };

        let mut walker = OutlineWalker {
            pdf: self,
            page_numbers: &page_numbers,
            visited: HashSet::new(),
        };
        walker.siblings(first)
    }

    /// Write the given zero-based pages, in document order, to `target`.
    /// Returns the number of pages written.
    pub fn write_pages(&self, pages: &[u32], target: &Path) -> Result<u32, PdfError> {
        let total = self.page_count();
        if let Some(&bad) = pages.iter().find(|&&p| p >= total) {
            return Err(PdfError::InvalidRange {
                start: bad,
                end: bad + 1,
                pages: total,
            });
        }

        let keep: HashSet<u32> = pages.iter().map(|p| p + 1).collect();
        let mut doc = self.doc.clone();
        let delete: Vec<u32> = doc
            .get_pages()
            .keys()
            .copied()
            .filter(|n| !keep.contains(n))
            .collect();
        doc.delete_pages(&delete);

        // Bookmarks would point at pages that no longer exist.
        if let Ok(root) = doc.trailer.get(b"Root").and_then(Object::as_reference)
            && let Ok(catalog) = doc.get_object_mut(root).and_then(Object::as_dict_mut)
        {
            catalog.remove(b"Outlines");
        }

        doc.prune_objects();
        doc.renumber_objects();
        doc.compress();

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).map_err(|e| PdfError::WriteError {
            path: target.to_path_buf(),
            reason: e.to_string(),
        })?;
        write_atomic(target, &buffer)?;

        Ok(keep.len() as u32)
    }

    fn catalog(&self) -> Option<&Dictionary> {
        self.doc.catalog().ok()
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        match object {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    fn resolve_dict<'a>(&'a self, object: &'a Object) -> Option<&'a Dictionary> {
        self.resolve(object).and_then(|o| o.as_dict().ok())
    }

    /// Page object referenced by an explicit destination array, or a named destination.
    fn destination_page(&self, dest: &Object, depth: usize) -> Option<ObjectId> {
        if depth > 4 {
            return None;
        }
        match self.resolve(dest)? {
            Object::Array(items) => items.first().and_then(|o| o.as_reference().ok()),
            Object::Dictionary(dict) => dict
                .get(b"D")
                .ok()
                .and_then(|d| self.destination_page(d, depth + 1)),
            Object::Name(name) | Object::String(name, _) => {
                let target = self.named_destination(name)?;
                self.destination_page(target, depth + 1)
            }
            _ => None,
        }
    }

    fn named_destination(&self, name: &[u8]) -> Option<&Object> {
        let catalog = self.catalog()?;

        // PDF 1.1 style: /Dests dictionary in the catalog.
        if let Some(found) = catalog
            .get(b"Dests")
            .ok()
            .and_then(|d| self.resolve_dict(d))
            .and_then(|dests| dests.get(name).ok())
        {
            return Some(found);
        }

        let root = catalog
            .get(b"Names")
            .ok()
            .and_then(|n| self.resolve_dict(n))
            .and_then(|names| names.get(b"Dests").ok())
            .and_then(|d| self.resolve_dict(d))?;
        self.search_name_tree(root, name, 0)
    }

    fn search_name_tree<'a>(
        &'a self,
        node: &'a Dictionary,
        name: &[u8],
        depth: usize,
    ) -> Option<&'a Object> {
        if depth > 32 {
            return None;
        }
        if let Ok(Object::Array(pairs)) = node.get(b"Names") {
            for pair in pairs.chunks(2) {
                if let [Object::String(key, _), value] = pair
                    && key.as_slice() == name
                {
                    return Some(value);
                }
            }
        }
        if let Ok(Object::Array(kids)) = node.get(b"Kids") {
            for kid in kids {
                if let Some(found) = self
                    .resolve_dict(kid)
                    .and_then(|k| self.search_name_tree(k, name, depth + 1))
                {
                    return Some(found);
                }
            }
        }
        None
    }
}

struct OutlineWalker<'a> {
    pdf: &'a PdfDocument,
    page_numbers: &'a HashMap<ObjectId, u32>,
    visited: HashSet<ObjectId>,
}

impl OutlineWalker<'_> {
    /// Walk a `First`/`Next` sibling chain starting at `first`.
    fn siblings(&mut self, first: ObjectId) -> Vec<OutlineNode> {
        let pdf = self.pdf;
        let mut nodes = Vec::new();
        let mut current = Some(first);

        while let Some(id) = current {
            if self.visited.len() >= MAX_OUTLINE_ITEMS || !self.visited.insert(id) {
                break;
            }
            let Ok(item) = pdf.doc.get_object(id).and_then(Object::as_dict) else {
                break;
            };

            if let Some(entry) = self.entry(item) {
                nodes.push(OutlineNode::Leaf(entry));
            }
            if let Ok(child) = item.get(b"First").and_then(Object::as_reference) {
                let children = self.siblings(child);
                if !children.is_empty() {
                    nodes.push(OutlineNode::Group(children));
                }
            }

            current = item.get(b"Next").and_then(Object::as_reference).ok();
        }

        nodes
    }

    fn entry(&self, item: &Dictionary) -> Option<OutlineEntry> {
        let title = item
            .get(b"Title")
            .ok()
            .and_then(|t| self.pdf.resolve(t))
            .map(decode_text_string)
            .unwrap_or_default();

        let dest = item
            .get(b"Dest")
            .ok()
            .or_else(|| {
                item.get(b"A")
                    .ok()
                    .and_then(|a| self.pdf.resolve_dict(a))
                    .and_then(|action| action.get(b"D").ok())
            })?;

        let page_id = self.pdf.destination_page(dest, 0)?;
        let page = *self.page_numbers.get(&page_id)?;
        Some(OutlineEntry::new(title.trim(), page))
    }
}

/// One line of laid-out text; `None` is vertical space.
struct Line {
    font: &'static str,
    size: f32,
    text: Option<String>,
}

impl Line {
    fn leading(&self) -> f32 {
        self.size * 1.35
    }
}

fn columns(size: f32) -> usize {
    ((PAGE_WIDTH - 2.0 * MARGIN) / (size * GLYPH_WIDTH)) as usize
}

/// Greedy word wrap to `width` characters; words longer than a line are hard-split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }
        if current_len > 0 && current_len + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// WinAnsi bytes for `text`. Common typographic punctuation is folded to ASCII; anything
/// else outside Latin-1 becomes `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => out.push(b'\''),
            '\u{201C}' | '\u{201D}' => out.push(b'"'),
            '\u{2013}' | '\u{2014}' => out.push(b'-'),
            '\u{2026}' => out.extend_from_slice(b"..."),
            '\u{00A0}' => out.push(b' '),
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => out.push(c as u8),
            _ => out.push(b'?'),
        }
    }
    out
}

/// Write a plain text document: the title in a larger face, then each paragraph, wrapped
/// and paginated onto A4 pages. Returns the page count.
pub fn render_text_document(
    title: &str,
    paragraphs: &[String],
    target: &Path,
) -> Result<u32, PdfError> {
    let mut lines = Vec::new();
    for text in wrap_text(title, columns(TITLE_SIZE)) {
        lines.push(Line {
            font: "F2",
            size: TITLE_SIZE,
            text: Some(text),
        });
    }
    if !lines.is_empty() {
        lines.push(Line {
            font: "F2",
            size: TITLE_SIZE,
            text: None,
        });
    }
    for paragraph in paragraphs {
        for text in wrap_text(paragraph, columns(BODY_SIZE)) {
            lines.push(Line {
                font: "F1",
                size: BODY_SIZE,
                text: Some(text),
            });
        }
        lines.push(Line {
            font: "F1",
            size: BODY_SIZE,
            text: None,
        });
    }

    let mut pages: Vec<Vec<Operation>> = vec![Vec::new()];
    let mut y = PAGE_HEIGHT - MARGIN;
    for line in &lines {
        if y - line.leading() < MARGIN {
            // Spacing never starts a page.
            if line.text.is_none() {
                continue;
            }
            pages.push(Vec::new());
            y = PAGE_HEIGHT - MARGIN;
        }
        y -= line.leading();
        let Some(text) = &line.text else {
            continue;
        };
        if let Some(ops) = pages.last_mut() {
            ops.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![line.font.into(), line.size.into()]),
                Operation::new("Td", vec![MARGIN.into(), y.into()]),
                Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(text))]),
                Operation::new("ET", vec![]),
            ]);
        }
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let body_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let title_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => body_font, "F2" => title_font },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations }
            .encode()
            .map_err(|e| write_error(target, e))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        kids.push(Object::Reference(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        })));
    }
    let page_count = kids.len() as u32;

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).map_err(|e| write_error(target, e))?;
    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    write_atomic(target, &buffer)?;
    Ok(page_count)
}

fn write_error(target: &Path, error: impl std::fmt::Display) -> PdfError {
    PdfError::WriteError {
        path: target.to_path_buf(),
        reason: error.to_string(),
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, UTF-8 with BOM, otherwise Latin-1.
fn decode_text_string(object: &Object) -> String {
    let Object::String(bytes, _) = object else {
        return String::new();
    };

    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).to_string();
    }
    bytes.iter().map(|&b| b as char).collect()
}
