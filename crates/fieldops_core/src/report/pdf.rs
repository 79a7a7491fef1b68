//! Minimal PDF page writer on top of `lopdf`.
//!
//! Coordinates passed in are measured from the top-left corner of an A4
//! page, in points. Text is drawn in the standard Helvetica faces, so only
//! printable ASCII survives; anything else is replaced with `?`.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;

pub(crate) const PAGE_WIDTH: f32 = 595.0;
pub(crate) const PAGE_HEIGHT: f32 = 842.0;

/// A JPEG ready to embed.
#[derive(Debug, Clone)]
pub(crate) struct JpegImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Default)]
struct Page {
    ops: Vec<Operation>,
    links: Vec<([f32; 4], String)>,
}

pub(crate) struct PdfWriter {
    doc: Document,
    pages: Vec<Page>,
    images: HashMap<String, (String, ObjectId)>,
}

pub(crate) fn sanitize_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '?',
        })
        .collect()
}

/// Approximate Helvetica advance width in points.
pub(crate) fn text_width(text: &str, size: f32) -> f32 {
    text.chars()
        .map(|c| match c {
            'i' | 'j' | 'l' | '.' | ',' | '\'' | '!' | '|' | ':' | ';' => 0.28,
            'f' | 't' | 'r' | ' ' | '(' | ')' | '-' | '/' => 0.35,
            'm' | 'w' | 'M' | 'W' | '@' => 0.85,
            c if c.is_ascii_uppercase() => 0.68,
            c if c.is_ascii_digit() => 0.56,
            _ => 0.53,
        })
        .sum::<f32>()
        * size
}

/// Greedy word wrap to a width in points. Long words are split.
pub(crate) fn wrap(text: &str, size: f32, max_width: f32) -> Vec<String> {
    let text = sanitize_text(text);
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", line, word)
        };
        if text_width(&candidate, size) <= max_width {
            line = candidate;
            continue;
        }
        if !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        let mut chunk = String::new();
        for c in word.chars() {
            chunk.push(c);
            if text_width(&chunk, size) > max_width && chunk.len() > 1 {
                chunk.pop();
                lines.push(std::mem::take(&mut chunk));
                chunk.push(c);
            }
        }
        line = chunk;
    }
    if !line.is_empty() {
        lines.push(line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn y(top: f32) -> f32 {
    PAGE_HEIGHT - top
}

impl PdfWriter {
    pub(crate) fn new() -> Self {
        Self {
            doc: Document::with_version("1.5"),
            pages: vec![Page::default()],
            images: HashMap::new(),
        }
    }

    pub(crate) fn new_page(&mut self) {
        self.pages.push(Page::default());
    }

    pub(crate) fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        // `pages` always holds at least one page.
        let last = self.pages.len() - 1;
        &mut self.pages[last].ops
    }

    /// Draw text with its baseline at `top`.
    pub(crate) fn text(&mut self, x: f32, top: f32, size: f32, bold: bool, text: &str) {
        self.text_on(None, x, top, size, bold, text);
    }

    /// Draw text on a specific page (zero-based), or the current one.
    pub(crate) fn text_on(
        &mut self,
        page: Option<usize>,
        x: f32,
        top: f32,
        size: f32,
        bold: bool,
        text: &str,
    ) {
        let font = if bold { "F2" } else { "F1" };
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), size.into()]),
            Operation::new("Td", vec![x.into(), y(top).into()]),
            Operation::new("Tj", vec![Object::string_literal(sanitize_text(text))]),
            Operation::new("ET", vec![]),
        ];
        match page.and_then(|p| self.pages.get_mut(p)) {
            Some(target) => target.ops.extend(ops),
            None => self.ops().extend(ops),
        }
    }

    pub(crate) fn line(&mut self, x1: f32, top1: f32, x2: f32, top2: f32, width: f32) {
        self.ops().extend([
            Operation::new("w", vec![width.into()]),
            Operation::new("m", vec![x1.into(), y(top1).into()]),
            Operation::new("l", vec![x2.into(), y(top2).into()]),
            Operation::new("S", vec![]),
        ]);
    }

    /// Filled rectangle in a gray level (0 black, 1 white).
    pub(crate) fn fill_rect(&mut self, x: f32, top: f32, w: f32, h: f32, gray: f32) {
        self.ops().extend([
            Operation::new("q", vec![]),
            Operation::new("g", vec![gray.into()]),
            Operation::new("re", vec![x.into(), y(top + h).into(), w.into(), h.into()]),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    pub(crate) fn stroke_rect(&mut self, x: f32, top: f32, w: f32, h: f32) {
        self.ops().extend([
            Operation::new("w", vec![0.5f32.into()]),
            Operation::new("re", vec![x.into(), y(top + h).into(), w.into(), h.into()]),
            Operation::new("S", vec![]),
        ]);
    }

    /// A white "play" triangle centered in a box.
    pub(crate) fn play_glyph(&mut self, x: f32, top: f32, w: f32, h: f32) {
        let cx = x + w / 2.0;
        let cy = top + h / 2.0;
        let r = w.min(h) / 4.0;
        self.ops().extend([
            Operation::new("q", vec![]),
            Operation::new("g", vec![1.0f32.into()]),
            Operation::new("m", vec![(cx - r * 0.7).into(), y(cy - r).into()]),
            Operation::new("l", vec![(cx + r).into(), y(cy).into()]),
            Operation::new("l", vec![(cx - r * 0.7).into(), y(cy + r).into()]),
            Operation::new("h", vec![]),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    /// Register a JPEG once under `key` and return its resource name.
    pub(crate) fn register_jpeg(&mut self, key: &str, image: &JpegImage) -> String {
        if let Some((name, _)) = self.images.get(key) {
            return name.clone();
        }
        let name = format!("Im{}", self.images.len() + 1);
        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.width),
                "Height" => i64::from(image.height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            image.bytes.clone(),
        );
        stream.allows_compression = false;
        let id = self.doc.add_object(stream);
        self.images.insert(key.to_string(), (name.clone(), id));
        name
    }

    /// Draw a registered image into a box.
    pub(crate) fn image(&mut self, name: &str, x: f32, top: f32, w: f32, h: f32) {
        self.ops().extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![w.into(), 0.into(), 0.into(), h.into(), x.into(), y(top + h).into()],
            ),
            Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
    }

    /// Make a box on the current page open `url` when clicked.
    pub(crate) fn link(&mut self, x: f32, top: f32, w: f32, h: f32, url: &str) {
        let last = self.pages.len() - 1;
        self.pages[last]
            .links
            .push(([x, y(top + h), x + w, y(top)], url.to_string()));
    }

    /// Assemble the document.
    pub(crate) fn finish(mut self) -> Result<Vec<u8>, String> {
        let pages_id = self.doc.new_object_id();
        let regular = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut xobjects = Dictionary::new();
        for (name, id) in self.images.values() {
            xobjects.set(name.as_bytes().to_vec(), Object::Reference(*id));
        }
        let resources_id = self.doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular,
                "F2" => bold,
            },
            "XObject" => xobjects,
        });

        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());
        for page in std::mem::take(&mut self.pages) {
            let content = Content {
                operations: page.ops,
            };
            let encoded = content.encode().map_err(|e| e.to_string())?;
            let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));

            let annots: Vec<Object> = page
                .links
                .into_iter()
                .map(|(rect, url)| {
                    let annot = self.doc.add_object(dictionary! {
                        "Type" => "Annot",
                        "Subtype" => "Link",
                        "Rect" => rect.iter().map(|v| Object::from(*v)).collect::<Vec<_>>(),
                        "Border" => vec![0.into(), 0.into(), 0.into()],
                        "A" => dictionary! {
                            "S" => "URI",
                            "URI" => Object::string_literal(url),
                        },
                    });
                    Object::Reference(annot)
                })
                .collect();

            let page_id = self.doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "Annots" => annots,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        self.doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        self.doc.save_to(&mut out).map_err(|e| e.to_string())?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap("the quick brown fox jumps over the lazy dog", 10.0, 80.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| text_width(l, 10.0) <= 80.0));
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let lines = wrap(&"x".repeat(100), 10.0, 50.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat().len(), 100);
    }

    #[test]
    fn test_sanitize_replaces_non_ascii() {
        assert_eq!(sanitize_text("Café\nok"), "Caf? ok");
    }

    #[test]
    fn test_empty_writer_produces_loadable_pdf() {
        let mut writer = PdfWriter::new();
        writer.text(40.0, 60.0, 12.0, true, "Hello (world)");
        writer.link(40.0, 40.0, 100.0, 20.0, "https://example.com");
        let bytes = writer.finish().unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
