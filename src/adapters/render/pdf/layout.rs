//! Page geometry, font metrics and the flowing page builder.

use lopdf::content::Operation;
use lopdf::{Object, StringFormat};

use super::writer::win_ansi;

pub(super) const PAGE_WIDTH: f32 = 595.28;
pub(super) const PAGE_HEIGHT: f32 = 841.89;
pub(super) const MARGIN: f32 = 56.69;
pub(super) const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
pub(super) const BODY_SIZE: f32 = 11.0;
pub(super) const LEADING: f32 = 1.4;

/// Bottom edge of the flowing area; the footer sits below it.
const FLOW_BOTTOM: f32 = MARGIN + 18.0;
const PARAGRAPH_GAP: f32 = 6.0;

// ════════════════════════════════════════════════════════════════════════════
// Fonts
// ════════════════════════════════════════════════════════════════════════════

/// The standard-14 faces used by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Font {
    Regular,
    Bold,
    Oblique,
    Mono,
}

impl Font {
    pub(super) const ALL: [Font; 4] = [Font::Regular, Font::Bold, Font::Oblique, Font::Mono];

    pub(super) fn resource(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Oblique => "F3",
            Font::Mono => "F4",
        }
    }

    pub(super) fn base_font(&self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Oblique => "Helvetica-Oblique",
            Font::Mono => "Courier",
        }
    }

    /// Advance width of one WinAnsi byte in 1/1000 em.
    fn glyph_width(&self, byte: u8) -> u16 {
        let table = match self {
            Font::Regular | Font::Oblique => &HELVETICA_WIDTHS,
            Font::Bold => &HELVETICA_BOLD_WIDTHS,
            Font::Mono => return 600,
        };
        match byte {
            32..=126 => table[(byte - 32) as usize],
            _ => 556,
        }
    }
}

/// Width in points of already-encoded text.
pub(super) fn text_width(bytes: &[u8], font: Font, size: f32) -> f32 {
    let units: u32 = bytes.iter().map(|&b| u32::from(font.glyph_width(b))).sum();
    units as f32 * size / 1000.0
}

#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

// ════════════════════════════════════════════════════════════════════════════
// Line breaking
// ════════════════════════════════════════════════════════════════════════════

/// Greedy word wrap. Words wider than `width` are split by character.
pub(super) fn wrap(text: &str, font: Font, size: f32, width: f32) -> Vec<Vec<u8>> {
    let space = text_width(b" ", font, size);
    let mut lines = Vec::new();
    let mut line: Vec<u8> = Vec::new();
    let mut line_width = 0.0;

    for word in text.split_whitespace() {
        for piece in split_long_word(&win_ansi(word), font, size, width) {
            let piece_width = text_width(&piece, font, size);
            if line.is_empty() {
                line_width = piece_width;
                line = piece;
            } else if line_width + space + piece_width <= width {
                line.push(b' ');
                line.extend_from_slice(&piece);
                line_width += space + piece_width;
            } else {
                lines.push(std::mem::take(&mut line));
                line_width = piece_width;
                line = piece;
            }
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn split_long_word(word: &[u8], font: Font, size: f32, width: f32) -> Vec<Vec<u8>> {
    if text_width(word, font, size) <= width {
        return vec![word.to_vec()];
    }
    let mut pieces = Vec::new();
    let mut current = Vec::new();
    for &b in word {
        current.push(b);
        if text_width(&current, font, size) > width && current.len() > 1 {
            current.pop();
            pieces.push(std::mem::replace(&mut current, vec![b]));
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Truncates encoded text with `...` so it fits `width`.
pub(super) fn fit(text: &str, font: Font, size: f32, width: f32) -> Vec<u8> {
    let mut bytes = win_ansi(text);
    if text_width(&bytes, font, size) <= width {
        return bytes;
    }
    let ellipsis = text_width(b"...", font, size);
    while !bytes.is_empty() && text_width(&bytes, font, size) + ellipsis > width {
        bytes.pop();
    }
    bytes.extend_from_slice(b"...");
    bytes
}

/// One `BT ... ET` run placing `bytes` at (x, y).
pub(super) fn text_op(bytes: &[u8], font: Font, size: f32, x: f32, y: f32, word_spacing: f32) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(font.resource().as_bytes().to_vec()), Object::Real(size)]),
        // Tw is text state and outlives ET, so it is always set.
        Operation::new("Tw", vec![Object::Real(word_spacing)]),
        Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
        Operation::new("Tj", vec![Object::String(bytes.to_vec(), StringFormat::Literal)]),
        Operation::new("ET", vec![]),
    ]
}

/// Operator with numeric operands.
pub(super) fn op(operator: &str, operands: &[f32]) -> Operation {
    Operation::new(operator, operands.iter().map(|&v| Object::Real(v)).collect())
}

// ════════════════════════════════════════════════════════════════════════════
// Pages
// ════════════════════════════════════════════════════════════════════════════

/// Structure role of a run of page content.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Tag {
    Heading(u8),
    Paragraph,
    Figure { alt: String },
}

impl Tag {
    /// Standard structure type.
    pub(super) fn structure_type(&self) -> String {
        match self {
            Tag::Heading(level) => format!("H{}", (*level).clamp(1, 6)),
            Tag::Paragraph => "P".to_string(),
            Tag::Figure { .. } => "Figure".to_string(),
        }
    }
}

/// A tagged run of content-stream operators.
#[derive(Debug, Clone)]
pub(super) struct Marked {
    pub tag: Tag,
    pub ops: Vec<Operation>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct Page {
    pub items: Vec<Marked>,
}

impl Page {
    pub(super) fn push(&mut self, tag: Tag, ops: Vec<Operation>) {
        if !ops.is_empty() {
            self.items.push(Marked { tag, ops });
        }
    }
}

/// Where a heading landed: absolute page index and baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Anchor {
    pub page: usize,
    pub y: f32,
}

/// Horizontal alignment of wrapped text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Align {
    Left,
    Justify,
}

/// Flows content top to bottom, starting new pages as needed.
#[derive(Debug)]
pub(super) struct PageFlow {
    pages: Vec<Page>,
    first_index: usize,
    y: f32,
    chars_laid_out: usize,
}

impl PageFlow {
    /// Starts a flow whose first page will sit at absolute `first_index`.
    pub(super) fn new(first_index: usize) -> Self {
        Self {
            pages: vec![Page::default()],
            first_index,
            y: PAGE_HEIGHT - MARGIN,
            chars_laid_out: 0,
        }
    }

    pub(super) fn current_index(&self) -> usize {
        self.first_index + self.pages.len() - 1
    }

    pub(super) fn y(&self) -> f32 {
        self.y
    }

    /// Characters of text placed so far.
    pub(super) fn chars_laid_out(&self) -> usize {
        self.chars_laid_out
    }

    pub(super) fn new_page(&mut self) {
        let current_is_blank = self.pages.last().map(|p| p.items.is_empty()).unwrap_or(false);
        if !current_is_blank {
            self.pages.push(Page::default());
        }
        self.y = PAGE_HEIGHT - MARGIN;
    }

    pub(super) fn ensure_space(&mut self, height: f32) {
        if self.y - height < FLOW_BOTTOM {
            self.new_page();
        }
    }

    pub(super) fn skip(&mut self, height: f32) {
        self.y -= height;
    }

    /// Places raw operators on the current page.
    pub(super) fn place(&mut self, tag: Tag, ops: Vec<Operation>) {
        if let Some(page) = self.pages.last_mut() {
            page.push(tag, ops);
        }
    }

    /// Bold heading sized by level, kept on the same page as two body lines.
    pub(super) fn heading(&mut self, text: &str, level: u8) -> Anchor {
        let size = heading_size(level);
        let lines = wrap(text, Font::Bold, size, CONTENT_WIDTH);
        let line_height = size * 1.25;
        let block = line_height * lines.len() as f32 + 2.0 * BODY_SIZE * LEADING;
        self.skip(if level <= 2 { 10.0 } else { 6.0 });
        self.ensure_space(block);

        let anchor = Anchor {
            page: self.current_index(),
            y: self.y,
        };
        let mut ops = Vec::new();
        for line in &lines {
            self.y -= line_height;
            ops.extend(text_op(line, Font::Bold, size, MARGIN, self.y, 0.0));
        }
        self.y -= 4.0;
        self.chars_laid_out += text.len();
        self.place(Tag::Heading(level), ops);
        anchor
    }

    /// Wrapped paragraph; splits across pages line by line.
    pub(super) fn paragraph(&mut self, text: &str, font: Font, size: f32, indent: f32, align: Align) {
        let width = CONTENT_WIDTH - indent;
        let lines = wrap(text, font, size, width);
        let line_height = size * LEADING;
        let mut ops = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            if self.y - line_height < FLOW_BOTTOM {
                self.place(Tag::Paragraph, std::mem::take(&mut ops));
                self.new_page();
            }
            self.y -= line_height;

            let last = i + 1 == lines.len();
            let spacing = match align {
                Align::Justify if !last => justify_spacing(line, font, size, width),
                _ => 0.0,
            };
            ops.extend(text_op(line, font, size, MARGIN + indent, self.y, spacing));
        }
        self.place(Tag::Paragraph, ops);
        self.y -= PARAGRAPH_GAP;
        self.chars_laid_out += text.len();
    }

    pub(super) fn into_pages(self) -> Vec<Page> {
        self.pages
    }
}

pub(super) fn heading_size(level: u8) -> f32 {
    match level {
        0 | 1 => 20.0,
        2 => 16.0,
        3 => 14.0,
        4 => 12.5,
        _ => 11.5,
    }
}

/// Extra word spacing that stretches `line` to exactly `width`.
fn justify_spacing(line: &[u8], font: Font, size: f32, width: f32) -> f32 {
    let gaps = line.iter().filter(|&&b| b == b' ').count();
    if gaps == 0 {
        return 0.0;
    }
    let slack = width - text_width(line, font, size);
    (slack / gaps as f32).max(0.0)
}
