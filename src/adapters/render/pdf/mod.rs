//! Paginated (PDF) renderer.
//!
//! Page order: cover, table of contents, section body, one page per graph
//! figure, references. With tagging enabled every run of content is marked
//! and linked into a structure tree (`Document` → `H1`..`H6` / `P` /
//! `Figure`), page numbers are artifacts, and the catalog carries `/Lang`,
//! `/MarkInfo` and `/StructTreeRoot`.

mod figure;
mod layout;
mod writer;

use lopdf::content::Operation;
use lopdf::{dictionary, Dictionary, Object, ObjectId};
use sha2::{Digest, Sha256};

use crate::adapters::memory::MemoryTracker;
use crate::domain::document::{Document, Reference, Section};
use crate::domain::export::{GenerationOptions, MemoryThresholds};

use self::figure::Area;
use self::layout::{
    fit, heading_size, text_op, text_width, wrap, Align, Anchor, Font, Page, PageFlow, Tag,
    BODY_SIZE, CONTENT_WIDTH, MARGIN, PAGE_HEIGHT, PAGE_WIDTH,
};
use self::writer::{text_string, win_ansi, PdfWriter};
use super::markdown::effective_level;
use super::RenderError;

const TOC_ENTRIES_PER_PAGE: usize = 36;
const TOC_LINE_HEIGHT: f32 = 18.0;
const COVER_TITLE_SIZE: f32 = 28.0;

/// Body characters laid out between memory samples.
const MEMORY_SAMPLE_CHARS: usize = 64 * 1024;

/// Renders a document into a PDF file.
///
/// Stateless; every call reads its settings from the generation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PdfRenderer;

/// Node of the bookmark tree.
#[derive(Debug, Clone)]
struct OutlineEntry {
    title: String,
    anchor: Anchor,
    children: Vec<OutlineEntry>,
}

/// Flattened section list for the table of contents.
#[derive(Debug, Clone)]
struct TocEntry {
    title: String,
    depth: usize,
}

impl PdfRenderer {
    pub fn render(&self, document: &Document, options: &GenerationOptions) -> Result<Vec<u8>, RenderError> {
        let mut toc = Vec::new();
        flatten_sections(document.sections(), 0, &mut toc);
        let toc_pages = ((toc.len() + TOC_ENTRIES_PER_PAGE - 1) / TOC_ENTRIES_PER_PAGE).max(1);

        let mut body = BodyPass::new(1 + toc_pages, options.memory);
        let mut outline: Vec<OutlineEntry> = document
            .sections()
            .iter()
            .map(|section| body.section(section, 0))
            .collect();

        if options.include_graphs {
            for (i, graph) in document.graphs().iter().enumerate() {
                body.flow.new_page();
                let title = format!("Figure {}: {}", i + 1, graph.id);
                let anchor = body.flow.heading(&title, 2);
                let area = Area {
                    x: MARGIN,
                    y: MARGIN + 24.0,
                    width: CONTENT_WIDTH,
                    height: (body.flow.y() - MARGIN - 48.0).max(0.0),
                };
                body.flow.place(
                    Tag::Figure {
                        alt: figure::alt_text(graph),
                    },
                    figure::draw(graph, area),
                );
                outline.push(OutlineEntry {
                    title,
                    anchor,
                    children: Vec::new(),
                });
            }
        }

        if !document.references().is_empty() {
            body.flow.new_page();
            let anchor = body.flow.heading("References", 1);
            for (i, reference) in document.references().iter().enumerate() {
                body.flow.paragraph(
                    &format!("[{}] {}", i + 1, reference_line(reference)),
                    Font::Regular,
                    BODY_SIZE,
                    0.0,
                    Align::Left,
                );
            }
            outline.push(OutlineEntry {
                title: "References".to_string(),
                anchor,
                children: Vec::new(),
            });
        }

        let (anchors, body_pages, memory) = body.finish();
        tracing::debug!(
            document_id = %document.metadata().id,
            peak_bytes = memory,
            body_pages = body_pages.len(),
            "PDF layout complete"
        );

        let mut pages = Vec::with_capacity(1 + toc_pages + body_pages.len());
        pages.push(cover_page(document));
        pages.extend(toc_pages_for(&toc, &anchors, toc_pages));
        pages.extend(body_pages);

        self.assemble(document, pages, &outline, options)
    }

    fn assemble(
        &self,
        document: &Document,
        pages: Vec<Page>,
        outline: &[OutlineEntry],
        options: &GenerationOptions,
    ) -> Result<Vec<u8>, RenderError> {
        let accessibility = &options.accessibility;
        let tagged = accessibility.tagged;
        let page_count = pages.len();
        let mut w = PdfWriter::new();
        let catalog = w.reserve();
        let pages_root = w.reserve();
        let page_ids: Vec<ObjectId> = pages.iter().map(|_| w.reserve()).collect();

        let mut fonts = Dictionary::new();
        for font in Font::ALL {
            let id = w.add(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(font.resource(), Object::Reference(id));
        }
        let resources = w.add(dictionary! { "Font" => fonts });

        let structure = if tagged {
            Some((w.reserve(), w.reserve()))
        } else {
            None
        };
        let mut elements: Vec<Object> = Vec::new();
        let mut parent_tree: Vec<Object> = Vec::with_capacity(page_count * 2);

        for (index, page) in pages.into_iter().enumerate() {
            let mut ops: Vec<Operation> = Vec::new();
            let mut marked: Vec<Object> = Vec::new();

            for item in page.items {
                let Some((_, doc_elem)) = structure else {
                    ops.extend(item.ops);
                    continue;
                };
                let kind = item.tag.structure_type();
                let mcid = marked.len() as i64;
                ops.push(Operation::new(
                    "BDC",
                    vec![
                        Object::Name(kind.as_bytes().to_vec()),
                        Object::Dictionary(dictionary! { "MCID" => mcid }),
                    ],
                ));
                ops.extend(item.ops);
                ops.push(Operation::new("EMC", vec![]));

                let mut elem = dictionary! {
                    "Type" => "StructElem",
                    "S" => Object::Name(kind.into_bytes()),
                    "P" => Object::Reference(doc_elem),
                    "Pg" => Object::Reference(page_ids[index]),
                    "K" => mcid,
                };
                if let Tag::Figure { alt } = &item.tag {
                    elem.set("Alt", text_string(alt));
                }
                let id = w.add(elem);
                marked.push(Object::Reference(id));
                elements.push(Object::Reference(id));
            }

            // The cover carries no page number.
            if index > 0 {
                let label = win_ansi(&format!("{} / {}", index + 1, page_count));
                let width = text_width(&label, Font::Regular, 9.0);
                let number = text_op(&label, Font::Regular, 9.0, (PAGE_WIDTH - width) / 2.0, MARGIN / 2.0, 0.0);
                if tagged {
                    ops.push(Operation::new(
                        "BDC",
                        vec![
                            Object::Name(b"Artifact".to_vec()),
                            Object::Dictionary(dictionary! { "Type" => "Pagination" }),
                        ],
                    ));
                    ops.extend(number);
                    ops.push(Operation::new("EMC", vec![]));
                } else {
                    ops.extend(number);
                }
            }

            let contents = w.add_content(ops, &options.compression)?;
            let mut dict = dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_root),
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(PAGE_WIDTH),
                    Object::Real(PAGE_HEIGHT),
                ],
                "Resources" => Object::Reference(resources),
                "Contents" => Object::Reference(contents),
            };
            if tagged {
                dict.set("StructParents", index as i64);
                dict.set("Tabs", "S");
            }
            w.set(page_ids[index], dict);
            parent_tree.push(Object::Integer(index as i64));
            parent_tree.push(Object::Array(marked));
        }

        w.set(
            pages_root,
            dictionary! {
                "Type" => "Pages",
                "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
                "Count" => page_count as i64,
            },
        );

        let language = Object::string_literal(win_ansi(&accessibility.language));

        if let Some((root, doc_elem)) = structure {
            let tree = w.add(dictionary! { "Nums" => parent_tree });
            w.set(
                doc_elem,
                dictionary! {
                    "Type" => "StructElem",
                    "S" => Object::Name(accessibility.document_role.as_bytes().to_vec()),
                    "P" => Object::Reference(root),
                    "K" => elements,
                    "Lang" => language.clone(),
                },
            );
            w.set(
                root,
                dictionary! {
                    "Type" => "StructTreeRoot",
                    "K" => Object::Reference(doc_elem),
                    "ParentTree" => Object::Reference(tree),
                    "ParentTreeNextKey" => page_count as i64,
                },
            );
        }

        let outlines = if outline.is_empty() {
            None
        } else {
            let outlines = w.reserve();
            let mut dict = dictionary! { "Type" => "Outlines" };
            if let Some((first, last, count)) = write_outline(&mut w, outline, outlines, &page_ids) {
                dict.set("First", Object::Reference(first));
                dict.set("Last", Object::Reference(last));
                dict.set("Count", count as i64);
            }
            w.set(outlines, dict);
            Some(outlines)
        };

        let metadata = document.metadata();
        let info = w.add(dictionary! {
            "Title" => text_string(&metadata.title),
            "Author" => text_string(&metadata.author),
            "Subject" => text_string(&format!("{} v{}", metadata.id, metadata.version)),
            "Keywords" => text_string(&metadata.tags.join(", ")),
            "Creator" => text_string(env!("CARGO_PKG_NAME")),
            "Producer" => text_string(&format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))),
            "CreationDate" => Object::string_literal(format!("D:{}", chrono::Utc::now().format("%Y%m%d%H%M%SZ"))),
        });

        let mut root = dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_root),
            "Lang" => language,
        };
        if let Some(outlines) = outlines {
            root.set("Outlines", Object::Reference(outlines));
            root.set("PageMode", "UseOutlines");
        }
        if accessibility.display_title {
            root.set("ViewerPreferences", dictionary! { "DisplayDocTitle" => true });
        }
        if let Some((struct_root, _)) = structure {
            root.set("MarkInfo", dictionary! { "Marked" => true });
            root.set("StructTreeRoot", Object::Reference(struct_root));
        }
        w.set(catalog, root);

        w.finish(catalog, info, file_id(document))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Body pass
// ════════════════════════════════════════════════════════════════════════════

struct BodyPass {
    flow: PageFlow,
    anchors: Vec<Anchor>,
    memory: MemoryTracker,
    next_sample: usize,
}

impl BodyPass {
    fn new(first_page: usize, thresholds: MemoryThresholds) -> Self {
        Self {
            flow: PageFlow::new(first_page),
            anchors: Vec::new(),
            memory: MemoryTracker::new(thresholds),
            next_sample: MEMORY_SAMPLE_CHARS,
        }
    }

    /// Lays out a section and its children in pre-order, matching the
    /// order of the table of contents.
    fn section(&mut self, section: &Section, parent_level: u8) -> OutlineEntry {
        let level = effective_level(section, parent_level);
        let anchor = self.flow.heading(&section.title, level);
        self.anchors.push(anchor);
        self.body_text(&section.content);

        let children = section
            .subsections
            .iter()
            .map(|child| self.section(child, level))
            .collect();
        OutlineEntry {
            title: section.title.clone(),
            anchor,
            children,
        }
    }

    fn body_text(&mut self, content: &str) {
        let mut paragraph = String::new();
        let mut in_code = false;

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("```") {
                self.flush(&mut paragraph);
                in_code = !in_code;
                continue;
            }
            if in_code {
                self.flow.paragraph(line, Font::Mono, 9.5, 12.0, Align::Left);
                continue;
            }
            if trimmed.is_empty() {
                self.flush(&mut paragraph);
            } else if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
                self.flush(&mut paragraph);
                self.flow
                    .paragraph(&format!("\u{2022} {}", item), Font::Regular, BODY_SIZE, 12.0, Align::Left);
            } else if let Some(quote) = trimmed.strip_prefix('>') {
                self.flush(&mut paragraph);
                self.flow.paragraph(quote.trim(), Font::Oblique, BODY_SIZE, 18.0, Align::Left);
            } else if is_numbered(trimmed) {
                self.flush(&mut paragraph);
                self.flow.paragraph(trimmed, Font::Regular, BODY_SIZE, 12.0, Align::Left);
            } else {
                if !paragraph.is_empty() {
                    paragraph.push(' ');
                }
                paragraph.push_str(trimmed);
            }
            self.sample_memory();
        }
        self.flush(&mut paragraph);
    }

    fn flush(&mut self, paragraph: &mut String) {
        if !paragraph.is_empty() {
            self.flow
                .paragraph(paragraph, Font::Regular, BODY_SIZE, 0.0, Align::Justify);
            paragraph.clear();
        }
    }

    fn sample_memory(&mut self) {
        if self.flow.chars_laid_out() >= self.next_sample {
            self.memory.sample();
            self.next_sample = self.flow.chars_laid_out() + MEMORY_SAMPLE_CHARS;
        }
    }

    fn finish(self) -> (Vec<Anchor>, Vec<Page>, u64) {
        let peak = self.memory.peak_bytes();
        (self.anchors, self.flow.into_pages(), peak)
    }
}

fn is_numbered(line: &str) -> bool {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(". ")
}

fn flatten_sections(sections: &[Section], depth: usize, out: &mut Vec<TocEntry>) {
    for section in sections {
        out.push(TocEntry {
            title: section.title.clone(),
            depth,
        });
        flatten_sections(&section.subsections, depth + 1, out);
    }
}

fn reference_line(reference: &Reference) -> String {
    let mut line = String::new();
    if !reference.authors.is_empty() {
        line.push_str(&reference.authors.join(", "));
        line.push_str(". ");
    }
    line.push_str(&reference.title);
    line.push('.');
    if let Some(url) = reference.url.as_deref().filter(|u| !u.is_empty()) {
        line.push(' ');
        line.push_str(url);
    }
    line.push_str(&format!(" ({})", reference.reference_type.label()));
    line
}

// ════════════════════════════════════════════════════════════════════════════
// Front matter pages
// ════════════════════════════════════════════════════════════════════════════

fn cover_page(document: &Document) -> Page {
    let metadata = document.metadata();
    let mut page = Page::default();
    let mut y = PAGE_HEIGHT * 0.62;

    let mut title_ops = Vec::new();
    for line in wrap(&metadata.title, Font::Bold, COVER_TITLE_SIZE, CONTENT_WIDTH) {
        let width = text_width(&line, Font::Bold, COVER_TITLE_SIZE);
        title_ops.extend(text_op(&line, Font::Bold, COVER_TITLE_SIZE, (PAGE_WIDTH - width) / 2.0, y, 0.0));
        y -= COVER_TITLE_SIZE * 1.2;
    }
    page.push(Tag::Heading(1), title_ops);
    y -= 24.0;

    let details = [
        metadata.author.clone(),
        metadata.updated_at.date_string(),
        format!("Version {}", metadata.version),
    ];
    for detail in details.iter().filter(|d| !d.is_empty()) {
        let bytes = fit(detail, Font::Regular, 14.0, CONTENT_WIDTH);
        let width = text_width(&bytes, Font::Regular, 14.0);
        page.push(
            Tag::Paragraph,
            text_op(&bytes, Font::Regular, 14.0, (PAGE_WIDTH - width) / 2.0, y, 0.0),
        );
        y -= 22.0;
    }
    page
}

/// Exactly `count` pages listing every section with its page number.
fn toc_pages_for(entries: &[TocEntry], anchors: &[Anchor], count: usize) -> Vec<Page> {
    let mut pages = vec![Page::default(); count];
    let title_size = heading_size(1);
    let mut y = PAGE_HEIGHT - MARGIN - title_size * 1.25;
    if let Some(first) = pages.first_mut() {
        first.push(
            Tag::Heading(1),
            text_op(&win_ansi("Contents"), Font::Bold, title_size, MARGIN, y, 0.0),
        );
    }
    y -= 16.0;

    let number_right = PAGE_WIDTH - MARGIN;
    let dot_width = text_width(b".", Font::Regular, BODY_SIZE);
    for (i, entry) in entries.iter().enumerate() {
        let page_index = i / TOC_ENTRIES_PER_PAGE;
        if i > 0 && i % TOC_ENTRIES_PER_PAGE == 0 {
            y = PAGE_HEIGHT - MARGIN - 16.0;
        }
        y -= TOC_LINE_HEIGHT;

        let indent = MARGIN + 14.0 * entry.depth.min(5) as f32;
        let number = win_ansi(
            &anchors
                .get(i)
                .map(|a| (a.page + 1).to_string())
                .unwrap_or_default(),
        );
        let number_width = text_width(&number, Font::Regular, BODY_SIZE);
        let title = fit(&entry.title, Font::Regular, BODY_SIZE, number_right - indent - number_width - 24.0);
        let title_width = text_width(&title, Font::Regular, BODY_SIZE);
        let gap = number_right - number_width - indent - title_width - 8.0;
        let dots = if gap > 0.0 { (gap / dot_width) as usize } else { 0 };

        let mut line = title;
        line.push(b' ');
        line.extend(std::iter::repeat(b'.').take(dots));
        let mut ops = text_op(&line, Font::Regular, BODY_SIZE, indent, y, 0.0);
        ops.extend(text_op(&number, Font::Regular, BODY_SIZE, number_right - number_width, y, 0.0));

        if let Some(page) = pages.get_mut(page_index) {
            page.push(Tag::Paragraph, ops);
        }
    }
    pages
}

// ════════════════════════════════════════════════════════════════════════════
// Objects
// ════════════════════════════════════════════════════════════════════════════

/// Writes one level of the bookmark tree. Returns first, last and the
/// number of visible descendants.
fn write_outline(
    w: &mut PdfWriter,
    entries: &[OutlineEntry],
    parent: ObjectId,
    page_ids: &[ObjectId],
) -> Option<(ObjectId, ObjectId, usize)> {
    if entries.is_empty() {
        return None;
    }
    let ids: Vec<ObjectId> = entries.iter().map(|_| w.reserve()).collect();
    let mut total = 0;

    for (i, entry) in entries.iter().enumerate() {
        let mut dict = dictionary! {
            "Title" => text_string(&entry.title),
            "Parent" => Object::Reference(parent),
        };
        if i > 0 {
            dict.set("Prev", Object::Reference(ids[i - 1]));
        }
        if let Some(next) = ids.get(i + 1) {
            dict.set("Next", Object::Reference(*next));
        }
        if let Some((first, last, count)) = write_outline(w, &entry.children, ids[i], page_ids) {
            dict.set("First", Object::Reference(first));
            dict.set("Last", Object::Reference(last));
            dict.set("Count", count as i64);
            total += count;
        }
        if let Some(page) = page_ids.get(entry.anchor.page) {
            dict.set(
                "Dest",
                vec![
                    Object::Reference(*page),
                    Object::Name(b"XYZ".to_vec()),
                    Object::Integer(0),
                    Object::Real(entry.anchor.y.min(PAGE_HEIGHT)),
                    Object::Integer(0),
                ],
            );
        }
        w.set(ids[i], dict);
        total += 1;
    }
    Some((ids[0], ids[ids.len() - 1], total))
}

/// File identifier derived from the document identity.
fn file_id(document: &Document) -> Vec<u8> {
    Sha256::digest(document.cache_key().as_bytes())[..16].to_vec()
}
