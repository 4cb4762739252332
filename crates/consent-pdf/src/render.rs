//! Text to PDF rendering
//!
//! Builds the document object graph by hand with lopdf: one shared Type1
//! font, one content stream per page, a single Pages node and the catalog.

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::error::PdfError;
use crate::layout::{wrap_text, TextLayout};

/// Output of a render: the serialized PDF plus what went into it
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub line_count: usize,
}

/// Render plain text into a paginated PDF
///
/// The text is wrapped with [`wrap_text`], then laid out top to bottom. A new
/// page starts whenever the cursor would fall below the bottom margin.
pub fn render_text(text: &str, layout: &TextLayout) -> Result<RenderedPdf, PdfError> {
    layout.validate()?;

    let lines = wrap_text(text, layout.wrap_width);
    let pages: Vec<&[String]> = lines.chunks(layout.lines_per_page()).collect();

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(layout.font.as_bytes().to_vec())),
        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
    ]));

    let mut page_ids = Vec::with_capacity(pages.len());
    for page_lines in &pages {
        let content = page_content(page_lines, layout);
        let encoded = content
            .encode()
            .map_err(|e| PdfError::RenderError(format!("Content encoding failed: {}", e)))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));
        page_ids.push(doc.add_object(page_dictionary(pages_id, content_id, font_id, layout)));
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(page_ids.len() as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| PdfError::RenderError(format!("Save failed: {}", e)))?;

    Ok(RenderedPdf {
        bytes,
        page_count: page_ids.len(),
        line_count: lines.len(),
    })
}

/// Render text and write the PDF to `path`, creating parent directories
pub fn write_text_pdf(
    text: &str,
    layout: &TextLayout,
    path: &Path,
) -> Result<RenderedPdf, PdfError> {
    let rendered = render_text(text, layout)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &rendered.bytes)?;
    Ok(rendered)
}

fn page_content(lines: &[String], layout: &TextLayout) -> Content {
    let mut operations = Vec::with_capacity(lines.len() * 2 + 3);
    operations.push(Operation::new("BT", vec![]));
    operations.push(Operation::new(
        "Tf",
        vec![Object::Name(b"F1".to_vec()), Object::Real(layout.font_size)],
    ));

    let mut y = layout.top();
    for line in lines {
        // Absolute text matrix per line keeps positions independent of rounding
        operations.push(Operation::new(
            "Tm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                Object::Real(layout.margin),
                Object::Real(y),
            ],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(line), StringFormat::Literal)],
        ));
        y -= layout.line_height;
    }

    operations.push(Operation::new("ET", vec![]));
    Content { operations }
}

fn page_dictionary(
    pages_id: ObjectId,
    content_id: ObjectId,
    font_id: ObjectId,
    layout: &TextLayout,
) -> Dictionary {
    let fonts = Dictionary::from_iter(vec![("F1", Object::Reference(font_id))]);
    let resources = Dictionary::from_iter(vec![("Font", Object::Dictionary(fonts))]);

    Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(layout.page_width),
                Object::Real(layout.page_height),
            ]),
        ),
        ("Resources", Object::Dictionary(resources)),
        ("Contents", Object::Reference(content_id)),
    ])
}

/// Encode a line for a WinAnsiEncoding font. Unmappable characters become `?`.
pub fn encode_win_ansi(line: &str) -> Vec<u8> {
    line.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '\t' => b' ',
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}
