//! Page geometry and line wrapping
//!
//! Wrapping is by character count, not by font metrics: a line holds at most
//! `wrap_width` characters regardless of how wide the glyphs really are.

use crate::error::PdfError;

/// A4 width in PDF points
pub const A4_WIDTH: f32 = 595.28;
/// A4 height in PDF points
pub const A4_HEIGHT: f32 = 841.89;

/// Fixed page layout used when rendering text
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub page_width: f32,
    pub page_height: f32,
    /// Margin applied on every side
    pub margin: f32,
    /// Base-14 font name, e.g. "Helvetica"
    pub font: String,
    pub font_size: f32,
    /// Vertical advance between baselines
    pub line_height: f32,
    /// Maximum characters per line
    pub wrap_width: usize,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            page_width: A4_WIDTH,
            page_height: A4_HEIGHT,
            margin: 50.0,
            font: "Helvetica".to_string(),
            font_size: 11.0,
            line_height: 14.0,
            wrap_width: 100,
        }
    }
}

impl TextLayout {
    /// Check that the geometry leaves room for at least one line per page
    pub fn validate(&self) -> Result<(), PdfError> {
        if self.page_width <= 0.0 || self.page_height <= 0.0 {
            return Err(PdfError::InvalidLayout(format!(
                "page size must be positive, got {}x{}",
                self.page_width, self.page_height
            )));
        }
        if self.margin < 0.0 || self.margin * 2.0 >= self.page_height {
            return Err(PdfError::InvalidLayout(format!(
                "margin {} does not fit a page of height {}",
                self.margin, self.page_height
            )));
        }
        if self.font_size <= 0.0 || self.line_height <= 0.0 {
            return Err(PdfError::InvalidLayout(
                "font size and line height must be positive".into(),
            ));
        }
        if self.wrap_width == 0 {
            return Err(PdfError::InvalidLayout("wrap width must be at least 1".into()));
        }
        if self.font.is_empty() {
            return Err(PdfError::InvalidLayout("font name is empty".into()));
        }
        Ok(())
    }

    /// Baseline of the first line on a page
    pub fn top(&self) -> f32 {
        self.page_height - self.margin
    }

    /// Number of lines that fit before the cursor drops below the bottom margin
    pub fn lines_per_page(&self) -> usize {
        let usable = f64::from(self.top()) - f64::from(self.margin);
        (usable / f64::from(self.line_height)).floor() as usize + 1
    }
}

/// Wrap text into lines of at most `width` characters.
///
/// Paragraphs are separated by `\n`. Runs of whitespace collapse to a single
/// space, words longer than `width` are split, and an empty paragraph keeps
/// its place as an empty line.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    text.split('\n')
        .flat_map(|paragraph| wrap_paragraph(paragraph.trim_end_matches('\r'), width))
        .collect()
}

/// Greedy wrap of one paragraph. Interior whitespace runs become one space.
fn wrap_paragraph(paragraph: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in paragraph.split_whitespace() {
        let mut rest = word;
        loop {
            let rest_len = rest.chars().count();
            if current_len == 0 {
                if rest_len <= width {
                    current.push_str(rest);
                    current_len = rest_len;
                    break;
                }
                // Word longer than a full line: hard break it
                let split = char_boundary(rest, width);
                lines.push(rest[..split].to_string());
                rest = &rest[split..];
            } else if current_len + 1 + rest_len <= width {
                current.push(' ');
                current.push_str(rest);
                current_len += 1 + rest_len;
                break;
            } else {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }

    lines
}

/// Byte offset of the `n`th character
fn char_boundary(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}
