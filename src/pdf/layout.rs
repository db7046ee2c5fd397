use crate::fonts::{FontId, Typesetter};
use crate::model::{Color, TextAlign};

use super::record::DrawOp;

#[derive(Clone, Debug)]
pub(crate) struct WordChunk {
    pub(crate) text: String,
    pub(crate) x_offset: f32, // x relative to line start
    pub(crate) width: f32,
}

#[derive(Clone, Debug)]
pub(crate) struct TextLine {
    pub(crate) chunks: Vec<WordChunk>,
    pub(crate) total_width: f32,
}

impl TextLine {
    /// The line as one string, with spaces only where the source had them.
    pub(crate) fn text(&self) -> String {
        let mut out = String::new();
        let mut end = 0.0f32;
        for chunk in &self.chunks {
            if !out.is_empty() && chunk.x_offset > end + 0.01 {
                out.push(' ');
            }
            out.push_str(&chunk.text);
            end = chunk.x_offset + chunk.width;
        }
        out
    }
}

/// Characters that may break anywhere: CJK ideographs, kana, hangul and fullwidth forms.
fn breaks_anywhere(ch: char) -> bool {
    matches!(ch as u32,
        0x2E80..=0x9FFF | 0xAC00..=0xD7AF | 0xF900..=0xFAFF | 0xFF00..=0xFFEF | 0x20000..=0x2FA1F)
}

/// Split on whitespace, and additionally around every CJK character.
/// The flag says whether whitespace preceded the token.
fn tokens(text: &str) -> Vec<(String, bool)> {
    let mut out: Vec<(String, bool)> = Vec::new();
    let mut current = String::new();
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !current.is_empty() {
                out.push((std::mem::take(&mut current), pending_space));
                pending_space = false;
            }
            pending_space = true;
        } else if breaks_anywhere(ch) {
            if !current.is_empty() {
                out.push((std::mem::take(&mut current), pending_space));
                pending_space = false;
            }
            out.push((ch.to_string(), pending_space));
            pending_space = false;
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        out.push((current, pending_space));
    }
    out
}

fn finish_line(chunks: &mut Vec<WordChunk>) -> TextLine {
    let total_width = chunks.last().map(|c| c.x_offset + c.width).unwrap_or(0.0);
    TextLine {
        chunks: std::mem::take(chunks),
        total_width,
    }
}

/// Break a word wider than `max_width` into pieces that fit, one char at minimum.
fn split_long_word(ts: &dyn Typesetter, font: FontId, size: f32, word: &str, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        current.push(ch);
        if current.chars().count() > 1 && ts.text_width(font, size, &current) > max_width {
            current.pop();
            pieces.push(std::mem::take(&mut current));
            current.push(ch);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Wrap `text` into lines no wider than `max_width`. Explicit newlines always
/// break; an empty input still yields one (empty) line.
pub(crate) fn wrap_text(
    ts: &dyn Typesetter,
    font: FontId,
    size: f32,
    text: &str,
    max_width: f32,
) -> Vec<TextLine> {
    let space_w = ts.text_width(font, size, " ");
    let mut lines = Vec::new();
    for hard_line in text.split('\n') {
        let mut chunks: Vec<WordChunk> = Vec::new();
        let mut current_x = 0.0f32;
        for (word, spaced) in tokens(hard_line) {
            let ww = ts.text_width(font, size, &word);
            let pieces = if ww > max_width {
                split_long_word(ts, font, size, &word, max_width)
            } else {
                vec![word]
            };
            for (i, piece) in pieces.into_iter().enumerate() {
                let pw = ts.text_width(font, size, &piece);
                let need_space = !chunks.is_empty() && spaced && i == 0;
                let proposed_x = if need_space { current_x + space_w } else { current_x };
                if !chunks.is_empty() && proposed_x + pw > max_width {
                    lines.push(finish_line(&mut chunks));
                    current_x = 0.0;
                } else {
                    current_x = proposed_x;
                }
                chunks.push(WordChunk {
                    text: piece,
                    x_offset: current_x,
                    width: pw,
                });
                current_x += pw;
            }
        }
        lines.push(finish_line(&mut chunks));
    }
    lines
}

/// Styling shared by every line of a text block.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LineStyle {
    pub(crate) font: FontId,
    pub(crate) size: f32,
    pub(crate) leading: f32,
    pub(crate) color: Color,
    pub(crate) align: TextAlign,
    pub(crate) ascender: f32,
}

/// Emit draw ops for `lines` inside a box of `width` starting at `x`, with the
/// top of the first line box at `top`. `last_index` is the index (within the
/// whole paragraph) of its final line, which is never justified.
pub(crate) fn line_ops(
    lines: &[TextLine],
    first_index: usize,
    last_index: usize,
    style: &LineStyle,
    x: f32,
    width: f32,
    top: f32,
    out: &mut Vec<DrawOp>,
) {
    for (n, line) in lines.iter().enumerate() {
        if line.chunks.is_empty() {
            continue;
        }
        let baseline = top - n as f32 * style.leading - style.size * style.ascender;
        let is_justified = style.align == TextAlign::Justify
            && first_index + n != last_index
            && line.chunks.len() > 1;
        let start_x = match style.align {
            TextAlign::Center => x + (width - line.total_width) / 2.0,
            TextAlign::Right => x + width - line.total_width,
            TextAlign::Left | TextAlign::Justify => x,
        };
        if is_justified {
            let extra_per_gap = (width - line.total_width) / (line.chunks.len() - 1) as f32;
            for (i, chunk) in line.chunks.iter().enumerate() {
                out.push(DrawOp::Text {
                    x: start_x + chunk.x_offset + i as f32 * extra_per_gap,
                    y: baseline,
                    font: style.font,
                    size: style.size,
                    color: style.color,
                    text: chunk.text.clone(),
                });
            }
        } else {
            out.push(DrawOp::Text {
                x: start_x,
                y: baseline,
                font: style.font,
                size: style.size,
                color: style.color,
                text: line.text(),
            });
        }
    }
}
