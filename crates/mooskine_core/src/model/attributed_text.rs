//! Styled note text.
//!
//! # Responsibility
//! - Represent note bodies as ordered runs of text with style attributes.
//! - Provide the range-based transforms used by the note editing toolbar.
//!
//! # Invariants
//! - No run is empty.
//! - Adjacent runs never share identical attributes (they are coalesced).
//! - Ranges are expressed in `char` indices and clamped to the text length.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// RGB color used by foreground and underline attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const RED: Color = Color::rgb(255, 0, 0);

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

/// Decorative fill painted behind glyph outlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternFill {
    /// Black and white cow hide pattern.
    Cow,
}

/// Style attributes attached to one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextAttributes {
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground_color: Option<Color>,
    /// Single underline in the given color. `None` means not underlined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_fill: Option<PatternFill>,
}

impl TextAttributes {
    /// Returns whether no styling is applied.
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

/// One contiguous span of text sharing the same attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    #[serde(default)]
    pub attributes: TextAttributes,
}

/// Ordered runs of styled text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributedText {
    runs: Vec<TextRun>,
}

impl AttributedText {
    /// Wraps plain text without any styling attributes.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::from_runs(vec![TextRun {
            text: text.into(),
            attributes: TextAttributes::default(),
        }])
    }

    /// Builds attributed text from arbitrary runs, dropping empty runs and
    /// merging neighbours with equal attributes.
    pub fn from_runs(runs: Vec<TextRun>) -> Self {
        Self {
            runs: coalesce(runs),
        }
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    /// Returns the text with all styling removed.
    pub fn to_plain_string(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    /// Length in `char`s.
    pub fn char_len(&self) -> usize {
        self.runs.iter().map(|run| run.text.chars().count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Returns whether no run carries any styling attribute.
    pub fn is_unstyled(&self) -> bool {
        self.runs.iter().all(|run| run.attributes.is_plain())
    }

    /// Applies `edit` to the attributes of every char in `range`.
    ///
    /// Runs crossing the range boundaries are split; the result is
    /// re-coalesced afterwards. Empty or fully out-of-bounds ranges are a
    /// no-op.
    pub fn apply(&mut self, range: Range<usize>, edit: impl Fn(&mut TextAttributes)) {
        let len = self.char_len();
        let start = range.start.min(len);
        let end = range.end.min(len);
        if start >= end {
            return;
        }

        let mut out = Vec::with_capacity(self.runs.len() + 2);
        let mut offset = 0;
        for run in self.runs.drain(..) {
            let run_len = run.text.chars().count();
            let run_start = offset;
            let run_end = offset + run_len;
            offset = run_end;

            if run_end <= start || run_start >= end {
                out.push(run);
                continue;
            }

            let local_start = start.saturating_sub(run_start);
            let local_end = (end - run_start).min(run_len);
            let head_end = byte_offset(&run.text, local_start);
            let tail_start = byte_offset(&run.text, local_end);

            let mut styled = run.attributes.clone();
            edit(&mut styled);

            out.push(TextRun {
                text: run.text[..head_end].to_string(),
                attributes: run.attributes.clone(),
            });
            out.push(TextRun {
                text: run.text[head_end..tail_start].to_string(),
                attributes: styled,
            });
            out.push(TextRun {
                text: run.text[tail_start..].to_string(),
                attributes: run.attributes,
            });
        }

        self.runs = coalesce(out);
    }

    /// Bold toolbar action.
    pub fn apply_bold(&mut self, range: Range<usize>) {
        self.apply(range, |attributes| attributes.bold = true);
    }

    /// Underline toolbar action: colors and underlines the range.
    pub fn apply_underline(&mut self, range: Range<usize>, color: Color) {
        self.apply(range, |attributes| {
            attributes.foreground_color = Some(color);
            attributes.underline_color = Some(color);
        });
    }

    /// Pattern toolbar action.
    pub fn apply_pattern_fill(&mut self, range: Range<usize>, fill: PatternFill) {
        self.apply(range, |attributes| attributes.pattern_fill = Some(fill));
    }

    /// Serializes to the JSON form persisted in `notes.attributed_text`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parses the JSON form persisted in `notes.attributed_text`.
    pub fn from_json(value: &str) -> serde_json::Result<Self> {
        let parsed: Self = serde_json::from_str(value)?;
        Ok(Self::from_runs(parsed.runs))
    }
}

fn coalesce(runs: Vec<TextRun>) -> Vec<TextRun> {
    let mut merged: Vec<TextRun> = Vec::with_capacity(runs.len());
    for run in runs {
        if run.text.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.attributes == run.attributes => last.text.push_str(&run.text),
            _ => merged.push(run),
        }
    }
    merged
}

fn byte_offset(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map_or(text.len(), |(index, _)| index)
}

fn is_false(value: &bool) -> bool {
    !*value
}
