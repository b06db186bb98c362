//! Structured decode output

use serde::Serialize;

use crate::{ErrorLevel, OffsetBase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RowKind {
    PclSequence,
    PclControl,
    PclText,
    PclData,
    PclXlHeader,
    PclXlOperator,
    PclXlAttribute,
    PclXlEmbeddedData,
    PclXlWhitespace,
    PclXlFontHeader,
    PclXlFontChar,
    Hpgl2Command,
    PjlCommand,
    PrescribeCommand,
    OpaqueData,
    /// Bytes inserted, removed or rewritten by overlay generation
    Overlay,
    MsgComment,
    MsgWarning,
    MsgError,
    MsgDiag,
}

impl RowKind {
    pub fn is_message(&self) -> bool {
        matches!(self, Self::MsgComment | Self::MsgWarning | Self::MsgError | Self::MsgDiag)
    }

    pub fn level(&self) -> ErrorLevel {
        match self {
            Self::MsgWarning => ErrorLevel::Warning,
            Self::MsgError => ErrorLevel::Error,
            _ => ErrorLevel::Info,
        }
    }
}

/// One decoded unit (or message) of the walk. Rows are never modified once added to a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub kind: RowKind,
    /// Offset of the unit within the input of its pass (the embedded payload for nested passes)
    pub offset: i64,
    pub analysis_level: u32,
    pub type_label: String,
    pub sequence: String,
    pub description: String,
}

impl Row {
    pub fn new(kind: RowKind, offset: i64, analysis_level: u32) -> Self {
        Self {
            kind,
            offset,
            analysis_level,
            type_label: String::new(),
            sequence: String::new(),
            description: String::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.type_label = label.into();
        self
    }

    pub fn sequence(mut self, sequence: impl Into<String>) -> Self {
        self.sequence = sequence.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Single line rendering used by the command line front end.
    pub fn format(&self, base: OffsetBase) -> String {
        let offset = if self.kind.is_message() && self.offset < 0 { " ".repeat(10) } else { base.format(self.offset) };
        let indent = "  ".repeat(self.analysis_level as usize);
        format!("{offset} {indent}{:<14} {:<28} {}", self.type_label, self.sequence, self.description)
    }
}

/// Receiver of rows, passed along with every parse call.
pub trait RowSink {
    fn add_row(&mut self, row: Row);

    fn comment(&mut self, offset: i64, level: u32, text: &str) {
        self.add_row(Row::new(RowKind::MsgComment, offset, level).label("Comment").description(text));
    }

    fn warning(&mut self, offset: i64, level: u32, text: &str) {
        log::warn!("{text} (offset {offset})");
        self.add_row(Row::new(RowKind::MsgWarning, offset, level).label("Warning").description(text));
    }

    fn error(&mut self, offset: i64, level: u32, text: &str) {
        log::error!("{text} (offset {offset})");
        self.add_row(Row::new(RowKind::MsgError, offset, level).label("Error").description(text));
    }

    fn diag(&mut self, offset: i64, level: u32, text: &str) {
        self.add_row(Row::new(RowKind::MsgDiag, offset, level).label("Diagnostic").description(text));
    }
}

impl RowSink for Vec<Row> {
    fn add_row(&mut self, row: Row) {
        self.push(row);
    }
}

/// Sink dropping every row; used by language scans.
#[derive(Default)]
pub struct NullSink;

impl RowSink for NullSink {
    #[inline]
    fn add_row(&mut self, _row: Row) { /* discard */
    }

    fn warning(&mut self, _offset: i64, _level: u32, _text: &str) {}

    fn error(&mut self, _offset: i64, _level: u32, _text: &str) {}
}
