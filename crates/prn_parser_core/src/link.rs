//! Shared mutable state of one analysis pass.
//!
//! A `LinkContext` lives for exactly one pass over one input. Nested passes over embedded data
//! get their own context; nothing mutable is shared between levels.

use crate::{Language, Row};

/// Overlay identifier already defined by the source stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collision {
    MacroId(i32),
    StreamName(String),
}

impl Collision {
    pub fn into_error(self) -> crate::AnalysisError {
        match self {
            Self::MacroId(id) => crate::AnalysisError::MacroIdentifierCollision { id },
            Self::StreamName(name) => crate::AnalysisError::StreamNameCollision { name },
        }
    }
}

impl std::fmt::Display for Collision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MacroId(id) => write!(f, "Macro identifier {id}"),
            Self::StreamName(name) => write!(f, "Stream name '{name}'"),
        }
    }
}

/// Position of the parsers within the current block.
///
/// `file_offset` is the input offset of `buf[buf_offset]`; `remaining` counts the bytes of the
/// block not consumed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub file_offset: i64,
    pub buf_offset: usize,
    pub remaining: usize,
}

impl Cursor {
    pub fn new(file_offset: i64, len: usize) -> Self {
        Self {
            file_offset,
            buf_offset: 0,
            remaining: len,
        }
    }

    /// The unconsumed part of `buf`.
    #[inline]
    pub fn rest<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.buf_offset..self.buf_offset + self.remaining]
    }

    #[inline]
    pub fn peek(&self, buf: &[u8], ahead: usize) -> Option<u8> {
        if ahead < self.remaining { Some(buf[self.buf_offset + ahead]) } else { None }
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.remaining, "advance past block end");
        let n = n.min(self.remaining);
        self.buf_offset += n;
        self.remaining -= n;
        self.file_offset += n as i64;
    }

    /// Marks the rest of the block as handled without moving the offsets.
    #[inline]
    pub fn exhaust(&mut self) {
        self.remaining = 0;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Input offset just past the last byte of the block.
    #[inline]
    pub fn block_end(&self) -> i64 {
        self.file_offset + self.remaining as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum ContinuationKind {
    #[default]
    None,
    Reset,
    Abort,
    PclComplex,
    PclXlFontHeader,
    PclXlFontChar,
}

/// Request of a sub-parser to see a unit again once more data is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationRequest {
    pub kind: ContinuationKind,
    /// Negative: rewind this many bytes from the end of the block. Otherwise an absolute offset.
    pub data_len: i64,
    pub backtrack: bool,
    /// Leading bytes of the deferred unit (e.g. the root introducer of a PCL sequence)
    pub prefix: Vec<u8>,
}

impl ContinuationRequest {
    /// Defers the unit starting at the cursor; the rest of the block is unresolved.
    pub fn defer(kind: ContinuationKind, cursor: &Cursor, prefix: &[u8]) -> Self {
        Self {
            kind,
            data_len: -(cursor.remaining as i64),
            backtrack: true,
            prefix: prefix.to_vec(),
        }
    }

    pub fn absolute(kind: ContinuationKind, offset: i64) -> Self {
        Self {
            kind,
            data_len: offset,
            backtrack: true,
            prefix: Vec::new(),
        }
    }

    /// Offset the input has to be rewound to, given the end offset of the current block.
    pub fn rewind_offset(&self, block_end: i64) -> i64 {
        if self.data_len < 0 { block_end + self.data_len } else { self.data_len }
    }
}

/// What the payload collected in the auxiliary buffer represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum EmbedKind {
    #[default]
    None,
    PassThrough,
    Stream,
    FontHeader,
    FontChar,
}

impl EmbedKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PassThrough => "PassThrough",
            Self::Stream => "user stream",
            Self::FontHeader => "font header",
            Self::FontChar => "font character",
        }
    }

    /// Language a nested pass over this payload starts with.
    pub fn content_language(&self) -> Language {
        match self {
            Self::PassThrough => Language::Pcl,
            _ => Language::PclXl,
        }
    }
}

/// A closed embedding, ready for a nested pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedPayload {
    pub kind: EmbedKind,
    /// Offset of the first payload byte in the enclosing input
    pub offset: i64,
    pub data: Vec<u8>,
}

/// Kind of walk the orchestrator performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestType {
    #[default]
    Analyse,
    Scan,
    MakeOverlay,
}

/// Where the overlay walk currently is, relative to the pages of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum OvlPos {
    #[default]
    BeforeFirstPage,
    WithinFirstPage,
    WithinOtherPages,
    BetweenPages,
    AfterPages,
}

/// Action the overlay engine performs at the next breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum OvlAct {
    #[default]
    None,
    Remove,
    Insert,
    Adjust,
    PageBegin,
    PageEnd,
    PageBoundary,
    Reset,
    PushGS,
    Replace,
    Terminate,
    EndOfFile,
    IdMacro,
}

/// Reporting hint attached to the unit that was just checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum OvlShow {
    #[default]
    None,
    Keep,
    Remove,
    Insert,
    Adjust,
    Replace,
    Encapsulate,
    Terminate,
    Collision,
}

impl OvlShow {
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Self::None | Self::Keep => None,
            Self::Remove => Some("[removed]"),
            Self::Insert => Some("[inserted]"),
            Self::Adjust => Some("[adjusted]"),
            Self::Replace => Some("[replaced]"),
            Self::Encapsulate => Some("[encapsulated]"),
            Self::Terminate => Some("[end of overlay]"),
            Self::Collision => Some("[identifier collision]"),
        }
    }
}

/// Output format an overlay is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum OverlayTarget {
    Pcl,
    PclXl,
}

/// Sentinel for unset skip offsets.
pub const OFFSET_UNSET: i64 = -1;

/// Make-Overlay sub-state of the top level link context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayState {
    pub target: OverlayTarget,
    pub position: OvlPos,
    pub action: OvlAct,
    pub show: OvlShow,
    /// Start of the pending removal range
    pub skip_begin: i64,
    /// End of the pending removal range (exclusive)
    pub skip_end: i64,
    /// Input offset up to which the output is synchronized
    pub offset: i64,
    pub macro_id: i32,
    pub encapsulate: bool,
    /// Restore cursor (PCL) or graphics state (PCL XL) around the overlay
    pub restore_state: bool,
    pub stream_name: String,

    /// PushGS still has to be inserted at the first unit of the first page
    pub push_gs_pending: bool,
    /// Whether the last checked unit was kept; trailing embedded data follows it
    pub last_kept: bool,
    /// Start of the unit an `Adjust`/`Replace` action rewrites
    pub unit_begin: i64,
    /// Offset of the terminator byte of the adjusted combo group
    pub adjust_terminator: i64,
    /// Root introducer (ESC + parameterized char + group char) of the combo sequence being adjusted
    pub combo_root: [u8; 3],
    /// The adjusted fragment has to be prefixed with `combo_root`
    pub adjust_root: bool,
    /// Terminator of the adjusted fragment becomes upper case
    pub adjust_final: bool,
    /// A group of the current combo sequence has been kept already
    pub combo_kept_any: bool,
    /// Binding of the PCL XL source; the generated stream uses the same byte order
    pub big_endian: bool,
    pub header_written: bool,
    /// Identifier of the overlay already defined by the source
    pub collision: Option<Collision>,
    /// Number of pages seen so far
    pub pages: u32,
}

impl OverlayState {
    pub fn new(target: OverlayTarget, start_offset: i64) -> Self {
        Self {
            target,
            position: OvlPos::BeforeFirstPage,
            action: OvlAct::None,
            show: OvlShow::None,
            skip_begin: OFFSET_UNSET,
            skip_end: OFFSET_UNSET,
            offset: start_offset,
            macro_id: 0,
            encapsulate: false,
            restore_state: false,
            stream_name: String::new(),
            push_gs_pending: false,
            last_kept: false,
            unit_begin: OFFSET_UNSET,
            adjust_terminator: OFFSET_UNSET,
            combo_root: [0; 3],
            adjust_root: false,
            adjust_final: false,
            combo_kept_any: false,
            big_endian: false,
            header_written: false,
            collision: None,
            pages: 0,
        }
    }

    #[inline]
    pub fn skip_pending(&self) -> bool {
        self.skip_begin >= 0
    }

    pub fn clear_skip(&mut self) {
        self.skip_begin = OFFSET_UNSET;
        self.skip_end = OFFSET_UNSET;
    }

    #[inline]
    pub fn breakpoint_pending(&self) -> bool {
        self.action != OvlAct::None
    }
}

#[derive(Debug, Default)]
struct EmbeddedStore {
    kind: EmbedKind,
    offset: i64,
    data: Vec<u8>,
    active: bool,
}

/// State shared between the orchestrator and the sub-parsers of one pass.
#[derive(Debug)]
pub struct LinkContext {
    pub language: Language,
    /// Language active before the last switch; Prescribe returns to it on `EXIT`
    pub previous_language: Language,
    pub file_size: u64,
    pub analysis_level: u32,
    pub eof: bool,
    pub continuation: Option<ContinuationRequest>,
    pub embed_type: EmbedKind,
    pub macro_level: i32,
    pub request: RequestType,
    pub overlay: Option<OverlayState>,

    embedded: EmbeddedStore,
    ready: Option<EmbeddedPayload>,
}

impl LinkContext {
    pub fn new(language: Language, file_size: u64, analysis_level: u32) -> Self {
        Self {
            language,
            previous_language: Language::Pcl,
            file_size,
            analysis_level,
            eof: false,
            continuation: None,
            embed_type: EmbedKind::None,
            macro_level: 0,
            request: RequestType::Analyse,
            overlay: None,
            embedded: EmbeddedStore::default(),
            ready: None,
        }
    }

    /// Takes the outstanding continuation; a parser calls this first on every block.
    pub fn take_continuation(&mut self) -> Option<ContinuationRequest> {
        self.continuation.take()
    }

    pub fn set_continuation(&mut self, request: ContinuationRequest) {
        debug_assert!(self.continuation.is_none(), "continuation already outstanding");
        self.continuation = Some(request);
    }

    /// Appends payload bytes to the auxiliary buffer, opening an embedding of `kind` if none is
    /// active. `offset` is the input offset of `bytes[0]`.
    pub fn embedded_data_store(&mut self, kind: EmbedKind, offset: i64, bytes: &[u8]) {
        if !self.embedded.active {
            self.embedded = EmbeddedStore {
                kind,
                offset,
                data: Vec::with_capacity(bytes.len()),
                active: true,
            };
        }
        self.embedded.data.extend_from_slice(bytes);
    }

    pub fn embedding_active(&self) -> Option<EmbedKind> {
        if self.embedded.active { Some(self.embedded.kind) } else { None }
    }

    /// Closes the active embedding and hands it to the orchestrator.
    pub fn close_embedding(&mut self) {
        if !self.embedded.active {
            return;
        }
        let store = std::mem::take(&mut self.embedded);
        self.ready = Some(EmbeddedPayload {
            kind: store.kind,
            offset: store.offset,
            data: store.data,
        });
    }

    /// Drops the active embedding without analysing it.
    pub fn discard_embedding(&mut self) {
        self.embedded = EmbeddedStore::default();
    }

    pub fn embedding_ready(&self) -> bool {
        self.ready.is_some()
    }

    pub fn take_embedded(&mut self) -> Option<EmbeddedPayload> {
        self.ready.take()
    }

    #[inline]
    pub fn overlay_breakpoint_pending(&self) -> bool {
        self.overlay.as_ref().is_some_and(|o| o.breakpoint_pending())
    }

    /// Appends the overlay decision for the unit just checked to its row.
    pub fn annotate(&self, row: Row) -> Row {
        match self.overlay.as_ref().and_then(|o| o.show.label()) {
            Some(label) if row.description.is_empty() => row.description(label),
            Some(label) => {
                let text = format!("{} {label}", row.description);
                row.description(text)
            }
            None => row,
        }
    }

    /// True once a parser has to hand control back to the orchestrator after a unit.
    #[inline]
    pub fn must_yield(&self) -> bool {
        self.embedding_ready() || self.overlay_breakpoint_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_advance() {
        let buf = b"0123456789";
        let mut cursor = Cursor::new(100, buf.len());
        cursor.advance(4);
        assert_eq!(cursor.file_offset, 104);
        assert_eq!(cursor.rest(buf), b"456789");
        assert_eq!(cursor.peek(buf, 1), Some(b'5'));
        assert_eq!(cursor.peek(buf, 6), None);
        assert_eq!(cursor.block_end(), 110);
    }

    #[test]
    fn test_continuation_rewind() {
        let mut cursor = Cursor::new(0, 10);
        cursor.advance(7);
        let rel = ContinuationRequest::defer(ContinuationKind::PclComplex, &cursor, b"\x1b&l");
        assert_eq!(rel.rewind_offset(cursor.block_end()), 7);
        let abs = ContinuationRequest::absolute(ContinuationKind::None, 3);
        assert_eq!(abs.rewind_offset(10), 3);
    }

    #[test]
    fn test_embedding_lifecycle() {
        let mut ctx = LinkContext::new(Language::PclXl, 100, 0);
        ctx.embedded_data_store(EmbedKind::FontHeader, 10, b"abc");
        ctx.embedded_data_store(EmbedKind::FontHeader, 20, b"def");
        assert_eq!(ctx.embedding_active(), Some(EmbedKind::FontHeader));
        ctx.close_embedding();
        let payload = ctx.take_embedded().unwrap();
        assert_eq!(payload.offset, 10);
        assert_eq!(payload.data, b"abcdef");
        assert!(ctx.embedding_active().is_none());
    }
}
