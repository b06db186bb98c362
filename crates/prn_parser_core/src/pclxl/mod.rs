//! PCL XL parser
//!
//! A PCL XL stream starts with a stream header (binding byte + `HP-PCL XL;...` line) followed by
//! binary tokens: data values, attribute ids, embedded data blocks and operators. Attributes
//! precede the operator they belong to; an operator together with its attribute list forms one
//! operator sequence.
//!
//! Embedded data of ReadFontHeader, ReadChar, ReadStream and PassThrough is collected in the
//! link context and analysed in a nested pass once complete. Nested passes over font data enter
//! the parser in font header / character mode (see [`crate::EmbedKind`]).

mod font;
pub mod tables;
pub mod writer;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::control_codes::{ESC, UEL, match_marker, match_pclxl_header};
use crate::opaque::{SpanStep, walk_span};
use crate::overlay::{self, XlUnit};
use crate::{BlockOutcome, ContinuationKind, ContinuationRequest, Cursor, EmbedKind, Language, LinkContext, Options, PdlParser, Row, RowKind, RowSink, render_bytes, render_hex};
use font::{FontDecoder, FontStep};
use tables::{Element, Shape};

pub const TAG_UBYTE: u8 = 0xC0;
pub const TAG_UINT16: u8 = 0xC1;
pub const TAG_UINT32: u8 = 0xC2;
pub const TAG_UBYTE_ARRAY: u8 = 0xC8;
pub const TAG_ATTR_UBYTE: u8 = 0xF8;
pub const TAG_ATTR_UINT16: u8 = 0xF9;
pub const TAG_EMBEDDED_DATA: u8 = 0xFA;
pub const TAG_EMBEDDED_DATA_BYTE: u8 = 0xFB;

pub const ATTR_STREAM_NAME: u16 = 139;
pub const ATTR_STREAM_DATA_LENGTH: u16 = 140;

pub const OP_BEGIN_SESSION: u8 = 0x41;
pub const OP_END_SESSION: u8 = 0x42;
pub const OP_BEGIN_PAGE: u8 = 0x43;
pub const OP_END_PAGE: u8 = 0x44;
pub const OP_OPEN_DATA_SOURCE: u8 = 0x48;
pub const OP_CLOSE_DATA_SOURCE: u8 = 0x49;
pub const OP_BEGIN_FONT_HEADER: u8 = 0x4F;
pub const OP_READ_FONT_HEADER: u8 = 0x50;
pub const OP_END_FONT_HEADER: u8 = 0x51;
pub const OP_BEGIN_CHAR: u8 = 0x52;
pub const OP_READ_CHAR: u8 = 0x53;
pub const OP_END_CHAR: u8 = 0x54;
pub const OP_BEGIN_STREAM: u8 = 0x5B;
pub const OP_READ_STREAM: u8 = 0x5C;
pub const OP_END_STREAM: u8 = 0x5D;
pub const OP_POP_GS: u8 = 0x60;
pub const OP_PUSH_GS: u8 = 0x61;
pub const OP_PASS_THROUGH: u8 = 0xBF;

/// Longest stream header line accepted.
const MAX_HEADER_LEN: usize = 256;

fn is_whitespace(b: u8) -> bool {
    matches!(b, 0x00 | 0x09..=0x0D | 0x20)
}

fn unit_of(op: u8) -> XlUnit {
    match op {
        OP_BEGIN_SESSION | OP_OPEN_DATA_SOURCE | OP_CLOSE_DATA_SOURCE | 0x46 | 0x4A..=0x4C | 0x59 | 0x5A => XlUnit::Session,
        OP_END_SESSION => XlUnit::EndSession,
        OP_BEGIN_PAGE => XlUnit::BeginPage,
        OP_END_PAGE => XlUnit::EndPage,
        OP_BEGIN_FONT_HEADER..=0x55 => XlUnit::Resource,
        OP_BEGIN_STREAM | OP_READ_STREAM | OP_END_STREAM | 0x5F => XlUnit::StreamDefinition,
        _ => XlUnit::Content,
    }
}

/// Numeric reads in the byte order of the stream binding.
#[derive(Debug, Clone, Copy)]
struct Binding {
    big_endian: bool,
}

impl Binding {
    fn u16(&self, b: &[u8]) -> u16 {
        if self.big_endian { BigEndian::read_u16(b) } else { LittleEndian::read_u16(b) }
    }

    fn u32(&self, b: &[u8]) -> u32 {
        if self.big_endian { BigEndian::read_u32(b) } else { LittleEndian::read_u32(b) }
    }

    fn element(&self, elem: Element, b: &[u8]) -> String {
        match elem {
            Element::UByte => b[0].to_string(),
            Element::UInt16 => self.u16(b).to_string(),
            Element::UInt32 => self.u32(b).to_string(),
            Element::SInt16 => (self.u16(b) as i16).to_string(),
            Element::SInt32 => (self.u32(b) as i32).to_string(),
            Element::Real32 => {
                let v = if self.big_endian { BigEndian::read_f32(b) } else { LittleEndian::read_f32(b) };
                format!("{v}")
            }
        }
    }
}

/// Data value layout: shape, element type, element count and total length in bytes (tag included).
#[derive(Debug, Clone, Copy)]
struct ValueLayout {
    shape: Shape,
    element: Element,
    count: usize,
    header_len: usize,
    len: usize,
}

enum Step {
    Continue,
    Defer(ContinuationKind),
    Switch(Language),
    Invalid,
}

enum Mode {
    Header,
    Body,
    /// ASCII binding; the content is not decoded
    Ascii,
    Font(FontDecoder),
}

pub struct PclXlParser {
    mode: Mode,
    entered: bool,
    binding: Binding,
    /// Start of the current operator sequence
    seq_start: i64,
    last_operator: Option<u8>,
    data_remaining: u64,
    data_store: EmbedKind,
}

impl Default for PclXlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PclXlParser {
    pub fn new() -> Self {
        Self {
            mode: Mode::Header,
            entered: false,
            binding: Binding { big_endian: false },
            seq_start: 0,
            last_operator: None,
            data_remaining: 0,
            data_store: EmbedKind::None,
        }
    }

    /// Closes the collected PassThrough payload (or, with `flush_on_eof`, any payload) so the
    /// orchestrator can analyse it. Returns true if a payload was closed.
    pub fn process_stored_embedded_data(&mut self, ctx: &mut LinkContext, flush_on_eof: bool) -> bool {
        match ctx.embedding_active() {
            Some(EmbedKind::PassThrough) => {
                ctx.close_embedding();
                true
            }
            Some(kind) if flush_on_eof => {
                log::debug!("closing {} payload at end of input", kind.name());
                ctx.close_embedding();
                true
            }
            _ => false,
        }
    }

    fn enter(&mut self, cursor: &Cursor, ctx: &LinkContext) {
        self.entered = true;
        self.seq_start = cursor.file_offset;
        self.mode = match ctx.embed_type {
            EmbedKind::FontHeader => Mode::Font(FontDecoder::font_header()),
            EmbedKind::FontChar => Mode::Font(FontDecoder::font_char()),
            _ => Mode::Header,
        };
    }

    fn header(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, sink: &mut dyn RowSink) -> Step {
        let rest = cursor.rest(buf);
        match match_pclxl_header(rest) {
            None if !ctx.eof => return Step::Defer(ContinuationKind::None),
            Some(true) => {}
            _ => {
                sink.warning(cursor.file_offset, ctx.analysis_level, "PCL XL stream header missing");
                self.mode = Mode::Body;
                return Step::Invalid;
            }
        }

        let window = &rest[..rest.len().min(MAX_HEADER_LEN)];
        let end = match memchr::memchr(b'\n', window) {
            Some(lf) => lf + 1,
            None if window.len() < MAX_HEADER_LEN && !ctx.eof => return Step::Defer(ContinuationKind::None),
            None => window.len(),
        };

        let begin = cursor.file_offset;
        let binding = rest[0];
        self.binding.big_endian = binding == b'(';
        if let Some(ovl) = ctx.overlay.as_mut() {
            ovl.big_endian = self.binding.big_endian;
            overlay::check_action_pclxl_operator(ovl, XlUnit::Header, begin, begin + end as i64);
        }

        let line = &rest[..end];
        let text = line.strip_suffix(b"\n").unwrap_or(line);
        let text = text.strip_suffix(b"\r").unwrap_or(text);
        let description = match binding {
            b')' => "Binding: little-endian",
            b'(' => "Binding: big-endian",
            _ => "Binding: ASCII",
        };
        let row = Row::new(RowKind::PclXlHeader, begin, ctx.analysis_level)
            .label("Stream Header")
            .sequence(render_bytes(text))
            .description(description);
        sink.add_row(ctx.annotate(row));
        log::debug!("PCL XL stream header at {begin}: {description}");

        cursor.advance(end);
        self.seq_start = cursor.file_offset;
        if binding == b'\'' {
            sink.warning(begin, ctx.analysis_level, "ASCII binding is not decoded");
            self.mode = Mode::Ascii;
        } else {
            self.mode = Mode::Body;
        }
        Step::Continue
    }

    fn value_layout(&self, rest: &[u8]) -> Option<Result<ValueLayout, ()>> {
        let Some((shape, element)) = tables::data_type(rest[0]) else {
            return Some(Err(()));
        };
        let size = element.size();
        let layout = match shape {
            Shape::Scalar => ValueLayout { shape, element, count: 1, header_len: 1, len: 1 + size },
            Shape::Xy => ValueLayout { shape, element, count: 2, header_len: 1, len: 1 + 2 * size },
            Shape::Box => ValueLayout { shape, element, count: 4, header_len: 1, len: 1 + 4 * size },
            Shape::Array => {
                let len_tag = *rest.get(1)?;
                let (count, header_len) = match len_tag {
                    TAG_UBYTE => (*rest.get(2)? as usize, 3),
                    TAG_UINT16 => {
                        if rest.len() < 4 {
                            return None;
                        }
                        (self.binding.u16(&rest[2..4]) as usize, 4)
                    }
                    _ => return Some(Err(())),
                };
                ValueLayout { shape, element, count, header_len, len: header_len + count * size }
            }
        };
        Some(Ok(layout))
    }

    fn format_value(&self, layout: &ValueLayout, bytes: &[u8]) -> String {
        let size = layout.element.size();
        let elements = &bytes[layout.header_len..layout.len];
        if layout.shape == Shape::Array && layout.element == Element::UByte && !elements.is_empty() && elements.iter().all(|b| (0x20..0x7F).contains(b)) {
            return format!("\"{}\"", String::from_utf8_lossy(elements));
        }
        let shown = layout.count.min(16);
        let mut parts: Vec<String> = (0..shown).map(|i| self.binding.element(layout.element, &elements[i * size..(i + 1) * size])).collect();
        match layout.shape {
            Shape::Scalar => parts.remove(0),
            Shape::Xy | Shape::Box => format!("({})", parts.join(", ")),
            Shape::Array => {
                if layout.count > shown {
                    parts.push("...".to_string());
                }
                format!("[{}] ({} elements)", parts.join(", "), layout.count)
            }
        }
    }

    fn attribute(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> Step {
        let rest = cursor.rest(buf);
        let begin = cursor.file_offset;
        let layout = match self.value_layout(rest) {
            None => return Step::Defer(ContinuationKind::None),
            Some(Err(())) => {
                sink.warning(begin, ctx.analysis_level, &format!("Invalid data type {}", crate::print_char_value(rest[0])));
                cursor.advance(1);
                return Step::Invalid;
            }
            Some(Ok(layout)) => layout,
        };

        let (id, total) = match rest.get(layout.len) {
            None => return Step::Defer(ContinuationKind::None),
            Some(&TAG_ATTR_UBYTE) => match rest.get(layout.len + 1) {
                None => return Step::Defer(ContinuationKind::None),
                Some(&id) => (Some(id as u16), layout.len + 2),
            },
            Some(&TAG_ATTR_UINT16) => {
                if rest.len() < layout.len + 3 {
                    return Step::Defer(ContinuationKind::None);
                }
                (Some(self.binding.u16(&rest[layout.len + 1..layout.len + 3])), layout.len + 3)
            }
            Some(_) => (None, layout.len),
        };

        let value = self.format_value(&layout, &rest[..layout.len]);
        let type_name = match layout.shape {
            Shape::Scalar => layout.element.name().to_string(),
            Shape::Array => format!("{}_array", layout.element.name()),
            Shape::Xy => format!("{}_xy", layout.element.name()),
            Shape::Box => format!("{}_box", layout.element.name()),
        };

        let Some(id) = id else {
            sink.warning(begin, ctx.analysis_level, &format!("Data value {value} without attribute id"));
            cursor.advance(total);
            return Step::Invalid;
        };

        if let Some(ovl) = ctx.overlay.as_mut() {
            if layout.shape == Shape::Array && layout.element == Element::UByte {
                overlay::check_action_pclxl_attribute(ovl, id, &rest[layout.header_len..layout.len]);
            }
        }
        if options.pclxl.show_attributes {
            let name = tables::attribute_name(id).map(str::to_string).unwrap_or_else(|| format!("Attribute {id}"));
            let row = Row::new(RowKind::PclXlAttribute, begin, ctx.analysis_level)
                .label("Attribute")
                .sequence(type_name)
                .description(format!("{name} = {value}"));
            sink.add_row(row);
        }
        cursor.advance(total);
        Step::Continue
    }

    fn embedded(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> Step {
        let rest = cursor.rest(buf);
        let (header_len, len) = if rest[0] == TAG_EMBEDDED_DATA {
            if rest.len() < 5 {
                return Step::Defer(ContinuationKind::None);
            }
            (5, self.binding.u32(&rest[1..5]) as u64)
        } else {
            if rest.len() < 2 {
                return Step::Defer(ContinuationKind::None);
            }
            (2, rest[1] as u64)
        };

        let begin = cursor.file_offset;
        let end = begin + header_len as i64 + len as i64;
        if let Some(ovl) = ctx.overlay.as_mut() {
            overlay::check_action_pclxl_operator(ovl, XlUnit::EmbeddedData, begin, end);
        }

        let owner = self.last_operator.and_then(tables::operator_name).unwrap_or("no operator");
        if options.pclxl.show_embedded_data {
            let row = Row::new(RowKind::PclXlEmbeddedData, begin, ctx.analysis_level)
                .label("Embedded Data")
                .sequence(render_hex(&rest[..header_len]))
                .description(format!("{len} bytes for {owner}"));
            sink.add_row(ctx.annotate(row));
        }

        self.data_store = match self.last_operator {
            Some(OP_READ_FONT_HEADER) if options.pclxl.decode_fonts => EmbedKind::FontHeader,
            Some(OP_READ_CHAR) if options.pclxl.decode_fonts => EmbedKind::FontChar,
            Some(OP_READ_STREAM) if options.pclxl.decode_streams => EmbedKind::Stream,
            Some(OP_PASS_THROUGH) if options.pclxl.decode_pass_through => EmbedKind::PassThrough,
            _ => EmbedKind::None,
        };
        self.data_remaining = len;
        cursor.advance(header_len);
        self.seq_start = end;
        Step::Continue
    }

    /// Walks embedded data bytes of the current block.
    fn walk_data(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext) {
        let n = self.data_remaining.min(cursor.remaining as u64) as usize;
        if self.data_store != EmbedKind::None && n > 0 {
            ctx.embedded_data_store(self.data_store, cursor.file_offset, &cursor.rest(buf)[..n]);
        }
        cursor.advance(n);
        self.data_remaining -= n as u64;
        if self.data_remaining == 0 && self.data_store == EmbedKind::FontChar {
            ctx.close_embedding();
        }
    }

    fn operator(&mut self, op: u8, cursor: &mut Cursor, ctx: &mut LinkContext, sink: &mut dyn RowSink) -> Step {
        if op != OP_PASS_THROUGH && self.process_stored_embedded_data(ctx, false) {
            // the payload is analysed before this operator is reported
            return Step::Continue;
        }

        let begin = self.seq_start.min(cursor.file_offset);
        let end = cursor.file_offset + 1;
        if let Some(ovl) = ctx.overlay.as_mut() {
            overlay::check_action_pclxl_operator(ovl, unit_of(op), begin, end);
        }

        let name = tables::operator_name(op);
        let row = Row::new(RowKind::PclXlOperator, cursor.file_offset, ctx.analysis_level)
            .label("Operator")
            .sequence(format!("0x{op:02X}"))
            .description(name.unwrap_or("Reserved operator"));
        sink.add_row(ctx.annotate(row));

        match (op, ctx.embedding_active()) {
            (OP_END_FONT_HEADER, Some(EmbedKind::FontHeader)) | (OP_END_STREAM, Some(EmbedKind::Stream)) => ctx.close_embedding(),
            _ => {}
        }

        self.last_operator = Some(op);
        cursor.advance(1);
        self.seq_start = end;
        if name.is_none() {
            sink.warning(end - 1, ctx.analysis_level, &format!("Reserved operator {}", crate::print_char_value(op)));
            return Step::Invalid;
        }
        Step::Continue
    }

    fn token(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> Step {
        let rest = cursor.rest(buf);
        let b = rest[0];
        match b {
            ESC => match match_marker(rest, UEL) {
                Some(true) => Step::Switch(Language::Pjl),
                None if !ctx.eof => Step::Defer(ContinuationKind::None),
                _ => self.unknown_tag(b, cursor, ctx, sink),
            },
            b if is_whitespace(b) => {
                if options.pclxl.show_whitespace {
                    let row = Row::new(RowKind::PclXlWhitespace, cursor.file_offset, ctx.analysis_level)
                        .label("Whitespace")
                        .sequence(render_bytes(&[b]));
                    sink.add_row(row);
                }
                cursor.advance(1);
                Step::Continue
            }
            0xC0..=0xEF => self.attribute(buf, cursor, ctx, options, sink),
            TAG_ATTR_UBYTE | TAG_ATTR_UINT16 => {
                let len = if b == TAG_ATTR_UBYTE { 2 } else { 3 };
                if rest.len() < len && !ctx.eof {
                    return Step::Defer(ContinuationKind::None);
                }
                sink.warning(cursor.file_offset, ctx.analysis_level, "Attribute id without data value");
                cursor.advance(len.min(rest.len()));
                Step::Invalid
            }
            TAG_EMBEDDED_DATA | TAG_EMBEDDED_DATA_BYTE => self.embedded(buf, cursor, ctx, options, sink),
            0x41..=0xBF => self.operator(b, cursor, ctx, sink),
            _ => self.unknown_tag(b, cursor, ctx, sink),
        }
    }

    fn unknown_tag(&mut self, b: u8, cursor: &mut Cursor, ctx: &mut LinkContext, sink: &mut dyn RowSink) -> Step {
        let begin = cursor.file_offset;
        if let Some(ovl) = ctx.overlay.as_mut() {
            overlay::check_action_pclxl_operator(ovl, XlUnit::Filler, begin, begin + 1);
        }
        sink.warning(begin, ctx.analysis_level, &format!("Unknown tag {}", crate::print_char_value(b)));
        cursor.advance(1);
        self.seq_start = cursor.file_offset;
        Step::Invalid
    }
}

impl PdlParser for PclXlParser {
    fn parse_block(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> BlockOutcome {
        ctx.take_continuation();
        if !self.entered {
            self.enter(cursor, ctx);
        }
        let mut outcome = BlockOutcome::default();

        loop {
            if ctx.must_yield() {
                break;
            }
            if self.data_remaining > 0 {
                if cursor.is_empty() {
                    break;
                }
                self.walk_data(buf, cursor, ctx);
                continue;
            }
            if cursor.is_empty() {
                break;
            }
            if matches!(self.mode, Mode::Body) && cursor.file_offset == self.seq_start {
                if let Some(ovl) = ctx.overlay.as_mut() {
                    overlay::check_action_pclxl_push_gs(ovl, self.seq_start);
                    if ovl.breakpoint_pending() {
                        break;
                    }
                }
            }

            let step = match &mut self.mode {
                Mode::Header => self.header(buf, cursor, ctx, sink),
                Mode::Body => self.token(buf, cursor, ctx, options, sink),
                Mode::Ascii => match walk_span(buf, cursor, ctx, options, sink, "PCL XL (ASCII)") {
                    SpanStep::Continue => Step::Continue,
                    SpanStep::Uel => Step::Switch(Language::Pjl),
                    SpanStep::Defer => Step::Defer(ContinuationKind::None),
                },
                Mode::Font(decoder) => match decoder.step(buf, cursor, ctx, sink) {
                    FontStep::Continue => Step::Continue,
                    FontStep::Defer(kind) if ctx.eof => {
                        decoder.incomplete(cursor, buf, ctx, sink);
                        log::warn!("incomplete {kind:?} unit at end of embedded data");
                        Step::Invalid
                    }
                    FontStep::Defer(kind) => Step::Defer(kind),
                },
            };

            match step {
                Step::Continue => {}
                Step::Invalid => outcome.bad_sequence = true,
                Step::Switch(language) => {
                    outcome.new_language = Some(language);
                    break;
                }
                Step::Defer(kind) => {
                    if ctx.eof {
                        let rest = cursor.rest(buf);
                        sink.warning(cursor.file_offset, ctx.analysis_level, &format!("Incomplete PCL XL token at end of file ({} bytes)", rest.len()));
                        cursor.advance(rest.len());
                        outcome.bad_sequence = true;
                    } else {
                        ctx.set_continuation(ContinuationRequest::defer(kind, cursor, &[]));
                        break;
                    }
                }
            }
        }
        outcome
    }

    fn end_of_input(&mut self, ctx: &mut LinkContext, sink: &mut dyn RowSink) {
        if self.data_remaining > 0 {
            sink.warning(ctx.file_size as i64, ctx.analysis_level, &format!("Embedded data truncated, {} bytes missing", self.data_remaining));
            self.data_remaining = 0;
        }
        self.process_stored_embedded_data(ctx, true);
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}
