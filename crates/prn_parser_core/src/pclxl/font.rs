//! Decode of downloaded PCL XL font headers and characters.
//!
//! The payload of the ReadFontHeader / ReadChar operators is collected by the enclosing pass and
//! walked here in a nested pass. Font data is always big-endian, independent of the stream binding.

use byteorder::{BigEndian, ByteOrder};

use crate::{ContinuationKind, Cursor, LinkContext, Row, RowKind, RowSink, render_hex};

/// Size of the fixed part of a font header.
const HEADER_LEN: usize = 8;
/// Segment identifier plus segment size.
const SEGMENT_HEADER_LEN: usize = 6;
const NULL_SEGMENT: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    SegmentHeader,
    SegmentData(u64),
    CharHeader,
    CharData(u64),
    Trailing,
}

pub(super) enum FontStep {
    Continue,
    Defer(ContinuationKind),
}

#[derive(Debug)]
pub(super) struct FontDecoder {
    stage: Stage,
}

impl FontDecoder {
    pub fn font_header() -> Self {
        Self { stage: Stage::Header }
    }

    pub fn font_char() -> Self {
        Self { stage: Stage::CharHeader }
    }

    /// Walks one unit of font data.
    pub fn step(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, sink: &mut dyn RowSink) -> FontStep {
        let rest = cursor.rest(buf);
        let level = ctx.analysis_level;
        let at = cursor.file_offset;

        match self.stage {
            Stage::Header => {
                if rest.len() < HEADER_LEN {
                    return FontStep::Defer(ContinuationKind::PclXlFontHeader);
                }
                let scaling = rest[4];
                let technology = match scaling {
                    1 => "TrueType",
                    254 => "Bitmap",
                    _ => "unknown",
                };
                let orientation = match rest[1] {
                    0 => "Portrait",
                    1 => "Landscape",
                    2 => "Reverse Portrait",
                    3 => "Reverse Landscape",
                    _ => "unknown",
                };
                let fields = [
                    (0, 1, "Format".to_string(), rest[0].to_string()),
                    (1, 1, "Orientation".to_string(), format!("{} ({orientation})", rest[1])),
                    (2, 2, "Mapping".to_string(), format!("0x{:04X}", BigEndian::read_u16(&rest[2..4]))),
                    (4, 1, "Scaling".to_string(), format!("{scaling} ({technology})")),
                    (5, 1, "Variety".to_string(), rest[5].to_string()),
                    (6, 2, "Number of characters".to_string(), BigEndian::read_u16(&rest[6..8]).to_string()),
                ];
                for (offset, len, name, value) in fields {
                    let row = Row::new(RowKind::PclXlFontHeader, at + offset, level)
                        .label("Font Header")
                        .sequence(render_hex(&rest[offset as usize..offset as usize + len]))
                        .description(format!("{name}: {value}"));
                    sink.add_row(row);
                }
                cursor.advance(HEADER_LEN);
                self.stage = Stage::SegmentHeader;
            }
            Stage::SegmentHeader => {
                if rest.len() < SEGMENT_HEADER_LEN {
                    return FontStep::Defer(ContinuationKind::PclXlFontHeader);
                }
                let id = BigEndian::read_u16(&rest[0..2]);
                let size = BigEndian::read_u32(&rest[2..6]) as u64;
                let name = if id == NULL_SEGMENT {
                    "NULL".to_string()
                } else {
                    String::from_utf8_lossy(&rest[0..2]).into_owned()
                };
                let row = Row::new(RowKind::PclXlFontHeader, at, level)
                    .label("Font Segment")
                    .sequence(render_hex(&rest[..SEGMENT_HEADER_LEN]))
                    .description(format!("Segment '{name}': {size} bytes"));
                sink.add_row(row);
                cursor.advance(SEGMENT_HEADER_LEN);
                if (id, size) == (NULL_SEGMENT, 0) {
                    let trailing = (ctx.file_size as i64 - cursor.file_offset).max(0);
                    if trailing > 0 {
                        sink.comment(cursor.file_offset, level, &format!("{trailing} bytes after the NULL segment"));
                    }
                }
                self.stage = match (id, size) {
                    (NULL_SEGMENT, 0) => Stage::Trailing,
                    (_, 0) => Stage::SegmentHeader,
                    (_, n) => Stage::SegmentData(n),
                };
            }
            Stage::SegmentData(remaining) => {
                let n = remaining.min(rest.len() as u64);
                cursor.advance(n as usize);
                self.stage = if n == remaining { Stage::SegmentHeader } else { Stage::SegmentData(remaining - n) };
            }
            Stage::CharHeader => {
                if rest.len() < 2 {
                    return FontStep::Defer(ContinuationKind::PclXlFontChar);
                }
                let class = rest[1];
                let header_len = match class {
                    0 => 10,
                    1 => 4,
                    2 => 10,
                    _ => 2,
                };
                if rest.len() < header_len {
                    return FontStep::Defer(ContinuationKind::PclXlFontChar);
                }
                let mut fields = vec![("Format", 0, 1, rest[0].to_string()), ("Class", 1, 1, class.to_string())];
                match class {
                    0 => {
                        fields.push(("Left offset", 2, 2, BigEndian::read_i16(&rest[2..4]).to_string()));
                        fields.push(("Top offset", 4, 2, BigEndian::read_i16(&rest[4..6]).to_string()));
                        fields.push(("Width", 6, 2, BigEndian::read_u16(&rest[6..8]).to_string()));
                        fields.push(("Height", 8, 2, BigEndian::read_u16(&rest[8..10]).to_string()));
                    }
                    1 => fields.push(("Character data size", 2, 2, BigEndian::read_u16(&rest[2..4]).to_string())),
                    2 => {
                        fields.push(("Character data size", 2, 2, BigEndian::read_u16(&rest[2..4]).to_string()));
                        fields.push(("Left side bearing", 4, 2, BigEndian::read_i16(&rest[4..6]).to_string()));
                        fields.push(("Advance width", 6, 2, BigEndian::read_u16(&rest[6..8]).to_string()));
                        fields.push(("Top side bearing", 8, 2, BigEndian::read_i16(&rest[8..10]).to_string()));
                    }
                    _ => {}
                }
                for (name, offset, len, value) in fields {
                    let row = Row::new(RowKind::PclXlFontChar, at + offset as i64, level)
                        .label("Font Character")
                        .sequence(render_hex(&rest[offset..offset + len]))
                        .description(format!("{name}: {value}"));
                    sink.add_row(row);
                }
                if class > 2 {
                    sink.warning(at + 1, level, &format!("Unknown character class {class}"));
                }
                cursor.advance(header_len);
                let data = (ctx.file_size as i64 - cursor.file_offset).max(0) as u64;
                if data > 0 {
                    let what = if class == 0 { "bitmap" } else { "glyph" };
                    sink.add_row(Row::new(RowKind::PclXlFontChar, cursor.file_offset, level).label("Font Character").description(format!("{data} bytes of {what} data")));
                }
                self.stage = Stage::CharData(data);
            }
            Stage::CharData(_) | Stage::Trailing => cursor.advance(rest.len()),
        }
        FontStep::Continue
    }

    /// Reports a header cut short by the end of the payload.
    pub fn incomplete(&self, cursor: &mut Cursor, buf: &[u8], ctx: &LinkContext, sink: &mut dyn RowSink) {
        let rest = cursor.rest(buf);
        let what = match self.stage {
            Stage::Header | Stage::SegmentHeader | Stage::SegmentData(_) => "font header",
            _ => "character header",
        };
        sink.warning(cursor.file_offset, ctx.analysis_level, &format!("Incomplete {what}: {} bytes left", rest.len()));
        cursor.advance(rest.len());
    }
}
