//! Walk of content that is not decoded (PostScript, XL2HB, ASCII bound PCL XL).

use crate::control_codes::{ESC, UEL, match_marker};
use crate::overlay::{self, UnitClass};
use crate::{BlockOutcome, ContinuationKind, ContinuationRequest, Cursor, Language, LinkContext, Options, PdlParser, Row, RowKind, RowSink, render_bytes};

pub(crate) enum SpanStep {
    Continue,
    /// A UEL starts at the cursor
    Uel,
    Defer,
}

/// Walks one chunk of opaque bytes; chunks end before an escape character, at the row width or
/// at the end of the input.
pub(crate) fn walk_span(buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink, label: &str) -> SpanStep {
    let rest = cursor.rest(buf);
    if rest[0] == ESC {
        match match_marker(rest, UEL) {
            Some(true) => return SpanStep::Uel,
            None if !ctx.eof => return SpanStep::Defer,
            _ => {}
        }
    }

    let limit = options.effective_text_chunk().min(rest.len());
    let end = memchr::memchr(ESC, &rest[1..limit]).map(|p| p + 1).unwrap_or(limit);
    if end == rest.len() && end < options.effective_text_chunk() && !ctx.eof {
        return SpanStep::Defer;
    }

    let begin = cursor.file_offset;
    if let Some(ovl) = ctx.overlay.as_mut() {
        overlay::check_action_pcl_seq(ovl, ctx.macro_level, UnitClass::Setup, begin, begin + end as i64, None);
    }
    if options.opaque.show_data {
        let row = Row::new(RowKind::OpaqueData, begin, ctx.analysis_level)
            .label(label)
            .sequence(render_bytes(&rest[..end]))
            .description(format!("{end} bytes"));
        sink.add_row(ctx.annotate(row));
    }
    cursor.advance(end);
    SpanStep::Continue
}

/// PostScript and XL2HB spans, walked up to the next UEL.
#[derive(Default)]
pub struct OpaqueParser;

impl OpaqueParser {
    pub fn new() -> Self {
        Self
    }
}

impl PdlParser for OpaqueParser {
    fn parse_block(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> BlockOutcome {
        ctx.take_continuation();
        let label = ctx.language.name();

        while !cursor.is_empty() && !ctx.must_yield() {
            match walk_span(buf, cursor, ctx, options, sink, label) {
                SpanStep::Continue => {}
                SpanStep::Uel => return BlockOutcome::switch(Language::Pjl),
                SpanStep::Defer => {
                    ctx.set_continuation(ContinuationRequest::defer(ContinuationKind::None, cursor, &[]));
                    break;
                }
            }
        }
        BlockOutcome::default()
    }
}
