use std::io::{Read, Seek, SeekFrom, Write};

use crate::pclxl::writer::XlWriter;
use crate::{AnalysisError, LinkContext, OvlAct, OvlShow, OverlayState, OverlayTarget, Row, RowKind, RowSink, render_bytes};

/// Seekable input of an overlay walk.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Performs the pending overlay action. Returns true once the overlay is complete (or aborted);
/// the caller stops the walk then.
///
/// The input position is undefined afterwards, the orchestrator reseeks before its next read.
pub fn breakpoint(ctx: &mut LinkContext, input: &mut dyn ReadSeek, output: &mut dyn Write, sink: &mut dyn RowSink) -> Result<bool, AnalysisError> {
    let Some(ovl) = ctx.overlay.as_mut() else {
        return Ok(false);
    };
    let action = ovl.action;
    ovl.action = OvlAct::None;
    log::trace!("overlay breakpoint {action:?} offset={} skip={}..{}", ovl.offset, ovl.skip_begin, ovl.skip_end);

    match action {
        OvlAct::None => Ok(false),
        OvlAct::Remove => {
            flush(ovl, input, output, sink)?;
            Ok(false)
        }
        OvlAct::PageBegin => {
            if ovl.show == OvlShow::Keep {
                flush(ovl, input, output, sink)?;
            }
            overlay_row(sink, ovl.offset, "Page", "First page begins");
            Ok(false)
        }
        OvlAct::PageEnd => {
            overlay_row(sink, ovl.skip_begin, "Page", "First page ends; following pages are removed");
            Ok(false)
        }
        OvlAct::PageBoundary => {
            sink.diag(ovl.skip_end, 0, &format!("Page boundary, page {} removed", ovl.pages));
            Ok(false)
        }
        OvlAct::Insert => {
            ensure_header(ovl, output, sink)?;
            Ok(false)
        }
        OvlAct::Adjust => {
            adjust(ovl, input, output, sink)?;
            Ok(false)
        }
        OvlAct::Replace => {
            let begin = ovl.skip_begin;
            copy_range(ovl, input, output, sink, ovl.offset, begin)?;
            let pop = XlWriter::new(ovl.big_endian).pop_gs();
            write_wrapped(ovl, output, sink, &pop)?;
            insert_row(sink, ovl.unit_begin, &pop, "PopGS (replaces EndPage)");
            ovl.offset = ovl.skip_end;
            ovl.clear_skip();
            Ok(false)
        }
        OvlAct::PushGS => {
            let at = if ovl.skip_pending() { ovl.skip_begin } else { ovl.unit_begin };
            copy_range(ovl, input, output, sink, ovl.offset, at)?;
            ovl.offset = if ovl.skip_pending() { ovl.skip_end } else { at };
            ovl.clear_skip();
            let push = XlWriter::new(ovl.big_endian).push_gs();
            write_wrapped(ovl, output, sink, &push)?;
            insert_row(sink, ovl.unit_begin, &push, "PushGS");
            Ok(false)
        }
        OvlAct::Reset | OvlAct::Terminate | OvlAct::EndOfFile => {
            let end = if ovl.skip_pending() { ovl.skip_begin } else { ovl.offset };
            complete(ovl, input, output, sink, end)?;
            Ok(true)
        }
        OvlAct::IdMacro => {
            let at = ovl.skip_end.max(ovl.offset);
            if let Some(collision) = &ovl.collision {
                sink.error(at, 0, &format!("{collision} is already used by the source stream; overlay aborted"));
            }
            Ok(true)
        }
    }
}

/// Completes the overlay at `at` (end of input, or the start of a language the overlay cannot
/// contain). A pending removal range is dropped.
pub fn finish_at(ctx: &mut LinkContext, input: &mut dyn ReadSeek, output: &mut dyn Write, sink: &mut dyn RowSink, at: i64) -> Result<(), AnalysisError> {
    let Some(ovl) = ctx.overlay.as_mut() else {
        return Ok(());
    };
    ovl.action = OvlAct::None;
    let end = if ovl.skip_pending() { ovl.skip_begin.min(at) } else { at };
    complete(ovl, input, output, sink, end)
}

/// End of input reached without a terminating unit.
pub fn end_of_file(ctx: &mut LinkContext, input: &mut dyn ReadSeek, output: &mut dyn Write, sink: &mut dyn RowSink, eof: i64) -> Result<(), AnalysisError> {
    overlay_row(sink, eof, "End of File", "End of input reached");
    finish_at(ctx, input, output, sink, eof)
}

fn complete(ovl: &mut OverlayState, input: &mut dyn ReadSeek, output: &mut dyn Write, sink: &mut dyn RowSink, end: i64) -> Result<(), AnalysisError> {
    copy_range(ovl, input, output, sink, ovl.offset, end)?;
    ovl.offset = end;
    ovl.clear_skip();
    write_trailer(ovl, output, sink)?;
    output.flush().map_err(|e| output_error(sink, end, e))?;
    Ok(())
}

/// Copies the kept bytes before the pending removal range and skips the range.
fn flush(ovl: &mut OverlayState, input: &mut dyn ReadSeek, output: &mut dyn Write, sink: &mut dyn RowSink) -> Result<(), AnalysisError> {
    if !ovl.skip_pending() {
        return Ok(());
    }
    let (begin, end) = (ovl.skip_begin, ovl.skip_end);
    copy_range(ovl, input, output, sink, ovl.offset, begin)?;
    sink.diag(begin, 0, &format!("skipped {} bytes", end - begin));
    ovl.offset = end;
    ovl.clear_skip();
    Ok(())
}

fn adjust(ovl: &mut OverlayState, input: &mut dyn ReadSeek, output: &mut dyn Write, sink: &mut dyn RowSink) -> Result<(), AnalysisError> {
    copy_range(ovl, input, output, sink, ovl.offset, ovl.skip_begin)?;

    // binary data following the terminator is copied unchanged
    let (begin, end) = (ovl.unit_begin, ovl.skip_end);
    let sequence_end = (ovl.adjust_terminator + 1).clamp(begin, end);
    let mut fragment = vec![0; (sequence_end - begin) as usize];
    input.seek(SeekFrom::Start(begin as u64))?;
    input.read_exact(&mut fragment)?;

    let mut rewritten = Vec::with_capacity(fragment.len() + 3);
    if ovl.adjust_root && fragment.first() != Some(&crate::control_codes::ESC) {
        rewritten.extend_from_slice(&ovl.combo_root);
    }
    let terminator_at = rewritten.len() + (ovl.adjust_terminator - begin) as usize;
    rewritten.extend_from_slice(&fragment);
    if let Some(terminator) = rewritten.get_mut(terminator_at) {
        if ovl.adjust_final {
            *terminator &= !0x20;
        } else {
            *terminator |= 0x20;
        }
    }
    write_wrapped(ovl, output, sink, &rewritten)?;

    let row = Row::new(RowKind::Overlay, begin, 0)
        .label("Adjust")
        .sequence(render_bytes(&rewritten))
        .description(format!("{} bytes rewritten from {}", rewritten.len(), render_bytes(&fragment)));
    sink.add_row(row);

    ovl.offset = sequence_end;
    copy_range(ovl, input, output, sink, sequence_end, end)?;
    ovl.offset = end;
    ovl.clear_skip();
    Ok(())
}

/// Copies `[from, to)` of the input; wrapped into a `ReadStream` block for encapsulated PCL XL.
fn copy_range(ovl: &mut OverlayState, input: &mut dyn ReadSeek, output: &mut dyn Write, sink: &mut dyn RowSink, from: i64, to: i64) -> Result<(), AnalysisError> {
    ensure_header(ovl, output, sink)?;
    if to <= from {
        return Ok(());
    }
    let len = (to - from) as u64;
    input.seek(SeekFrom::Start(from as u64))?;

    let encapsulated = ovl.target == OverlayTarget::PclXl && ovl.encapsulate;
    if encapsulated {
        let prefix = XlWriter::new(ovl.big_endian).read_stream_prefix(len as u32);
        output.write_all(&prefix).map_err(|e| output_error(sink, from, e))?;
    }
    let copied = std::io::copy(&mut Read::take(&mut *input, len), output).map_err(|e| output_error(sink, from, e))?;
    if copied != len {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, format!("input ended after {copied} of {len} bytes at offset {from}")).into());
    }

    let text = if encapsulated { format!("copied {len} bytes, encapsulated") } else { format!("copied {len} bytes") };
    sink.comment(from, 0, &text);
    Ok(())
}

fn write_wrapped(ovl: &mut OverlayState, output: &mut dyn Write, sink: &mut dyn RowSink, bytes: &[u8]) -> Result<(), AnalysisError> {
    ensure_header(ovl, output, sink)?;
    if ovl.target == OverlayTarget::PclXl && ovl.encapsulate {
        let prefix = XlWriter::new(ovl.big_endian).read_stream_prefix(bytes.len() as u32);
        output.write_all(&prefix).map_err(|e| output_error(sink, ovl.offset, e))?;
    }
    output.write_all(bytes).map_err(|e| output_error(sink, ovl.offset, e))?;
    Ok(())
}

fn ensure_header(ovl: &mut OverlayState, output: &mut dyn Write, sink: &mut dyn RowSink) -> Result<(), AnalysisError> {
    if ovl.header_written {
        return Ok(());
    }
    ovl.header_written = true;
    let at = ovl.offset;

    match ovl.target {
        OverlayTarget::Pcl => {
            let mut header = Vec::new();
            if ovl.encapsulate {
                header.push(format!("\x1b&f{}Y", ovl.macro_id).into_bytes());
                header.push(b"\x1b&f0X".to_vec());
            }
            if ovl.restore_state {
                header.push(b"\x1b&f0S".to_vec());
            }
            for seq in header {
                output.write_all(&seq).map_err(|e| output_error(sink, at, e))?;
                insert_pcl_rows(sink, at, &seq);
            }
        }
        OverlayTarget::PclXl => {
            let writer = XlWriter::new(ovl.big_endian);
            let header = writer.stream_header();
            output.write_all(&header).map_err(|e| output_error(sink, at, e))?;
            insert_row(sink, at, &header, "Stream header");
            if ovl.encapsulate {
                let begin = writer.begin_stream(&ovl.stream_name);
                output.write_all(&begin).map_err(|e| output_error(sink, at, e))?;
                insert_row(sink, at, &begin, &format!("BeginStream '{}'", ovl.stream_name));

                let inner = writer.stream_header();
                let mut block = writer.read_stream_prefix(inner.len() as u32);
                block.extend_from_slice(&inner);
                output.write_all(&block).map_err(|e| output_error(sink, at, e))?;
                insert_row(sink, at, &block, "ReadStream (stream data header)");
            }
        }
    }
    Ok(())
}

fn write_trailer(ovl: &mut OverlayState, output: &mut dyn Write, sink: &mut dyn RowSink) -> Result<(), AnalysisError> {
    let at = ovl.offset;
    match ovl.target {
        OverlayTarget::Pcl => {
            let mut trailer = Vec::new();
            if ovl.restore_state {
                trailer.push(b"\x1b&f1S".to_vec());
            }
            if ovl.encapsulate {
                trailer.push(b"\x1b&f1X".to_vec());
            }
            for seq in trailer {
                output.write_all(&seq).map_err(|e| output_error(sink, at, e))?;
                insert_pcl_rows(sink, at, &seq);
            }
        }
        OverlayTarget::PclXl => {
            if ovl.encapsulate {
                let end = XlWriter::new(ovl.big_endian).end_stream();
                output.write_all(&end).map_err(|e| output_error(sink, at, e))?;
                insert_row(sink, at, &end, "EndStream");
            }
        }
    }
    Ok(())
}

fn insert_pcl_rows(sink: &mut dyn RowSink, at: i64, seq: &[u8]) {
    for row in crate::pcl::render_sequence(seq, at) {
        sink.add_row(row);
    }
}

fn insert_row(sink: &mut dyn RowSink, at: i64, bytes: &[u8], description: &str) {
    let shown = &bytes[..bytes.len().min(16)];
    sink.add_row(Row::new(RowKind::Overlay, at, 0).label("Insert").sequence(crate::render_hex(shown)).description(description));
}

fn overlay_row(sink: &mut dyn RowSink, at: i64, label: &str, description: &str) {
    sink.add_row(Row::new(RowKind::Overlay, at, 0).label(label).description(description));
}

fn output_error(sink: &mut dyn RowSink, at: i64, err: std::io::Error) -> AnalysisError {
    sink.error(at, 0, &format!("Writing the overlay failed: {err}"));
    AnalysisError::Io(err)
}
