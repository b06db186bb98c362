//! Stream orchestrator and the public entry points.
//!
//! A [`Walk`] reads the input block by block, hands every block to the sub-parser of the current
//! language and reacts to what the parser reports: language switches, continuations (rewind and
//! read a larger block), closed embeddings (nested walk over the payload) and pending overlay
//! breakpoints.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::overlay::{self, ReadSeek};
use crate::{
    AnalysisError, Cursor, EmbedKind, EmbeddedPayload, Hpgl2Parser, Language, LinkContext, NullSink, OpaqueParser, Options, OverlayState, OverlayTarget, PclParser,
    PclXlParser, PdlParser, PjlParser, PrescribeParser, RequestType, Row, RowKind, RowSink, render_bytes, sniff_language,
};

/// Bytes looked at to classify the start of the input.
const SNIFF_LEN: usize = 256;

/// Parser calls in a row that may return without consuming a byte.
const MAX_IDLE_CALLS: u32 = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AnalysisSummary {
    pub file_size: u64,
    /// Offsets of the walked range
    pub start_offset: u64,
    pub end_offset: u64,
    pub initial_language: Language,
    /// Language active when the walk ended
    pub final_language: Language,
    pub language_switches: u32,
    /// Nested passes over embedded data
    pub embedded_passes: u32,
    /// At least one unit did not fit the grammar of its language
    pub invalid_sequences_seen: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PclOverlaySettings {
    /// Bracket the overlay with push/pop cursor position
    pub restore_cursor: bool,
    /// Wrap the overlay into a macro definition
    pub encapsulate: bool,
    pub macro_id: i32,
}

impl Default for PclOverlaySettings {
    fn default() -> Self {
        Self {
            restore_cursor: true,
            encapsulate: true,
            macro_id: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PclXlOverlaySettings {
    /// Bracket the first page with PushGS / PopGS
    pub restore_gs: bool,
    /// Wrap the overlay into a user defined stream
    pub encapsulate: bool,
    pub stream_name: String,
}

impl Default for PclXlOverlaySettings {
    fn default() -> Self {
        Self {
            restore_gs: true,
            encapsulate: true,
            stream_name: "Overlay".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OverlaySummary {
    /// Target file; `None` for the stream variants
    pub path: Option<PathBuf>,
    pub bytes_written: u64,
    /// Pages seen in the source
    pub pages: u32,
    pub analysis: AnalysisSummary,
}

/// Analyses `input` and appends the decoded rows to `sink`.
pub fn analyse<R: Read + Seek>(input: &mut R, options: &Options, sink: &mut dyn RowSink) -> Result<AnalysisSummary, AnalysisError> {
    let file_size = stream_len(input)?;
    let mut walk = Walk::top_level(input, None, options, sink, file_size, RequestType::Analyse, None);
    walk.run()?;
    Ok(walk.summary)
}

pub fn analyse_file(path: &Path, options: &Options, sink: &mut dyn RowSink) -> Result<AnalysisSummary, AnalysisError> {
    let mut file = open(path)?;
    analyse(&mut file, options, sink)
}

/// Returns the first page description language of `input`, looking through PJL wrappers.
pub fn scan_language_stream<R: Read + Seek>(input: &mut R, options: &Options) -> Result<Language, AnalysisError> {
    let file_size = stream_len(input)?;
    let mut sink = NullSink;
    let mut walk = Walk::top_level(input, None, options, &mut sink, file_size, RequestType::Scan, None);
    walk.run()?;
    Ok(walk.summary.final_language)
}

pub fn scan_language(path: &Path, options: &Options) -> Result<Language, AnalysisError> {
    let mut file = open(path)?;
    scan_language_stream(&mut file, options)
}

/// Writes a PCL overlay (macro) built from the first page of `input` to `output`.
pub fn make_overlay_pcl_stream<R: Read + Seek, W: Write>(
    input: &mut R,
    output: &mut W,
    options: &Options,
    settings: &PclOverlaySettings,
    sink: &mut dyn RowSink,
) -> Result<OverlaySummary, AnalysisError> {
    let mut state = OverlayState::new(OverlayTarget::Pcl, options.start_offset as i64);
    state.macro_id = settings.macro_id;
    state.encapsulate = settings.encapsulate;
    state.restore_state = settings.restore_cursor;
    make_overlay(input, output, options, state, sink)
}

/// Writes a PCL XL overlay (user defined stream) built from the first page of `input` to `output`.
pub fn make_overlay_pclxl_stream<R: Read + Seek, W: Write>(
    input: &mut R,
    output: &mut W,
    options: &Options,
    settings: &PclXlOverlaySettings,
    sink: &mut dyn RowSink,
) -> Result<OverlaySummary, AnalysisError> {
    let mut state = OverlayState::new(OverlayTarget::PclXl, options.start_offset as i64);
    state.stream_name = settings.stream_name.clone();
    state.encapsulate = settings.encapsulate;
    state.restore_state = settings.restore_gs;
    make_overlay(input, output, options, state, sink)
}

pub fn make_overlay_pcl(source: &Path, target: &Path, options: &Options, settings: &PclOverlaySettings, sink: &mut dyn RowSink) -> Result<OverlaySummary, AnalysisError> {
    overlay_file(source, target, |input, output| make_overlay_pcl_stream(input, output, options, settings, sink))
}

pub fn make_overlay_pclxl(source: &Path, target: &Path, options: &Options, settings: &PclXlOverlaySettings, sink: &mut dyn RowSink) -> Result<OverlaySummary, AnalysisError> {
    overlay_file(source, target, |input, output| make_overlay_pclxl_stream(input, output, options, settings, sink))
}

fn overlay_file<F>(source: &Path, target: &Path, make: F) -> Result<OverlaySummary, AnalysisError>
where
    F: FnOnce(&mut File, &mut BufWriter<File>) -> Result<OverlaySummary, AnalysisError>,
{
    let mut input = open(source)?;
    let file = File::create(target).map_err(|source| AnalysisError::Open {
        path: target.to_path_buf(),
        source,
    })?;
    let mut output = BufWriter::new(file);

    let result = make(&mut input, &mut output).and_then(|summary| {
        output.flush()?;
        Ok(summary)
    });
    drop(output);

    match result {
        Ok(mut summary) => {
            summary.path = Some(target.to_path_buf());
            Ok(summary)
        }
        Err(err) => {
            if err.is_collision() {
                log::info!("{err}, removing {}", target.display());
            } else {
                log::warn!("overlay generation failed ({err}), removing incomplete {}", target.display());
            }
            if let Err(remove_err) = std::fs::remove_file(target) {
                log::warn!("could not remove {}: {remove_err}", target.display());
            }
            Err(err)
        }
    }
}

fn make_overlay<R: Read + Seek, W: Write>(input: &mut R, output: &mut W, options: &Options, state: OverlayState, sink: &mut dyn RowSink) -> Result<OverlaySummary, AnalysisError> {
    let file_size = stream_len(input)?;
    let mut output = CountingWriter { inner: output, count: 0 };
    let (pages, collision, analysis) = {
        let mut walk = Walk::top_level(input, Some(&mut output), options, sink, file_size, RequestType::MakeOverlay, Some(state));
        walk.run()?;
        let ovl = walk.ctx.overlay.as_ref();
        let pages = ovl.map(|o| o.pages).unwrap_or_default();
        let collision = ovl.and_then(|o| o.collision.clone());
        (pages, collision, walk.summary)
    };

    if let Some(collision) = collision {
        return Err(collision.into_error());
    }
    Ok(OverlaySummary {
        path: None,
        bytes_written: output.count,
        pages,
        analysis,
    })
}

fn open(path: &Path) -> Result<File, AnalysisError> {
    File::open(path).map_err(|source| AnalysisError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn stream_len<R: Seek + ?Sized>(input: &mut R) -> Result<u64, AnalysisError> {
    let len = input.seek(SeekFrom::End(0))?;
    input.seek(SeekFrom::Start(0))?;
    Ok(len)
}

struct CountingWriter<'a, W: Write> {
    inner: &'a mut W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[derive(Default)]
struct Parsers {
    pcl: PclParser,
    pclxl: PclXlParser,
    hpgl2: Hpgl2Parser,
    pjl: PjlParser,
    prescribe: PrescribeParser,
    opaque: OpaqueParser,
}

impl Parsers {
    fn get(&mut self, language: Language) -> &mut dyn PdlParser {
        match language {
            Language::Pcl | Language::Pcl3Gui | Language::Unknown => &mut self.pcl,
            Language::PclXl => &mut self.pclxl,
            Language::Hpgl2 => &mut self.hpgl2,
            Language::Pjl => &mut self.pjl,
            Language::Prescribe => &mut self.prescribe,
            Language::PostScript | Language::Xl2hb => &mut self.opaque,
        }
    }
}

/// Why a walk stopped before the end of its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    /// Overlay completed or aborted by the engine
    OverlayDone,
    /// Scan found its language, or the overlay cannot continue into the new language
    Request,
    /// Unknown language, end of input forced
    Forced,
}

/// One pass over one input; nested passes over embedded data get their own `Walk`.
struct Walk<'a> {
    input: &'a mut dyn ReadSeek,
    output: Option<&'a mut dyn Write>,
    options: &'a Options,
    sink: &'a mut dyn RowSink,
    ctx: LinkContext,
    parsers: Parsers,
    summary: AnalysisSummary,
    /// Language forced by the enclosing pass
    forced_language: Option<Language>,
}

impl<'a> Walk<'a> {
    fn top_level(
        input: &'a mut dyn ReadSeek,
        output: Option<&'a mut dyn Write>,
        options: &'a Options,
        sink: &'a mut dyn RowSink,
        file_size: u64,
        request: RequestType,
        overlay: Option<OverlayState>,
    ) -> Self {
        let start = options.start_offset.min(file_size);
        let end = options.end_offset.map_or(file_size, |e| e.min(file_size)).max(start);
        let mut ctx = LinkContext::new(Language::Pcl, file_size, 0);
        ctx.request = request;
        ctx.overlay = overlay;
        Self {
            input,
            output,
            options,
            sink,
            ctx,
            parsers: Parsers::default(),
            summary: AnalysisSummary {
                file_size,
                start_offset: start,
                end_offset: end,
                ..Default::default()
            },
            forced_language: options.initial_language,
        }
    }

    fn nested(input: &'a mut dyn ReadSeek, options: &'a Options, sink: &'a mut dyn RowSink, len: u64, level: u32, kind: EmbedKind) -> Self {
        let language = kind.content_language();
        let mut ctx = LinkContext::new(language, len, level);
        ctx.embed_type = kind;
        Self {
            input,
            output: None,
            options,
            sink,
            ctx,
            parsers: Parsers::default(),
            summary: AnalysisSummary {
                file_size: len,
                start_offset: 0,
                end_offset: len,
                ..Default::default()
            },
            forced_language: Some(language),
        }
    }

    fn level(&self) -> u32 {
        self.ctx.analysis_level
    }

    fn run(&mut self) -> Result<(), AnalysisError> {
        let (start, end) = (self.summary.start_offset as i64, self.summary.end_offset as i64);
        if start == end {
            self.sink.comment(start, self.level(), "Input is empty, nothing to analyse");
            if let Some(output) = self.output.as_mut() {
                overlay::end_of_file(&mut self.ctx, self.input, &mut **output, self.sink, end)?;
            }
            return Ok(());
        }

        let language = self.initial_language(start, end)?;
        self.ctx.language = language;
        self.ctx.previous_language = language;
        self.summary.initial_language = language;
        self.summary.final_language = language;
        if self.level() == 0 {
            self.sink.comment(start, 0, &format!("Analysis starts in {language}"));
        }
        log::debug!("walk level {} over {start}..{end} starting in {language}", self.level());

        if self.ctx.request == RequestType::Scan && language != Language::Pjl {
            return Ok(());
        }
        if self.ctx.request == RequestType::MakeOverlay && !overlay_source(language) {
            return Err(AnalysisError::UnsupportedOverlayLanguage(language));
        }

        let at = match self.walk_blocks(start, end)? {
            Some((Stop::OverlayDone | Stop::Request, _)) => return Ok(()),
            Some((Stop::Forced, at)) => at,
            None => end,
        };
        self.finish(at)
    }

    fn initial_language(&mut self, start: i64, end: i64) -> Result<Language, AnalysisError> {
        let language = match self.forced_language {
            Some(language) => language,
            None => {
                let len = SNIFF_LEN.min((end - start) as usize);
                let mut head = vec![0; len];
                self.input.seek(SeekFrom::Start(start as u64))?;
                self.input.read_exact(&mut head)?;
                sniff_language(&head, true).unwrap_or_default()
            }
        };
        if language == Language::Unknown {
            self.sink.warning(start, self.level(), "Unknown initial language, analysing as PCL");
            return Ok(Language::Pcl);
        }
        Ok(language)
    }

    /// Block loop. Returns the reason and offset if the walk stopped before `end`.
    fn walk_blocks(&mut self, start: i64, end: i64) -> Result<Option<(Stop, i64)>, AnalysisError> {
        let block_size = self.options.effective_block_size();
        let mut buf = Vec::with_capacity(block_size);
        let mut pos = start;
        let mut extra = 0usize;
        let mut idle = 0u32;

        while pos < end {
            let want = (block_size + extra).min((end - pos) as usize);
            buf.resize(want, 0);
            self.input.seek(SeekFrom::Start(pos as u64))?;
            self.input.read_exact(&mut buf)?;
            self.ctx.eof = pos + want as i64 == end;
            log::trace!("block {pos}..{} (eof: {})", pos + want as i64, self.ctx.eof);

            let mut cursor = Cursor::new(pos, want);
            extra = 0;

            loop {
                let before = (cursor.file_offset, cursor.remaining);
                let language = self.ctx.language;
                let outcome = self.parsers.get(language).parse_block(&buf, &mut cursor, &mut self.ctx, self.options, &mut *self.sink);
                if outcome.bad_sequence {
                    self.summary.invalid_sequences_seen = true;
                }

                if let Some(payload) = self.ctx.take_embedded() {
                    self.recurse(payload)?;
                }
                if self.ctx.overlay_breakpoint_pending() {
                    if let Some(output) = self.output.as_mut() {
                        if overlay::breakpoint(&mut self.ctx, self.input, &mut **output, self.sink)? {
                            return Ok(Some((Stop::OverlayDone, cursor.file_offset)));
                        }
                    }
                }
                if let Some(to) = outcome.new_language {
                    if let Some(stop) = self.switch(to, cursor.file_offset)? {
                        return Ok(Some((stop, cursor.file_offset)));
                    }
                }
                if outcome.end_reached {
                    return Ok(Some((Stop::Forced, cursor.file_offset)));
                }

                if self.ctx.eof && self.ctx.continuation.is_some() {
                    self.drain_unresolved(&buf, &mut cursor);
                }
                if let Some(request) = self.ctx.continuation.as_ref() {
                    let rewind = request.rewind_offset(cursor.block_end()).clamp(pos, cursor.block_end());
                    extra = (cursor.block_end() - rewind) as usize;
                    log::trace!("continuation {:?}: rewind to {rewind}, {extra} bytes unresolved", request.kind);
                    pos = rewind;
                    cursor.exhaust();
                    break;
                }
                if cursor.is_empty() {
                    pos = cursor.file_offset;
                    break;
                }

                if (cursor.file_offset, cursor.remaining) == before {
                    idle += 1;
                    if idle > MAX_IDLE_CALLS {
                        self.skip_stalled(&buf, &mut cursor);
                        idle = 0;
                    }
                } else {
                    idle = 0;
                }
            }
        }
        Ok(None)
    }

    /// Logs the switch and selects the new parser. Returns `Some` if the walk has to stop.
    fn switch(&mut self, to: Language, at: i64) -> Result<Option<Stop>, AnalysisError> {
        let from = self.ctx.language;
        if to == from {
            return Ok(None);
        }
        let level = self.level();

        if to == Language::Unknown {
            self.sink.warning(at, level, &format!("Unknown language after {from}, analysis ends here"));
            self.summary.invalid_sequences_seen = true;
            self.enter(Language::Pcl);
            return Ok(Some(Stop::Forced));
        }

        self.sink.comment(at, level, &format!("Language switched to {to} from {from}"));
        log::debug!("language switch {from} -> {to} at {at} (level {level})");
        self.summary.language_switches += 1;
        self.enter(to);

        match self.ctx.request {
            RequestType::Scan if to != Language::Pjl => Ok(Some(Stop::Request)),
            RequestType::MakeOverlay if !overlay_source(to) => {
                self.sink.comment(at, level, &format!("{to} cannot be part of an overlay, overlay ends here"));
                if let Some(output) = self.output.as_mut() {
                    overlay::finish_at(&mut self.ctx, self.input, &mut **output, self.sink, at)?;
                }
                Ok(Some(Stop::Request))
            }
            _ => Ok(None),
        }
    }

    fn enter(&mut self, to: Language) {
        let from = self.ctx.language;
        self.parsers.get(from).reset();
        self.ctx.previous_language = from;
        self.ctx.language = to;
        self.summary.final_language = to;
    }

    /// Nested walk over a closed embedding.
    fn recurse(&mut self, payload: EmbeddedPayload) -> Result<(), AnalysisError> {
        let level = self.level();
        let len = payload.data.len() as u64;
        let name = payload.kind.name();
        self.sink.comment(payload.offset, level, &format!(">>>> {name}: {len} bytes"));

        if level + 1 > self.options.max_embed_depth {
            self.sink.error(
                payload.offset,
                level,
                &format!("Embedded data nested deeper than {} levels, {len} bytes skipped", self.options.max_embed_depth),
            );
            self.summary.invalid_sequences_seen = true;
        } else {
            log::debug!("analysing {len} bytes of {name} at level {}", level + 1);
            let mut input = std::io::Cursor::new(payload.data);
            let mut nested = Walk::nested(&mut input, self.options, &mut *self.sink, len, level + 1, payload.kind);
            nested.run()?;
            self.summary.invalid_sequences_seen |= nested.summary.invalid_sequences_seen;
            self.summary.embedded_passes += 1 + nested.summary.embedded_passes;
        }

        self.sink.comment(payload.offset, level, &format!("<<<< {name}: {len} bytes"));
        Ok(())
    }

    /// End of the walked range (or a forced end).
    fn finish(&mut self, at: i64) -> Result<(), AnalysisError> {
        let language = self.ctx.language;
        self.parsers.get(language).end_of_input(&mut self.ctx, &mut *self.sink);
        if let Some(payload) = self.ctx.take_embedded() {
            self.recurse(payload)?;
        }
        if let Some(kind) = self.ctx.embedding_active() {
            self.sink.warning(at, self.level(), &format!("Incomplete {} at end of input, not analysed", kind.name()));
            self.ctx.discard_embedding();
        }
        if let Some(output) = self.output.as_mut() {
            overlay::end_of_file(&mut self.ctx, self.input, &mut **output, self.sink, at)?;
        }
        Ok(())
    }

    /// A continuation survived the last block; the rest is dumped.
    fn drain_unresolved(&mut self, buf: &[u8], cursor: &mut Cursor) {
        let Some(request) = self.ctx.take_continuation() else {
            return;
        };
        let rest = cursor.rest(buf);
        let row = Row::new(RowKind::MsgWarning, cursor.file_offset, self.level())
            .label("Warning")
            .sequence(render_bytes(&rest[..rest.len().min(32)]))
            .description(format!("Incomplete sequence at end of file ({} bytes, {:?})", rest.len(), request.kind));
        log::warn!("unresolved continuation at end of file, offset {}", cursor.file_offset);
        self.sink.add_row(row);
        self.summary.invalid_sequences_seen = true;
        cursor.advance(rest.len());
    }

    fn skip_stalled(&mut self, buf: &[u8], cursor: &mut Cursor) {
        let byte = cursor.rest(buf)[0];
        self.sink.warning(
            cursor.file_offset,
            self.level(),
            &format!("{} parser made no progress, skipping {}", self.ctx.language, crate::print_char_value(byte)),
        );
        self.summary.invalid_sequences_seen = true;
        cursor.advance(1);
    }
}

/// Languages an overlay walk can continue into.
fn overlay_source(language: Language) -> bool {
    !matches!(language, Language::PostScript | Language::Prescribe | Language::Xl2hb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_writer() {
        let mut out = Vec::new();
        let mut writer = CountingWriter { inner: &mut out, count: 0 };
        writer.write_all(b"abc").unwrap();
        writer.write_all(b"de").unwrap();
        assert_eq!(writer.count, 5);
        assert_eq!(out, b"abcde");
    }

    #[test]
    fn test_overlay_sources() {
        assert!(overlay_source(Language::Pjl));
        assert!(overlay_source(Language::PclXl));
        assert!(!overlay_source(Language::PostScript));
    }
}
