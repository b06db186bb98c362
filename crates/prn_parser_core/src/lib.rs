//! Print stream analysis engine.
//!
//! Walks a byte stream containing an arbitrary mix of printer languages (PCL, PCL XL, HP-GL/2,
//! PJL, Prescribe and opaque PostScript spans), emits one [`Row`] per decoded unit and optionally
//! rewrites the stream into a PCL or PCL XL overlay.
//!
//! The walk is block based: each sub-parser sees one block at a time through a [`Cursor`] and the
//! per pass [`LinkContext`]. Units straddling a block end are deferred with a continuation, which
//! keeps the produced rows independent of the block size.
//!
//! None of the entry points are reentrant; one pass owns its context and sink exclusively.

pub mod control_codes;

mod errors;
pub use errors::*;

mod language;
pub use language::{Language, sniff_language};

mod options;
pub use options::*;

mod rows;
pub use rows::{NullSink, Row, RowKind, RowSink};

mod link;
pub use link::*;

pub mod overlay;

pub mod pcl;
pub use pcl::PclParser;

pub mod pclxl;
pub use pclxl::PclXlParser;

mod hpgl2;
pub use hpgl2::Hpgl2Parser;

mod pjl;
pub use pjl::{PjlParser, split_pjl_responses};

mod prescribe;
pub use prescribe::PrescribeParser;

mod opaque;
pub use opaque::OpaqueParser;

mod analyser;
pub use analyser::{
    AnalysisSummary, OverlaySummary, PclOverlaySettings, PclXlOverlaySettings, analyse, analyse_file, make_overlay_pcl, make_overlay_pcl_stream, make_overlay_pclxl,
    make_overlay_pclxl_stream, scan_language, scan_language_stream,
};

/// Result of one `parse_block` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockOutcome {
    /// The unit just walked switches the stream to another language
    pub new_language: Option<Language>,
    /// The pass has to stop (unknown language, nothing more to decode)
    pub end_reached: bool,
    /// Bytes were found that do not fit the language grammar
    pub bad_sequence: bool,
}

impl BlockOutcome {
    pub fn switch(language: Language) -> Self {
        Self {
            new_language: Some(language),
            ..Default::default()
        }
    }
}

/// Sub-parser of one printer language.
///
/// `parse_block` walks units starting at the cursor until the block is exhausted, a language
/// switch is found, a unit straddles the block end (a continuation is set on the context) or the
/// context asks the parser to yield (embedded payload closed, overlay breakpoint pending).
/// It consumes at least one byte unless one of those conditions holds.
pub trait PdlParser {
    fn parse_block(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> BlockOutcome;

    /// The input ended while this parser was active.
    fn end_of_input(&mut self, _ctx: &mut LinkContext, _sink: &mut dyn RowSink) {}

    /// The stream switched away from this parser's language.
    fn reset(&mut self) {}
}
