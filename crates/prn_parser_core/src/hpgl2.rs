//! HP-GL/2 parser
//!
//! Commands are a two letter mnemonic followed by parameters, terminated by `;`, by the next
//! mnemonic or by an escape character. `LB` labels run up to the label terminator (ETX unless
//! redefined with `DT`), `PE` parameters are encoded and only end at `;`.

use std::collections::HashMap;

use crate::control_codes::{ESC, ETX, UEL, match_marker};
use crate::overlay::{self, UnitClass};
use crate::{BlockOutcome, ContinuationKind, ContinuationRequest, Cursor, Language, LinkContext, Options, PdlParser, Row, RowKind, RowSink, render_bytes};

#[rustfmt::skip]
static MNEMONICS: &[(&[u8; 2], &str)] = &[
    (b"AA", "Arc Absolute"), (b"AC", "Anchor Corner"), (b"AD", "Alternate Font Definition"),
    (b"AR", "Arc Relative"), (b"AT", "Absolute Arc Three Point"), (b"BP", "Begin Plot"),
    (b"BR", "Bezier Relative"), (b"BZ", "Bezier Absolute"), (b"CF", "Character Fill Mode"),
    (b"CI", "Circle"), (b"CO", "Comment"), (b"CP", "Character Plot"), (b"CR", "Set Color Range"),
    (b"DF", "Default Values"), (b"DI", "Absolute Direction"), (b"DR", "Relative Direction"),
    (b"DT", "Define Label Terminator"), (b"DV", "Define Variable Text Path"),
    (b"EA", "Edge Rectangle Absolute"), (b"EC", "Enable Cutter"), (b"EP", "Edge Polygon"),
    (b"ER", "Edge Rectangle Relative"), (b"ES", "Extra Space"), (b"EW", "Edge Wedge"),
    (b"FI", "Select Primary Font"), (b"FN", "Select Secondary Font"), (b"FP", "Fill Polygon"),
    (b"FR", "Frame Advance"), (b"FT", "Fill Type"), (b"IN", "Initialize"), (b"IP", "Input P1 and P2"),
    (b"IR", "Input Relative P1 and P2"), (b"IW", "Input Window"), (b"LA", "Line Attributes"),
    (b"LB", "Label"), (b"LM", "Label Mode"), (b"LO", "Label Origin"), (b"LT", "Line Type"),
    (b"MC", "Merge Control"), (b"MG", "Message"), (b"NP", "Number of Pens"), (b"PA", "Plot Absolute"),
    (b"PC", "Pen Color Assignment"), (b"PD", "Pen Down"), (b"PE", "Polyline Encoded"),
    (b"PG", "Advance Full Page"), (b"PM", "Polygon Mode"), (b"PP", "Pixel Placement"),
    (b"PR", "Plot Relative"), (b"PS", "Plot Size"), (b"PU", "Pen Up"), (b"PW", "Pen Width"),
    (b"QL", "Quality Level"), (b"RA", "Fill Rectangle Absolute"), (b"RF", "Raster Fill Definition"),
    (b"RO", "Rotate Coordinate System"), (b"RP", "Replot"), (b"RR", "Fill Rectangle Relative"),
    (b"RT", "Relative Arc Three Point"), (b"SA", "Select Alternate Font"), (b"SB", "Scalable or Bitmap Fonts"),
    (b"SC", "Scale"), (b"SD", "Standard Font Definition"), (b"SI", "Absolute Character Size"),
    (b"SL", "Character Slant"), (b"SM", "Symbol Mode"), (b"SP", "Select Pen"),
    (b"SR", "Relative Character Size"), (b"SS", "Select Standard Font"), (b"ST", "Sort"),
    (b"SV", "Screened Vectors"), (b"TD", "Transparent Data"), (b"TR", "Transparency Mode"),
    (b"UL", "User-defined Line Type"), (b"WG", "Fill Wedge"), (b"WU", "Pen Width Unit Selection"),
];

lazy_static::lazy_static! {
    static ref MNEMONIC_LUT: HashMap<[u8; 2], &'static str> = MNEMONICS.iter().map(|(m, d)| (**m, *d)).collect();
}

pub fn mnemonic_description(mnemonic: [u8; 2]) -> Option<&'static str> {
    MNEMONIC_LUT.get(&mnemonic.map(|b| b.to_ascii_uppercase())).copied()
}

fn is_separator(b: u8) -> bool {
    b != ESC && (b < 0x20 || matches!(b, b' ' | b',' | b';'))
}

/// Scans a parameter list starting at `pos`. Returns the end of the command (a terminating `;`
/// included), or `None` if the list runs past the available data.
fn scan_params(data: &[u8], pos: usize, stop_on_letter: bool) -> Option<usize> {
    let mut quoted = false;
    for (i, &b) in data.iter().enumerate().skip(pos) {
        if quoted {
            quoted = b != b'"';
            continue;
        }
        match b {
            b'"' => quoted = true,
            b';' => return Some(i + 1),
            ESC => return Some(i),
            b if stop_on_letter && b.is_ascii_alphabetic() => return Some(i),
            _ => {}
        }
    }
    None
}

enum Step {
    Continue,
    Defer,
    Switch(Language),
    Invalid,
}

pub struct Hpgl2Parser {
    label_terminator: u8,
}

impl Default for Hpgl2Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Hpgl2Parser {
    pub fn new() -> Self {
        Self { label_terminator: ETX }
    }

    fn check(ctx: &mut LinkContext, begin: i64, end: i64) {
        if let Some(ovl) = ctx.overlay.as_mut() {
            overlay::check_action_pcl_seq(ovl, ctx.macro_level, UnitClass::Content, begin, end, None);
        }
    }

    /// Length of the command starting with `mnemonic`, `None` if more data is needed.
    fn command_len(&mut self, rest: &[u8], mnemonic: [u8; 2], eof: bool) -> Option<usize> {
        let end = match &mnemonic {
            // an escape ends an unterminated label so that UEL and PCL exits still apply
            b"LB" => memchr::memchr2(self.label_terminator, ESC, &rest[2..]).map(|p| if rest[p + 2] == ESC { p + 2 } else { p + 3 }),
            b"PE" => scan_params(rest, 2, false),
            b"DT" | b"SM" => {
                let Some(&c) = rest.get(2) else {
                    return if eof { Some(rest.len()) } else { None };
                };
                if c == ESC {
                    return Some(2);
                }
                if c == b';' {
                    return Some(3);
                }
                scan_params(rest, 3, true)
            }
            _ => scan_params(rest, 2, true),
        };
        match end {
            Some(end) => Some(end),
            None if eof => Some(rest.len()),
            None => None,
        }
    }

    fn command(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> Step {
        let rest = cursor.rest(buf);
        let Some(&second) = rest.get(1) else {
            return if ctx.eof { self.garbage(rest, 1, cursor, ctx, sink) } else { Step::Defer };
        };
        if !second.is_ascii_alphabetic() {
            return self.garbage(rest, 1, cursor, ctx, sink);
        }
        let mnemonic = [rest[0].to_ascii_uppercase(), second.to_ascii_uppercase()];
        let Some(len) = self.command_len(rest, mnemonic, ctx.eof) else {
            return Step::Defer;
        };
        let command = &rest[..len];

        if &mnemonic == b"DT" {
            self.label_terminator = match command.get(2) {
                Some(&c) if c != b';' && c != ESC => c,
                _ => ETX,
            };
            log::trace!("label terminator set to {}", crate::print_char_value(self.label_terminator));
        }

        let begin = cursor.file_offset;
        Self::check(ctx, begin, begin + len as i64);
        let known = mnemonic_description(mnemonic);
        let description = match (&mnemonic, known) {
            (b"LB", _) if options.hpgl2.show_label_text => {
                let text = command[2..].strip_suffix(&[self.label_terminator]).unwrap_or(&command[2..]);
                format!("Label: \"{}\"", String::from_utf8_lossy(text))
            }
            (_, Some(d)) => d.to_string(),
            (_, None) => "Unknown mnemonic".to_string(),
        };
        let shown = &command[..len.min(options.effective_text_chunk().max(2))];
        let mut sequence = render_bytes(shown);
        if shown.len() < len {
            sequence.push_str("...");
        }
        let row = Row::new(RowKind::Hpgl2Command, begin, ctx.analysis_level)
            .label("HP-GL/2")
            .sequence(sequence)
            .description(description);
        sink.add_row(ctx.annotate(row));
        cursor.advance(len);

        if known.is_none() {
            sink.warning(begin, ctx.analysis_level, &format!("Unknown HP-GL/2 mnemonic {}", render_bytes(&mnemonic)));
            return Step::Invalid;
        }
        if &mnemonic == b"LB" && cursor.rest(buf).first() == Some(&ESC) {
            sink.warning(begin, ctx.analysis_level, "Label not terminated before escape sequence");
            return Step::Invalid;
        }
        Step::Continue
    }

    /// Bytes that do not start a command, up to the next letter, separator or escape.
    fn garbage(&mut self, rest: &[u8], min: usize, cursor: &mut Cursor, ctx: &mut LinkContext, sink: &mut dyn RowSink) -> Step {
        let len = match rest.iter().skip(min).position(|&b| b.is_ascii_alphabetic() || is_separator(b) || b == ESC) {
            Some(p) => p + min,
            None if ctx.eof => rest.len(),
            None => return Step::Defer,
        };
        let begin = cursor.file_offset;
        Self::check(ctx, begin, begin + len as i64);
        let row = Row::new(RowKind::MsgWarning, begin, ctx.analysis_level)
            .label("Warning")
            .sequence(render_bytes(&rest[..len.min(32)]))
            .description("Invalid HP-GL/2 data");
        log::warn!("invalid HP-GL/2 data at offset {begin}");
        sink.add_row(ctx.annotate(row));
        cursor.advance(len);
        Step::Invalid
    }
}

impl PdlParser for Hpgl2Parser {
    fn parse_block(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> BlockOutcome {
        ctx.take_continuation();
        let mut outcome = BlockOutcome::default();

        while !cursor.is_empty() && !ctx.must_yield() {
            let rest = cursor.rest(buf);
            let step = match rest[0] {
                ESC => match match_marker(rest, UEL) {
                    Some(true) => Step::Switch(Language::Pjl),
                    None if !ctx.eof => Step::Defer,
                    // ESC%#A, ESC E and any other escape sequence belong to PCL
                    _ => Step::Switch(Language::Pcl),
                },
                b if is_separator(b) => {
                    let len = rest.iter().position(|&b| !is_separator(b)).unwrap_or(rest.len());
                    let begin = cursor.file_offset;
                    Self::check(ctx, begin, begin + len as i64);
                    cursor.advance(len);
                    Step::Continue
                }
                b if b.is_ascii_alphabetic() => self.command(buf, cursor, ctx, options, sink),
                _ => self.garbage(rest, 1, cursor, ctx, sink),
            };

            match step {
                Step::Continue => {}
                Step::Invalid => outcome.bad_sequence = true,
                Step::Switch(language) => {
                    outcome.new_language = Some(language);
                    break;
                }
                Step::Defer => {
                    ctx.set_continuation(ContinuationRequest::defer(ContinuationKind::None, cursor, &[]));
                    break;
                }
            }
        }
        outcome
    }
}
