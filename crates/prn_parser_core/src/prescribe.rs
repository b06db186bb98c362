//! Prescribe parser
//!
//! Prescribe command blocks start with `!R!` inside PCL text; commands are terminated by `;` and
//! `EXIT;` returns to the language the block was entered from.

use std::collections::HashMap;

use crate::control_codes::{ESC, PRESCRIBE_INTRO, UEL, match_marker};
use crate::overlay::{self, UnitClass};
use crate::{BlockOutcome, ContinuationKind, ContinuationRequest, Cursor, Language, LinkContext, Options, PdlParser, Row, RowKind, RowSink, render_bytes};

#[rustfmt::skip]
static COMMANDS: &[(&str, &str)] = &[
    ("ARC", "Draw arc"), ("BARC", "Draw bar code"), ("BOX", "Draw box"), ("CALL", "Call macro"),
    ("CASS", "Select paper cassette"), ("CIR", "Draw circle"), ("CMNT", "Comment"), ("COPY", "Number of copies"),
    ("DAP", "Draw to absolute position"), ("DRP", "Draw to relative position"), ("DUPX", "Duplex mode"),
    ("ENDM", "End macro"), ("EXIT", "Exit Prescribe"), ("FDIR", "Feed direction"), ("FILL", "Fill path"),
    ("FONT", "Select font"), ("FRPO", "Set front panel option"), ("FSET", "Font set"), ("INTL", "International character set"),
    ("JOG", "Jog output"), ("LDFC", "Load font character"), ("MAP", "Move to absolute position"), ("MCRO", "Define macro"),
    ("MRP", "Move to relative position"), ("MZP", "Move to zero position"), ("NEWP", "New path"), ("PAGE", "New page"),
    ("PAT", "Select pattern"), ("RES", "Reset"), ("RPP", "Return to saved position"), ("RTTX", "Rotated text"),
    ("SBM", "Set bottom margin"), ("SCP", "Save current position"), ("SCS", "Set character spacing"), ("SEM", "Set emulation mode"),
    ("SFNT", "Select font"), ("SLM", "Set left margin"), ("SLPI", "Set lines per inch"), ("SPD", "Set pen diameter"),
    ("STM", "Set top margin"), ("STR", "Set text rotation"), ("TEXT", "Print text"), ("UNIT", "Set unit"),
];

lazy_static::lazy_static! {
    static ref COMMAND_LUT: HashMap<&'static str, &'static str> = COMMANDS.iter().copied().collect();
}

pub fn command_description(command: &str) -> Option<&'static str> {
    COMMAND_LUT.get(command.to_ascii_uppercase().as_str()).copied()
}

/// End of the command starting at `data[0]` (terminating `;` included); quoted parameters may
/// contain `;`. `None` if the command runs past the available data.
fn command_end(data: &[u8]) -> Option<usize> {
    let mut quote = None;
    for (i, &b) in data.iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b';' => return Some(i + 1),
                _ => {}
            },
        }
    }
    None
}

#[derive(Default)]
pub struct PrescribeParser;

impl PrescribeParser {
    pub fn new() -> Self {
        Self
    }

    fn check(ctx: &mut LinkContext, begin: i64, end: i64) {
        if let Some(ovl) = ctx.overlay.as_mut() {
            overlay::check_action_pcl_seq(ovl, ctx.macro_level, UnitClass::Setup, begin, end, None);
        }
    }

    fn add_row(ctx: &LinkContext, sink: &mut dyn RowSink, begin: i64, bytes: &[u8], description: String) {
        let row = Row::new(RowKind::PrescribeCommand, begin, ctx.analysis_level)
            .label("Prescribe")
            .sequence(render_bytes(bytes))
            .description(description);
        sink.add_row(ctx.annotate(row));
    }

    /// Language to return to after `EXIT`.
    fn return_language(ctx: &LinkContext) -> Language {
        match ctx.previous_language {
            Language::Prescribe | Language::Unknown => Language::Pcl,
            language => language,
        }
    }
}

impl PdlParser for PrescribeParser {
    fn parse_block(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> BlockOutcome {
        ctx.take_continuation();
        let mut outcome = BlockOutcome::default();

        while !cursor.is_empty() && !ctx.must_yield() {
            let rest = cursor.rest(buf);
            let begin = cursor.file_offset;

            if rest[0] == ESC {
                match match_marker(rest, UEL) {
                    Some(true) => return BlockOutcome::switch(Language::Pjl),
                    None if !ctx.eof => {
                        ctx.set_continuation(ContinuationRequest::defer(ContinuationKind::None, cursor, &[]));
                        break;
                    }
                    _ => return BlockOutcome::switch(Language::Pcl),
                }
            }

            if rest[0].is_ascii_whitespace() || rest[0] < 0x20 {
                let len = rest.iter().position(|&b| !(b.is_ascii_whitespace() || b < 0x20) || b == ESC).unwrap_or(rest.len());
                Self::check(ctx, begin, begin + len as i64);
                cursor.advance(len);
                continue;
            }

            match match_marker(rest, PRESCRIBE_INTRO) {
                Some(true) => {
                    Self::check(ctx, begin, begin + PRESCRIBE_INTRO.len() as i64);
                    Self::add_row(ctx, sink, begin, PRESCRIBE_INTRO, "Start of Prescribe commands".to_string());
                    cursor.advance(PRESCRIBE_INTRO.len());
                    continue;
                }
                None if !ctx.eof => {
                    ctx.set_continuation(ContinuationRequest::defer(ContinuationKind::None, cursor, &[]));
                    break;
                }
                _ => {}
            }

            let len = match command_end(rest) {
                Some(len) => len,
                None if ctx.eof => rest.len(),
                None => {
                    ctx.set_continuation(ContinuationRequest::defer(ContinuationKind::None, cursor, &[]));
                    break;
                }
            };
            let command = &rest[..len];
            let name_len = command.iter().position(|b| !b.is_ascii_alphabetic()).unwrap_or(command.len());
            let name = String::from_utf8_lossy(&command[..name_len]).to_ascii_uppercase();

            Self::check(ctx, begin, begin + len as i64);
            let known = command_description(&name);
            let description = match known {
                Some(d) => d.to_string(),
                None if name.is_empty() => "Invalid command".to_string(),
                None => format!("Unknown command {name}"),
            };
            let shown = &command[..len.min(options.effective_text_chunk().max(PRESCRIBE_INTRO.len()))];
            Self::add_row(ctx, sink, begin, shown, description);
            cursor.advance(len);

            if known.is_none() {
                sink.warning(begin, ctx.analysis_level, &format!("Unrecognised Prescribe command '{name}'"));
                outcome.bad_sequence = true;
            }
            if name == "EXIT" {
                outcome.new_language = Some(Self::return_language(ctx));
                break;
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_end() {
        assert_eq!(command_end(b"RES;EXIT;"), Some(4));
        assert_eq!(command_end(b"TEXT 'a;b';"), Some(11));
        assert_eq!(command_end(b"TEXT \"x"), None);
    }

    #[test]
    fn test_command_lookup() {
        assert_eq!(command_description("exit"), Some("Exit Prescribe"));
        assert_eq!(command_description("XYZ"), None);
    }
}
