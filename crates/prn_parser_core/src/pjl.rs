//! PJL parser
//!
//! Handles the UEL, `@PJL` command lines and the implicit switch to whatever language follows the
//! last command line.

use std::collections::HashMap;

use crate::control_codes::{ESC, FORM_FEED, UEL, match_marker, match_marker_ignore_case};
use crate::overlay::{self, UnitClass};
use crate::{BlockOutcome, ContinuationKind, ContinuationRequest, Cursor, Language, LinkContext, Options, PdlParser, Row, RowKind, RowSink, render_bytes, sniff_language};

const PJL_PREFIX: &[u8] = b"@PJL";

#[rustfmt::skip]
static COMMANDS: &[(&str, &str)] = &[
    ("COMMENT", "Comment"), ("DEFAULT", "Set default value"), ("DINQUIRE", "Inquire default value"),
    ("DMCMD", "Device management command"), ("DMINFO", "Device management information"),
    ("ECHO", "Echo"), ("ENTER", "Enter language"), ("EOJ", "End of job"),
    ("FSAPPEND", "File system append"), ("FSDELETE", "File system delete"), ("FSDIRLIST", "File system directory list"),
    ("FSDOWNLOAD", "File system download"), ("FSINIT", "File system initialize"), ("FSMKDIR", "File system make directory"),
    ("FSQUERY", "File system query"), ("FSUPLOAD", "File system upload"), ("INFO", "Information request"),
    ("INITIALIZE", "Initialize"), ("INQUIRE", "Inquire current value"), ("JOB", "Start of job"),
    ("OPMSG", "Operator message"), ("RDYMSG", "Ready message"), ("RESET", "Reset"), ("SET", "Set value"),
    ("STMSG", "Status message"), ("USTATUS", "Unsolicited status"), ("USTATUSOFF", "Unsolicited status off"),
];

lazy_static::lazy_static! {
    static ref COMMAND_LUT: HashMap<&'static str, &'static str> = COMMANDS.iter().copied().collect();
}

pub fn command_description(command: &str) -> Option<&'static str> {
    COMMAND_LUT.get(command.to_ascii_uppercase().as_str()).copied()
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | FORM_FEED)
}

/// Value of `LANGUAGE = x` in the argument part of an `ENTER` command.
fn enter_language(args: &str) -> Option<Language> {
    let (key, value) = args.split_once('=')?;
    if !key.trim().eq_ignore_ascii_case("LANGUAGE") {
        return None;
    }
    Some(Language::from_pjl_name(value.trim().trim_matches('"')))
}

/// Splits printer readback data into its responses.
///
/// Every response ends with a form feed. An exchange is expected to carry two of them; data with
/// fewer terminators is one concatenated response and returned as a whole.
pub fn split_pjl_responses(data: &[u8]) -> Vec<&[u8]> {
    let terminators: Vec<usize> = memchr::memchr_iter(FORM_FEED, data).collect();
    if terminators.len() < 2 {
        return if data.is_empty() { Vec::new() } else { vec![data] };
    }

    let mut responses = Vec::with_capacity(terminators.len() + 1);
    let mut start = 0;
    for ff in terminators {
        responses.push(&data[start..=ff]);
        start = ff + 1;
    }
    let tail = &data[start..];
    if !tail.iter().all(|b| b.is_ascii_whitespace()) {
        responses.push(tail);
    }
    responses
}

#[derive(Default)]
pub struct PjlParser;

impl PjlParser {
    pub fn new() -> Self {
        Self
    }

    fn check(ctx: &mut LinkContext, begin: i64, end: i64) {
        if let Some(ovl) = ctx.overlay.as_mut() {
            overlay::check_action_pcl_seq(ovl, ctx.macro_level, UnitClass::JobControl, begin, end, None);
        }
    }

    /// One `@PJL` line; returns the language an `ENTER` command switches to.
    fn command_line(&mut self, line: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> Option<Language> {
        let begin = cursor.file_offset;
        Self::check(ctx, begin, begin + line.len() as i64);
        cursor.advance(line.len());

        let text = String::from_utf8_lossy(&line[PJL_PREFIX.len()..]);
        let text = text.trim();
        let (command, args) = match text.split_once(char::is_whitespace) {
            Some((command, args)) => (command, args.trim()),
            None => (text, ""),
        };
        let command = command.to_ascii_uppercase();

        let is_comment = command == "COMMENT";
        if !is_comment || options.pjl.show_comments {
            let description = match (command.as_str(), command_description(&command)) {
                ("", _) => "Prefix".to_string(),
                (_, Some(d)) if args.is_empty() => d.to_string(),
                (_, Some(d)) => format!("{d}: {args}"),
                (_, None) => format!("Unknown command {command}"),
            };
            let shown = line.strip_suffix(b"\n").unwrap_or(line);
            let shown = shown.strip_suffix(b"\r").unwrap_or(shown);
            let row = Row::new(RowKind::PjlCommand, begin, ctx.analysis_level)
                .label("PJL")
                .sequence(render_bytes(shown))
                .description(description);
            sink.add_row(ctx.annotate(row));
        }

        if command == "ENTER" {
            let language = enter_language(args);
            if language.is_none() {
                sink.warning(begin, ctx.analysis_level, "ENTER command without LANGUAGE");
            }
            return language;
        }
        None
    }
}

impl PdlParser for PjlParser {
    fn parse_block(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> BlockOutcome {
        ctx.take_continuation();

        while !cursor.is_empty() && !ctx.must_yield() {
            let rest = cursor.rest(buf);

            if rest[0] == ESC {
                match match_marker(rest, UEL) {
                    Some(true) => {
                        let begin = cursor.file_offset;
                        Self::check(ctx, begin, begin + UEL.len() as i64);
                        let row = Row::new(RowKind::PjlCommand, begin, ctx.analysis_level)
                            .label("PJL")
                            .sequence(render_bytes(UEL))
                            .description("Universal Exit Language");
                        sink.add_row(ctx.annotate(row));
                        cursor.advance(UEL.len());
                        continue;
                    }
                    None if !ctx.eof => {
                        ctx.set_continuation(ContinuationRequest::defer(ContinuationKind::None, cursor, &[]));
                        break;
                    }
                    _ => {}
                }
            }

            if is_whitespace(rest[0]) {
                let len = rest.iter().position(|&b| !is_whitespace(b)).unwrap_or(rest.len());
                let begin = cursor.file_offset;
                Self::check(ctx, begin, begin + len as i64);
                cursor.advance(len);
                continue;
            }

            match match_marker_ignore_case(rest, PJL_PREFIX) {
                Some(true) => {
                    let line_len = match memchr::memchr(b'\n', rest) {
                        Some(lf) => lf + 1,
                        None if ctx.eof => rest.len(),
                        None => {
                            ctx.set_continuation(ContinuationRequest::defer(ContinuationKind::None, cursor, &[]));
                            break;
                        }
                    };
                    if let Some(language) = self.command_line(&rest[..line_len], cursor, ctx, options, sink) {
                        return BlockOutcome::switch(language);
                    }
                    continue;
                }
                None if !ctx.eof => {
                    ctx.set_continuation(ContinuationRequest::defer(ContinuationKind::None, cursor, &[]));
                    break;
                }
                _ => {}
            }

            // anything else is the content of the next language
            let Some(language) = sniff_language(rest, ctx.eof) else {
                ctx.set_continuation(ContinuationRequest::defer(ContinuationKind::None, cursor, &[]));
                break;
            };
            let language = if language == Language::Pjl { Language::Pcl } else { language };
            log::debug!("implicit switch from PJL to {language} at {}", cursor.file_offset);
            return BlockOutcome::switch(language);
        }
        BlockOutcome::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_language() {
        assert_eq!(enter_language("LANGUAGE = PCL"), Some(Language::Pcl));
        assert_eq!(enter_language("language=PCLXL"), Some(Language::PclXl));
        assert_eq!(enter_language("LANG"), None);
    }

    #[test]
    fn test_split_two_responses() {
        let data = b"@PJL INFO ID\r\n\"LaserJet\"\r\n\x0c@PJL INFO STATUS\r\nCODE=10001\r\n\x0c";
        let responses = split_pjl_responses(data);
        assert_eq!(responses.len(), 2);
        assert!(responses[1].starts_with(b"@PJL INFO STATUS"));
    }

    #[test]
    fn test_split_single_response() {
        let data = b"@PJL INFO ID\r\n\"LaserJet\"\r\n\x0c";
        assert_eq!(split_pjl_responses(data), vec![&data[..]]);
        assert!(split_pjl_responses(b"").is_empty());
    }
}
