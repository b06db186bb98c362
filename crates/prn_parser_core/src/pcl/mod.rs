//! PCL (and PCL3GUI) parser
//!
//! Units of the walk:
//! - two-character escape sequences `ESC E`, `ESC 9`, ...
//! - parameterized sequences `ESC <param> [<group>] <value> <terminator>`; a lowercase
//!   terminator continues the sequence with another value/terminator group (combination
//!   sequences like `ESC&l1o2a0E`). Every group is reported as its own row.
//! - binary data following data-carrying sequences (`ESC*b#W`, `ESC)s#W`, ...)
//! - control codes (one row each) and runs of printable text, chunked to a fixed row width
//!
//! A parameterized sequence is buffered completely (up to its final group or a data group) before
//! any of its groups is reported, so a sequence cut by the block end is re-read as a whole.
//!
//! Language exits: `ESC%-12345X` (PJL, left for the PJL parser to report), `ESC%#B` (HP-GL/2),
//! a PCL XL stream header in the text stream and, if enabled, the Prescribe introducer `!R!`.

pub mod table;

use std::collections::VecDeque;

use crate::control_codes::{ESC, FORM_FEED, PRESCRIBE_INTRO, UEL, match_marker, match_pclxl_header};
use crate::overlay::{self, ComboGroup, UnitClass};
use crate::{BlockOutcome, ContinuationKind, ContinuationRequest, Cursor, Language, LinkContext, Options, PdlParser, Row, RowKind, RowSink, render_bytes};
use table::{NO_GROUP, SeqFlags, SeqInfo};

/// Longest value field accepted before a sequence is considered broken.
const MAX_VALUE_LEN: usize = 32;

/// Value assigned to the UEL when read as a parameterized `ESC%` sequence.
const UEL_VALUE: i64 = -12345;

/// Root introducer of a parameterized sequence: ESC, parameterized character and group character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Root {
    bytes: [u8; 3],
    len: usize,
}

impl Root {
    fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    fn param(&self) -> u8 {
        self.bytes[1]
    }

    fn group(&self) -> u8 {
        if self.len == 3 { self.bytes[2] } else { NO_GROUP }
    }
}

#[derive(Debug, Clone)]
struct Group {
    root: Root,
    /// Position within the sequence; 0 carries the root bytes
    index: usize,
    value_text: String,
    value: i64,
    terminator: u8,
    /// Bytes of the group in the stream (root included for index 0 of a fresh sequence)
    len: usize,
    data_len: u64,
    info: Option<SeqInfo>,
}

impl Group {
    fn is_final(&self) -> bool {
        self.terminator.is_ascii_uppercase() || self.terminator == b'@' || (0x5B..=0x5E).contains(&self.terminator)
    }

    fn is_uel(&self) -> bool {
        self.root.param() == b'%' && self.root.group() == NO_GROUP && self.terminator == b'X' && self.value == UEL_VALUE
    }

    fn flags(&self) -> SeqFlags {
        self.info.map(|i| i.flags).unwrap_or(SeqFlags::empty())
    }

    fn class(&self) -> UnitClass {
        let flags = self.flags();
        if self.is_uel() {
            UnitClass::JobControl
        } else if flags.contains(SeqFlags::MACRO_ID) {
            UnitClass::MacroId(self.value as i32)
        } else if flags.contains(SeqFlags::MACRO_CONTROL) {
            UnitClass::MacroControl(self.value as i32)
        } else if flags.contains(SeqFlags::EJECT_ON_ZERO) && self.value == 0 {
            UnitClass::PageMark
        } else if flags.contains(SeqFlags::SETUP) {
            UnitClass::Setup
        } else if flags.contains(SeqFlags::RESOURCE) {
            UnitClass::Resource
        } else {
            UnitClass::Content
        }
    }

    /// Sequence column text, shown as the equivalent stand-alone sequence.
    fn render(&self) -> String {
        let mut text = render_bytes(self.root.as_bytes());
        text.push_str(&self.value_text);
        text.push(self.terminator.to_ascii_uppercase() as char);
        text
    }

    fn describe(&self) -> String {
        if self.is_uel() {
            return "Universal Exit Language".to_string();
        }
        let Some(info) = self.info else {
            return "Unknown sequence".to_string();
        };
        match table::describe_value(self.root.param(), self.root.group(), self.terminator, self.value) {
            Some(meaning) => format!("{}: {meaning}", info.description),
            None if self.value_text.is_empty() => info.description.to_string(),
            None => format!("{}: {}", info.description, self.value_text),
        }
    }
}

enum Scan {
    Done { groups: Vec<Group>, interrupted: bool },
    NeedMore,
    /// Bytes `[0, end)` do not form a valid sequence
    Invalid { end: usize },
}

/// Parses value/terminator groups of a parameterized sequence from `data[pos..]`.
///
/// Stops after the final (uppercase) group or after a group followed by binary data.
fn scan_groups(data: &[u8], mut pos: usize, root: Root, first_index: usize) -> Scan {
    let mut groups = Vec::new();
    let mut group_start = 0;
    let mut index = first_index;

    loop {
        let value_start = pos;
        if matches!(data.get(pos), Some(b'+' | b'-')) {
            pos += 1;
        }
        while pos < data.len() && (data[pos].is_ascii_digit() || data[pos] == b'.') {
            pos += 1;
        }
        if pos - value_start > MAX_VALUE_LEN {
            return Scan::Invalid { end: pos };
        }
        let Some(&terminator) = data.get(pos) else {
            return Scan::NeedMore;
        };
        if !(0x40..=0x7E).contains(&terminator) || terminator == 0x5F {
            return Scan::Invalid { end: pos };
        }

        let value_text = String::from_utf8_lossy(&data[value_start..pos]).into_owned();
        let value = parse_integer_part(&value_text);
        let info = table::lookup_parameterized(root.param(), root.group(), terminator);
        let data_len = match info {
            Some(i) if i.flags.contains(SeqFlags::DATA) => value.max(0) as u64,
            _ => 0,
        };
        pos += 1;
        let group = Group {
            root,
            index,
            value_text,
            value,
            terminator,
            len: pos - group_start,
            data_len,
            info,
        };
        group_start = pos;
        index += 1;

        let is_final = group.is_final();
        groups.push(group);
        if is_final {
            return Scan::Done { groups, interrupted: false };
        }
        if data_len > 0 {
            return Scan::Done { groups, interrupted: true };
        }
    }
}

fn parse_integer_part(text: &str) -> i64 {
    let int = text.split('.').next().unwrap_or_default();
    match int {
        "" | "+" | "-" => 0,
        _ => int.parse().unwrap_or(0),
    }
}

enum Step {
    Continue,
    Defer(ContinuationKind, Vec<u8>),
    Switch(Language),
    Invalid,
}

/// Combination sequence interrupted by binary data; continues without root after the data.
#[derive(Debug, Clone, Copy)]
struct ComboResume {
    root: Root,
    next_index: usize,
}

#[derive(Default)]
pub struct PclParser {
    /// Groups of the buffered sequence not reported yet
    pending: VecDeque<Group>,
    /// Binary data still to be walked
    data_remaining: u64,
    combo: Option<ComboResume>,
    /// The last group announced more data than the input holds
    truncated: bool,
}

impl PclParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn label(ctx: &LinkContext) -> &'static str {
        if ctx.language == Language::Pcl3Gui { "PCL3GUI" } else { "PCL" }
    }

    fn check(ctx: &mut LinkContext, class: UnitClass, begin: i64, end: i64, combo: Option<&ComboGroup<'_>>) {
        if let Some(ovl) = ctx.overlay.as_mut() {
            overlay::check_action_pcl_seq(ovl, ctx.macro_level, class, begin, end, combo);
        }
    }

    fn process_group(&mut self, group: Group, cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> Option<Language> {
        let begin = cursor.file_offset;
        // a length field may announce more data than the input holds
        let available = ctx.file_size.saturating_sub((begin.max(0) as u64).saturating_add(group.len as u64));
        let data_len = group.data_len.min(available);
        let end = begin + group.len as i64 + data_len as i64;
        let class = group.class();

        let multi = group.index > 0 || !self.pending.is_empty();
        if multi && group.root.group() != NO_GROUP {
            let following: Vec<UnitClass> = self.pending.iter().map(|g| g.class()).collect();
            let combo = ComboGroup {
                index: group.index,
                root: group.root.bytes,
                terminator_offset: begin + group.len as i64 - 1,
                terminator_upper: group.is_final(),
                following: &following,
            };
            Self::check(ctx, class, begin, end, Some(&combo));
        } else {
            Self::check(ctx, class, begin, end, None);
        }

        let row = Row::new(RowKind::PclSequence, begin, ctx.analysis_level)
            .label(Self::label(ctx))
            .sequence(group.render())
            .description(group.describe());
        sink.add_row(ctx.annotate(row));
        log::trace!("PCL sequence {} at {begin}", group.render());

        match class {
            UnitClass::MacroControl(0) => ctx.macro_level += 1,
            UnitClass::MacroControl(1) => ctx.macro_level = (ctx.macro_level - 1).max(0),
            _ => {}
        }

        cursor.advance(group.len);
        if data_len > 0 {
            if options.pcl.show_binary_data {
                let what = group.info.map(|i| i.description).unwrap_or("binary");
                let row = Row::new(RowKind::PclData, cursor.file_offset, ctx.analysis_level)
                    .label("Data")
                    .description(format!("{data_len} bytes of {what} data"));
                sink.add_row(row);
            }
            self.data_remaining = data_len;
        }
        if data_len < group.data_len {
            sink.warning(
                cursor.file_offset,
                ctx.analysis_level,
                &format!("Binary data truncated: {data_len} of {} bytes present", group.data_len),
            );
            self.truncated = true;
        }

        if group.flags().contains(SeqFlags::ENTER_HPGL2) {
            return Some(Language::Hpgl2);
        }
        None
    }

    fn escape(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, sink: &mut dyn RowSink) -> Step {
        let rest = cursor.rest(buf);
        let Some(&second) = rest.get(1) else {
            return Step::Defer(ContinuationKind::None, vec![ESC]);
        };

        if second == b'%' {
            match match_marker(rest, UEL) {
                Some(true) => return Step::Switch(Language::Pjl),
                None => return Step::Defer(ContinuationKind::PclComplex, rest[..2].to_vec()),
                Some(false) => {}
            }
        }

        match second {
            0x21..=0x2F => {
                let (root, pos) = match rest.get(2) {
                    None => return Step::Defer(ContinuationKind::PclComplex, rest[..2].to_vec()),
                    Some(&g) if (0x60..=0x7E).contains(&g) => (Root { bytes: [ESC, second, g], len: 3 }, 3),
                    Some(_) => (Root { bytes: [ESC, second, 0], len: 2 }, 2),
                };
                match scan_groups(rest, pos, root, 0) {
                    Scan::NeedMore => Step::Defer(ContinuationKind::PclComplex, root.as_bytes().to_vec()),
                    Scan::Invalid { end } => self.invalid(rest, end, cursor, ctx, sink),
                    Scan::Done { groups, interrupted } => {
                        if interrupted {
                            self.combo = Some(ComboResume {
                                root,
                                next_index: groups.len(),
                            });
                        }
                        self.pending.extend(groups);
                        Step::Continue
                    }
                }
            }
            0x30..=0x7E => {
                let begin = cursor.file_offset;
                let info = table::lookup_two_char(second);
                let class = match info {
                    Some(i) if i.flags.contains(SeqFlags::RESET) => UnitClass::Reset,
                    Some(i) if i.flags.contains(SeqFlags::SETUP) => UnitClass::Setup,
                    _ => UnitClass::Content,
                };
                Self::check(ctx, class, begin, begin + 2, None);
                if class == UnitClass::Reset {
                    ctx.macro_level = 0;
                }
                let row = Row::new(RowKind::PclSequence, begin, ctx.analysis_level)
                    .label(Self::label(ctx))
                    .sequence(render_bytes(&rest[..2]))
                    .description(info.map(|i| i.description).unwrap_or("Unknown two-character sequence"));
                sink.add_row(ctx.annotate(row));
                cursor.advance(2);
                Step::Continue
            }
            _ => self.invalid(rest, 1, cursor, ctx, sink),
        }
    }

    fn invalid(&mut self, rest: &[u8], end: usize, cursor: &mut Cursor, ctx: &mut LinkContext, sink: &mut dyn RowSink) -> Step {
        let end = end.max(1);
        let begin = cursor.file_offset;
        Self::check(ctx, UnitClass::Setup, begin, begin + end as i64, None);
        let terminator = rest.get(end).map(|b| crate::print_char_value(*b)).unwrap_or_default();
        let row = Row::new(RowKind::MsgWarning, begin, ctx.analysis_level)
            .label("Warning")
            .sequence(render_bytes(&rest[..end]))
            .description(format!("Invalid escape sequence, terminated by {terminator}"));
        log::warn!("invalid PCL escape sequence at offset {begin}");
        sink.add_row(ctx.annotate(row));
        cursor.advance(end);
        Step::Invalid
    }

    fn resume_combo(&mut self, combo: ComboResume, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, sink: &mut dyn RowSink) -> Step {
        let rest = cursor.rest(buf);
        let starts_group = matches!(rest[0], b'+' | b'-' | b'.' | b'0'..=b'9' | 0x40..=0x5E | 0x60..=0x7E);
        if !starts_group {
            self.combo = None;
            return Step::Continue;
        }
        match scan_groups(rest, 0, combo.root, combo.next_index) {
            Scan::NeedMore => Step::Defer(ContinuationKind::PclComplex, Vec::new()),
            Scan::Invalid { end } => {
                self.combo = None;
                self.invalid(rest, end, cursor, ctx, sink)
            }
            Scan::Done { groups, interrupted } => {
                self.combo = if interrupted {
                    Some(ComboResume {
                        root: combo.root,
                        next_index: combo.next_index + groups.len(),
                    })
                } else {
                    None
                };
                self.pending.extend(groups);
                Step::Continue
            }
        }
    }

    fn control(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> Step {
        let byte = cursor.rest(buf)[0];
        let begin = cursor.file_offset;
        let class = if byte == FORM_FEED { UnitClass::PageMark } else { UnitClass::Content };
        Self::check(ctx, class, begin, begin + 1, None);
        if options.pcl.show_control_codes {
            let row = Row::new(RowKind::PclControl, begin, ctx.analysis_level)
                .label("Control")
                .sequence(render_bytes(&[byte]))
                .description(table::describe_control(byte));
            sink.add_row(ctx.annotate(row));
        }
        cursor.advance(1);
        Step::Continue
    }

    fn text(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> Step {
        let rest = cursor.rest(buf);
        let limit = options.effective_text_chunk();
        let mut len = 0;

        while len < rest.len() && len < limit {
            let b = rest[len];
            if b < 0x20 {
                break;
            }
            if matches!(b, b')' | b'(' | b'\'') {
                match match_pclxl_header(&rest[len..]) {
                    Some(true) if len == 0 => return Step::Switch(Language::PclXl),
                    Some(true) => break,
                    None if !ctx.eof => return Step::Defer(ContinuationKind::None, Vec::new()),
                    _ => {}
                }
            }
            if b == b'!' && options.pcl.detect_prescribe {
                match match_marker(&rest[len..], PRESCRIBE_INTRO) {
                    Some(true) if len == 0 => return Step::Switch(Language::Prescribe),
                    Some(true) => break,
                    None if !ctx.eof => return Step::Defer(ContinuationKind::None, Vec::new()),
                    _ => {}
                }
            }
            len += 1;
        }
        if len == rest.len() && len < limit && !ctx.eof {
            return Step::Defer(ContinuationKind::None, Vec::new());
        }

        let begin = cursor.file_offset;
        Self::check(ctx, UnitClass::Content, begin, begin + len as i64, None);
        if options.pcl.show_text {
            let row = Row::new(RowKind::PclText, begin, ctx.analysis_level)
                .label("Text")
                .sequence(render_bytes(&rest[..len]))
                .description(format!("{len} characters"));
            sink.add_row(ctx.annotate(row));
        }
        cursor.advance(len);
        Step::Continue
    }

    /// A unit is still incomplete at the end of the input; the rest is dumped.
    fn incomplete_at_eof(cursor: &mut Cursor, buf: &[u8], ctx: &mut LinkContext, sink: &mut dyn RowSink) {
        let rest = cursor.rest(buf);
        let begin = cursor.file_offset;
        Self::check(ctx, UnitClass::Setup, begin, begin + rest.len() as i64, None);
        let row = Row::new(RowKind::MsgWarning, begin, ctx.analysis_level)
            .label("Warning")
            .sequence(render_bytes(&rest[..rest.len().min(32)]))
            .description(format!("Incomplete sequence at end of file ({} bytes)", rest.len()));
        log::warn!("incomplete PCL sequence at end of file, offset {begin}");
        sink.add_row(ctx.annotate(row));
        cursor.advance(rest.len());
    }
}

impl PdlParser for PclParser {
    fn parse_block(&mut self, buf: &[u8], cursor: &mut Cursor, ctx: &mut LinkContext, options: &Options, sink: &mut dyn RowSink) -> BlockOutcome {
        ctx.take_continuation();
        let mut outcome = BlockOutcome::default();

        loop {
            if ctx.must_yield() {
                break;
            }
            if self.data_remaining > 0 {
                if cursor.is_empty() {
                    break;
                }
                let n = self.data_remaining.min(cursor.remaining as u64) as usize;
                cursor.advance(n);
                self.data_remaining -= n as u64;
                continue;
            }
            if let Some(group) = self.pending.pop_front() {
                let switch = self.process_group(group, cursor, ctx, options, sink);
                if std::mem::take(&mut self.truncated) {
                    outcome.bad_sequence = true;
                }
                if let Some(language) = switch {
                    self.pending.clear();
                    self.combo = None;
                    outcome.new_language = Some(language);
                    break;
                }
                continue;
            }
            if cursor.is_empty() {
                break;
            }

            let step = if let Some(combo) = self.combo {
                self.resume_combo(combo, buf, cursor, ctx, sink)
            } else {
                match cursor.rest(buf)[0] {
                    ESC => self.escape(buf, cursor, ctx, sink),
                    b if b < 0x20 => self.control(buf, cursor, ctx, options, sink),
                    _ => self.text(buf, cursor, ctx, options, sink),
                }
            };

            match step {
                Step::Continue => {}
                Step::Invalid => outcome.bad_sequence = true,
                Step::Switch(language) => {
                    outcome.new_language = Some(language);
                    break;
                }
                Step::Defer(kind, prefix) => {
                    if ctx.eof {
                        self.combo = None;
                        Self::incomplete_at_eof(cursor, buf, ctx, sink);
                        outcome.bad_sequence = true;
                    } else {
                        ctx.set_continuation(ContinuationRequest::defer(kind, cursor, &prefix));
                        break;
                    }
                }
            }
        }
        outcome
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.data_remaining = 0;
        self.combo = None;
    }
}

/// Rows describing a synthetic sequence, rendered through the same tables as parsed sequences.
pub fn render_sequence(seq: &[u8], offset: i64) -> Vec<Row> {
    let fallback = || vec![Row::new(RowKind::Overlay, offset, 0).label("Insert").sequence(render_bytes(seq))];
    if seq.len() < 3 || seq[0] != ESC {
        return fallback();
    }
    let (root, pos) = if (0x60..=0x7E).contains(&seq[2]) {
        (Root { bytes: [ESC, seq[1], seq[2]], len: 3 }, 3)
    } else {
        (Root { bytes: [ESC, seq[1], 0], len: 2 }, 2)
    };
    match scan_groups(seq, pos, root, 0) {
        Scan::Done { groups, .. } => groups
            .iter()
            .map(|g| Row::new(RowKind::Overlay, offset, 0).label("Insert").sequence(g.render()).description(g.describe()))
            .collect(),
        _ => fallback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_combination() {
        let root = Root { bytes: *b"\x1b&l", len: 3 };
        let Scan::Done { groups, interrupted } = scan_groups(b"\x1b&l1o2a0E", 3, root, 0) else {
            panic!("expected complete sequence");
        };
        assert!(!interrupted);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].len, 5);
        assert_eq!(groups[1].len, 2);
        assert_eq!(groups[2].render(), "<ESC>&l0E");
        assert!(groups[2].is_final());
    }

    #[test]
    fn test_scan_needs_more() {
        let root = Root { bytes: *b"\x1b*b", len: 3 };
        assert!(matches!(scan_groups(b"\x1b*b12", 3, root, 0), Scan::NeedMore));
    }

    #[test]
    fn test_scan_data_group_interrupts() {
        let root = Root { bytes: *b"\x1b*b", len: 3 };
        let Scan::Done { groups, interrupted } = scan_groups(b"\x1b*b2m4wABCD", 3, root, 0) else {
            panic!("expected groups");
        };
        assert!(interrupted);
        assert_eq!(groups[1].data_len, 4);
    }

    #[test]
    fn test_uel_is_parameterized() {
        let root = Root { bytes: [ESC, b'%', 0], len: 2 };
        let Scan::Done { groups, .. } = scan_groups(b"\x1b%-12345X", 2, root, 0) else {
            panic!("expected UEL");
        };
        assert!(groups[0].is_uel());
    }

    #[test]
    fn test_render_sequence_describes() {
        let rows = render_sequence(b"\x1b&f7Y", 0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sequence, "<ESC>&f7Y");
        assert_eq!(rows[0].description, "Macro ID: 7");
    }
}
