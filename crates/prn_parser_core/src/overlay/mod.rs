//! Make Overlay position/action state machine.
//!
//! The sub-parsers classify every unit they walk and call one of the `check_action_*` functions.
//! Those only update the [`OverlayState`]; bytes are moved by [`breakpoint`] which the
//! orchestrator calls whenever an action is pending.
//!
//! Output is produced lazily: kept units are not copied when they are seen but when the next
//! removal range is flushed (or at the end). `offset` is the input offset up to which the output
//! is synchronized, `skip_begin..skip_end` the removal range not flushed yet.

mod engine;
pub use engine::{ReadSeek, breakpoint, end_of_file, finish_at};

use crate::{Collision, OvlAct, OvlPos, OvlShow, OverlayState, OverlayTarget};

/// Overlay relevant class of a PCL (or PJL, HP-GL/2) unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitClass {
    /// Printable content, cursor positioning, graphics
    Content,
    /// Job or page setup that must not end up in a macro
    Setup,
    /// Download of a font, pattern, symbol set or macro body
    Resource,
    /// Form feed or page eject
    PageMark,
    /// `ESC E`
    Reset,
    /// UEL and PJL lines
    JobControl,
    /// `ESC&f#Y`
    MacroId(i32),
    /// `ESC&f#X`
    MacroControl(i32),
}

impl UnitClass {
    fn is_resource(&self) -> bool {
        match self {
            Self::Resource | Self::MacroId(_) => true,
            Self::MacroControl(v) => matches!(v, 0 | 1 | 9 | 10),
            _ => false,
        }
    }

    fn is_content(&self) -> bool {
        match self {
            Self::Content => true,
            Self::MacroControl(v) => matches!(v, 2 | 3),
            _ => false,
        }
    }
}

/// One group of a PCL combination sequence (`ESC&l1o2a0E`).
#[derive(Debug, Clone)]
pub struct ComboGroup<'a> {
    /// 0 for the group carrying the root introducer
    pub index: usize,
    /// `ESC`, parameterized character, group character
    pub root: [u8; 3],
    pub terminator_offset: i64,
    pub terminator_upper: bool,
    /// Classes of the groups following this one in the same sequence
    pub following: &'a [UnitClass],
}

/// Overlay relevant class of a PCL XL operator (with its attribute list) or embedded data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XlUnit {
    /// Stream header (binding + `HP-PCL XL` line)
    Header,
    /// BeginSession, OpenDataSource, CloseDataSource, media selection and other session level ops
    Session,
    EndSession,
    BeginPage,
    EndPage,
    /// Drawing, state and attribute operators inside a page
    Content,
    /// Font header and character downloads, font removal
    Resource,
    /// BeginStream, ReadStream, EndStream, RemoveStream
    StreamDefinition,
    /// Embedded data following an operator
    EmbeddedData,
    /// Whitespace or an unknown tag
    Filler,
}

fn reset_action(ovl: &mut OverlayState) {
    ovl.action = OvlAct::None;
    ovl.show = OvlShow::None;
}

fn keep(ovl: &mut OverlayState) {
    if ovl.skip_pending() {
        ovl.action = OvlAct::Remove;
    }
    ovl.show = OvlShow::Keep;
    ovl.last_kept = true;
}

fn remove(ovl: &mut OverlayState, begin: i64, end: i64) {
    if !ovl.skip_pending() {
        ovl.skip_begin = begin;
    }
    // units are contiguous; a gap left by an unchecked unit is removed along with it
    ovl.skip_end = end.max(ovl.skip_end);
    ovl.show = OvlShow::Remove;
    ovl.last_kept = false;
}

fn terminate(ovl: &mut OverlayState, begin: i64) {
    if !ovl.skip_pending() {
        ovl.skip_begin = begin;
        ovl.skip_end = begin;
    }
    ovl.position = OvlPos::AfterPages;
    ovl.action = OvlAct::Terminate;
    ovl.show = OvlShow::Terminate;
    ovl.last_kept = false;
}

fn collision(ovl: &mut OverlayState, identifier: Collision) {
    ovl.collision = Some(identifier);
    ovl.position = OvlPos::AfterPages;
    ovl.action = OvlAct::IdMacro;
    ovl.show = OvlShow::Collision;
}

/// Decision for a PCL unit; returns true if the unit is kept. Does not touch the I/O state.
fn apply_pcl_rules(ovl: &mut OverlayState, macro_level: i32, class: UnitClass, begin: i64, end: i64) -> bool {
    if ovl.position == OvlPos::AfterPages {
        terminate(ovl, begin);
        return false;
    }

    if macro_level > 0 || class.is_resource() {
        keep(ovl);
        return true;
    }

    match (ovl.position, class) {
        (OvlPos::BeforeFirstPage, c) if c.is_content() => {
            ovl.position = OvlPos::WithinFirstPage;
            ovl.pages = 1;
            keep(ovl);
            ovl.action = OvlAct::PageBegin;
            true
        }
        (OvlPos::BeforeFirstPage, _) => {
            remove(ovl, begin, end);
            false
        }
        (OvlPos::WithinFirstPage, UnitClass::PageMark) => {
            remove(ovl, begin, end);
            ovl.position = OvlPos::BetweenPages;
            ovl.action = OvlAct::PageEnd;
            false
        }
        (_, UnitClass::Reset | UnitClass::JobControl) => {
            terminate(ovl, begin);
            false
        }
        (OvlPos::WithinFirstPage, c) if c.is_content() => {
            keep(ovl);
            true
        }
        (OvlPos::WithinOtherPages, UnitClass::PageMark) => {
            remove(ovl, begin, end);
            ovl.position = OvlPos::BetweenPages;
            ovl.action = OvlAct::PageBoundary;
            false
        }
        (OvlPos::BetweenPages, c) if c.is_content() => {
            remove(ovl, begin, end);
            ovl.position = OvlPos::WithinOtherPages;
            ovl.pages += 1;
            ovl.action = OvlAct::PageBoundary;
            false
        }
        _ => {
            remove(ovl, begin, end);
            false
        }
    }
}

/// Decision for a PCL family unit inside a PCL XL overlay walk (PJL wrapper, stray PCL).
fn apply_foreign_rules(ovl: &mut OverlayState, class: UnitClass, begin: i64, end: i64) {
    match (ovl.position, class) {
        (OvlPos::BeforeFirstPage, _) => remove(ovl, begin, end),
        (_, UnitClass::Reset | UnitClass::JobControl) => terminate(ovl, begin),
        (OvlPos::AfterPages, _) => terminate(ovl, begin),
        _ => remove(ovl, begin, end),
    }
}

/// Checks a PCL family unit `[begin, end)` (including binary data that follows it).
pub fn check_action_pcl_seq(ovl: &mut OverlayState, macro_level: i32, class: UnitClass, begin: i64, end: i64, combo: Option<&ComboGroup<'_>>) {
    reset_action(ovl);

    if let UnitClass::MacroId(id) = class {
        if ovl.target == OverlayTarget::Pcl && ovl.encapsulate && id == ovl.macro_id {
            collision(ovl, Collision::MacroId(id));
            return;
        }
    }

    if ovl.target == OverlayTarget::PclXl {
        apply_foreign_rules(ovl, class, begin, end);
        return;
    }

    if let Some(group) = combo {
        if group.index == 0 {
            ovl.combo_kept_any = false;
        }
    }

    let pending_before = ovl.skip_pending();
    let skip_begin_before = ovl.skip_begin;
    let kept = apply_pcl_rules(ovl, macro_level, class, begin, end);
    let Some(group) = combo else {
        return;
    };
    if !kept {
        return;
    }

    // simulate the remaining groups to see whether this one ends the rewritten sequence
    let mut sim = ovl.clone();
    let tail_removed = group.following.iter().all(|c| {
        reset_action(&mut sim);
        !apply_pcl_rules(&mut sim, macro_level, *c, end, end)
    });
    let needs_root = group.index > 0 && !ovl.combo_kept_any;
    ovl.combo_kept_any = true;

    if needs_root || (tail_removed && !group.terminator_upper) {
        ovl.skip_begin = if pending_before { skip_begin_before } else { begin };
        ovl.skip_end = end;
        ovl.unit_begin = begin;
        ovl.adjust_terminator = group.terminator_offset;
        ovl.combo_root = group.root;
        ovl.adjust_root = needs_root;
        ovl.adjust_final = tail_removed;
        ovl.action = OvlAct::Adjust;
        ovl.show = OvlShow::Adjust;
    }
}

/// Checks a PCL XL operator together with its attribute list `[begin, end)`.
pub fn check_action_pclxl_operator(ovl: &mut OverlayState, unit: XlUnit, begin: i64, end: i64) {
    reset_action(ovl);

    if ovl.target == OverlayTarget::Pcl {
        // PCL XL has no place in a PCL macro
        if ovl.position == OvlPos::AfterPages {
            terminate(ovl, begin);
        } else {
            remove(ovl, begin, end);
        }
        return;
    }

    let resource = match unit {
        XlUnit::Resource => true,
        XlUnit::StreamDefinition => !ovl.encapsulate,
        XlUnit::EmbeddedData | XlUnit::Filler => ovl.last_kept,
        _ => false,
    };

    match (ovl.position, unit) {
        (OvlPos::AfterPages, _) => terminate(ovl, begin),
        (_, XlUnit::Header) => {
            remove(ovl, begin, end);
        }
        (_, _) if resource => {
            keep(ovl);
        }
        (_, XlUnit::EmbeddedData | XlUnit::Filler) => remove(ovl, begin, end),
        (OvlPos::BeforeFirstPage, XlUnit::BeginPage) => {
            remove(ovl, begin, end);
            ovl.position = OvlPos::WithinFirstPage;
            ovl.pages = 1;
            ovl.push_gs_pending = ovl.restore_state;
            ovl.action = OvlAct::PageBegin;
        }
        (OvlPos::BeforeFirstPage, _) => remove(ovl, begin, end),
        (OvlPos::WithinFirstPage, XlUnit::EndPage) => {
            if ovl.restore_state {
                remove(ovl, begin, end);
                ovl.unit_begin = begin;
                ovl.action = OvlAct::Replace;
                ovl.show = OvlShow::Replace;
            } else {
                remove(ovl, begin, end);
                ovl.action = OvlAct::PageEnd;
            }
            ovl.position = OvlPos::BetweenPages;
        }
        (OvlPos::WithinFirstPage, XlUnit::EndSession) => terminate(ovl, begin),
        (OvlPos::WithinFirstPage, XlUnit::Session) => remove(ovl, begin, end),
        (OvlPos::WithinFirstPage, _) => keep(ovl),
        (OvlPos::BetweenPages | OvlPos::WithinOtherPages, XlUnit::EndSession) => terminate(ovl, begin),
        (OvlPos::BetweenPages, XlUnit::BeginPage) => {
            remove(ovl, begin, end);
            ovl.position = OvlPos::WithinOtherPages;
            ovl.pages += 1;
            ovl.action = OvlAct::PageBoundary;
        }
        (OvlPos::WithinOtherPages, XlUnit::EndPage) => {
            remove(ovl, begin, end);
            ovl.position = OvlPos::BetweenPages;
            ovl.action = OvlAct::PageBoundary;
        }
        _ => remove(ovl, begin, end),
    }
}

/// Checks an attribute value; a `StreamName` equal to the overlay stream name aborts the walk.
pub fn check_action_pclxl_attribute(ovl: &mut OverlayState, attribute: u16, value: &[u8]) {
    if ovl.target != OverlayTarget::PclXl || !ovl.encapsulate || attribute != crate::pclxl::ATTR_STREAM_NAME {
        return;
    }
    if value == ovl.stream_name.as_bytes() {
        reset_action(ovl);
        collision(ovl, Collision::StreamName(ovl.stream_name.clone()));
    }
}

/// Called at the start of every operator sequence; inserts PushGS at the first one inside the first page.
pub fn check_action_pclxl_push_gs(ovl: &mut OverlayState, at: i64) {
    if !ovl.push_gs_pending || ovl.position != OvlPos::WithinFirstPage {
        return;
    }
    reset_action(ovl);
    ovl.push_gs_pending = false;
    ovl.unit_begin = at;
    ovl.action = OvlAct::PushGS;
    ovl.show = OvlShow::Insert;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcl_state() -> OverlayState {
        OverlayState::new(OverlayTarget::Pcl, 0)
    }

    #[test]
    fn test_removal_ranges_coalesce() {
        let mut ovl = pcl_state();
        check_action_pcl_seq(&mut ovl, 0, UnitClass::JobControl, 0, 9, None);
        check_action_pcl_seq(&mut ovl, 0, UnitClass::Reset, 9, 11, None);
        check_action_pcl_seq(&mut ovl, 0, UnitClass::Setup, 11, 16, None);
        assert_eq!((ovl.skip_begin, ovl.skip_end), (0, 16));
        assert_eq!(ovl.action, OvlAct::None);

        check_action_pcl_seq(&mut ovl, 0, UnitClass::Content, 16, 20, None);
        assert_eq!(ovl.action, OvlAct::PageBegin);
        assert_eq!(ovl.position, OvlPos::WithinFirstPage);
    }

    #[test]
    fn test_page_walk() {
        let mut ovl = pcl_state();
        check_action_pcl_seq(&mut ovl, 0, UnitClass::Content, 0, 5, None);
        check_action_pcl_seq(&mut ovl, 0, UnitClass::PageMark, 5, 6, None);
        assert_eq!(ovl.action, OvlAct::PageEnd);
        assert_eq!(ovl.position, OvlPos::BetweenPages);

        check_action_pcl_seq(&mut ovl, 0, UnitClass::Content, 6, 10, None);
        assert_eq!(ovl.position, OvlPos::WithinOtherPages);
        assert_eq!(ovl.show, OvlShow::Remove);

        check_action_pcl_seq(&mut ovl, 0, UnitClass::Resource, 10, 30, None);
        assert_eq!(ovl.show, OvlShow::Keep);
        assert_eq!(ovl.action, OvlAct::Remove);

        check_action_pcl_seq(&mut ovl, 0, UnitClass::Reset, 30, 32, None);
        assert_eq!(ovl.action, OvlAct::Terminate);
        assert_eq!(ovl.position, OvlPos::AfterPages);
    }

    #[test]
    fn test_macro_collision() {
        let mut ovl = pcl_state();
        ovl.encapsulate = true;
        ovl.macro_id = 7;
        check_action_pcl_seq(&mut ovl, 0, UnitClass::MacroId(6), 0, 5, None);
        assert_eq!(ovl.action, OvlAct::None);
        check_action_pcl_seq(&mut ovl, 0, UnitClass::MacroId(7), 5, 10, None);
        assert_eq!(ovl.action, OvlAct::IdMacro);
        assert_eq!(ovl.collision, Some(Collision::MacroId(7)));
    }

    #[test]
    fn test_combo_last_group_removed() {
        let mut ovl = pcl_state();
        check_action_pcl_seq(&mut ovl, 0, UnitClass::Content, 0, 1, None);
        let following = [UnitClass::Setup];
        let group = ComboGroup {
            index: 0,
            root: *b"\x1b&l",
            terminator_offset: 5,
            terminator_upper: false,
            following: &following,
        };
        check_action_pcl_seq(&mut ovl, 0, UnitClass::Content, 1, 6, Some(&group));
        assert_eq!(ovl.action, OvlAct::Adjust);
        assert!(ovl.adjust_final);
        assert_eq!((ovl.skip_begin, ovl.skip_end, ovl.unit_begin), (1, 6, 1));
    }

    #[test]
    fn test_pclxl_page_cycle() {
        let mut ovl = OverlayState::new(OverlayTarget::PclXl, 0);
        ovl.restore_state = true;
        check_action_pclxl_operator(&mut ovl, XlUnit::Header, 0, 20);
        check_action_pclxl_operator(&mut ovl, XlUnit::Session, 20, 30);
        check_action_pclxl_operator(&mut ovl, XlUnit::BeginPage, 30, 40);
        assert_eq!(ovl.action, OvlAct::PageBegin);
        assert!(ovl.push_gs_pending);

        check_action_pclxl_push_gs(&mut ovl, 40);
        assert_eq!(ovl.action, OvlAct::PushGS);

        check_action_pclxl_operator(&mut ovl, XlUnit::Content, 40, 50);
        assert_eq!(ovl.show, OvlShow::Keep);
        check_action_pclxl_operator(&mut ovl, XlUnit::EndPage, 50, 51);
        assert_eq!(ovl.action, OvlAct::Replace);
        check_action_pclxl_operator(&mut ovl, XlUnit::EndSession, 51, 52);
        assert_eq!(ovl.action, OvlAct::Terminate);
    }

    #[test]
    fn test_pclxl_header_within_page_removed() {
        let mut ovl = OverlayState::new(OverlayTarget::PclXl, 0);
        check_action_pclxl_operator(&mut ovl, XlUnit::BeginPage, 0, 10);
        check_action_pclxl_operator(&mut ovl, XlUnit::Content, 10, 20);
        assert_eq!(ovl.show, OvlShow::Keep);
        // removal before the page already flushed
        ovl.clear_skip();

        check_action_pclxl_operator(&mut ovl, XlUnit::Header, 20, 40);
        assert_eq!(ovl.show, OvlShow::Remove);
        assert_eq!((ovl.skip_begin, ovl.skip_end), (20, 40));
        assert_eq!(ovl.position, OvlPos::WithinFirstPage);
    }

    #[test]
    fn test_stream_name_collision() {
        let mut ovl = OverlayState::new(OverlayTarget::PclXl, 0);
        ovl.encapsulate = true;
        ovl.stream_name = "OVL".to_string();
        check_action_pclxl_attribute(&mut ovl, crate::pclxl::ATTR_STREAM_NAME, b"OTHER");
        assert_eq!(ovl.action, OvlAct::None);
        check_action_pclxl_attribute(&mut ovl, crate::pclxl::ATTR_STREAM_NAME, b"OVL");
        assert_eq!(ovl.action, OvlAct::IdMacro);
    }
}
