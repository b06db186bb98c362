//! PCL escape sequence descriptions

use std::collections::HashMap;

use bitflags::bitflags;

bitflags! {
    /// Properties of a PCL sequence that drive the walk and overlay generation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SeqFlags: u16 {
        /// Value field gives the length of binary data following the sequence
        const DATA = 1 << 0;
        /// Printer reset
        const RESET = 1 << 1;
        /// Ejects the current page
        const PAGE_MARK = 1 << 2;
        /// Job/page setup that must not end up inside an overlay macro
        const SETUP = 1 << 3;
        /// Defines a resource (font, pattern, macro, symbol set) that is kept on every page
        const RESOURCE = 1 << 4;
        /// `ESC&f#Y` macro identifier
        const MACRO_ID = 1 << 5;
        /// `ESC&f#X` macro control
        const MACRO_CONTROL = 1 << 6;
        /// `ESC%#B` switches to HP-GL/2
        const ENTER_HPGL2 = 1 << 7;
        /// Page setup value 0 ejects the page (paper source 0)
        const EJECT_ON_ZERO = 1 << 8;
    }
}

/// Table entry of a parameterized or two-character sequence.
#[derive(Debug, Clone, Copy)]
pub struct SeqInfo {
    pub description: &'static str,
    pub flags: SeqFlags,
}

const fn info(description: &'static str, flags: SeqFlags) -> SeqInfo {
    SeqInfo { description, flags }
}

const N: SeqFlags = SeqFlags::empty();
const D: SeqFlags = SeqFlags::DATA;
const S: SeqFlags = SeqFlags::SETUP;
const R: SeqFlags = SeqFlags::RESOURCE;
const DR: SeqFlags = SeqFlags::DATA.union(SeqFlags::RESOURCE);

/// Group character value used for sequences without one (e.g. `ESC(8U`).
pub const NO_GROUP: u8 = 0;

#[rustfmt::skip]
static PARAMETERIZED: &[(u8, u8, u8, SeqInfo)] = &[
    (b'&', b'l', b'A', info("Page Size", S)),
    (b'&', b'l', b'C', info("Vertical Motion Index", N)),
    (b'&', b'l', b'D', info("Line Spacing", N)),
    (b'&', b'l', b'E', info("Top Margin", N)),
    (b'&', b'l', b'F', info("Text Length", N)),
    (b'&', b'l', b'G', info("Output Bin", S)),
    (b'&', b'l', b'H', info("Paper Source", S.union(SeqFlags::EJECT_ON_ZERO))),
    (b'&', b'l', b'L', info("Perforation Skip", N)),
    (b'&', b'l', b'M', info("Media Type", S)),
    (b'&', b'l', b'O', info("Orientation", S)),
    (b'&', b'l', b'P', info("Page Length", S)),
    (b'&', b'l', b'S', info("Simplex/Duplex Print", S)),
    (b'&', b'l', b'T', info("Job Separation", S)),
    (b'&', b'l', b'U', info("Left Offset Registration", S)),
    (b'&', b'l', b'X', info("Number of Copies", S)),
    (b'&', b'l', b'Z', info("Top Offset Registration", S)),
    (b'&', b'a', b'C', info("Horizontal Cursor Position (Columns)", N)),
    (b'&', b'a', b'G', info("Duplex Page Side Selection", S)),
    (b'&', b'a', b'H', info("Horizontal Cursor Position (Decipoints)", N)),
    (b'&', b'a', b'L', info("Left Margin", N)),
    (b'&', b'a', b'M', info("Right Margin", N)),
    (b'&', b'a', b'N', info("Negative Motion", N)),
    (b'&', b'a', b'P', info("Print Direction", N)),
    (b'&', b'a', b'R', info("Vertical Cursor Position (Rows)", N)),
    (b'&', b'a', b'V', info("Vertical Cursor Position (Decipoints)", N)),
    (b'&', b'b', b'W', info("AppleTalk Configuration", D)),
    (b'&', b'd', b'@', info("Underline Disable", N)),
    (b'&', b'd', b'D', info("Underline Enable", N)),
    (b'&', b'f', b'S', info("Push/Pop Cursor Position", N)),
    (b'&', b'f', b'X', info("Macro Control", SeqFlags::MACRO_CONTROL)),
    (b'&', b'f', b'Y', info("Macro ID", SeqFlags::MACRO_ID)),
    (b'&', b'k', b'G', info("Line Termination", N)),
    (b'&', b'k', b'H', info("Horizontal Motion Index", N)),
    (b'&', b'k', b'S', info("Pitch Mode", N)),
    (b'&', b'n', b'W', info("Alphanumeric ID", D)),
    (b'&', b'p', b'C', info("Palette Control", N)),
    (b'&', b'p', b'S', info("Palette Select", N)),
    (b'&', b'p', b'I', info("Palette Control ID", N)),
    (b'&', b'p', b'X', info("Transparent Print Data", D)),
    (b'&', b'r', b'F', info("Flush All Pages", S)),
    (b'&', b's', b'C', info("End-of-Line Wrap", N)),
    (b'&', b't', b'P', info("Text Parsing Method", N)),
    (b'&', b'u', b'D', info("Unit of Measure", N)),
    (b'(', b's', b'B', info("Primary Font: Stroke Weight", N)),
    (b'(', b's', b'H', info("Primary Font: Pitch", N)),
    (b'(', b's', b'P', info("Primary Font: Spacing", N)),
    (b'(', b's', b'S', info("Primary Font: Style", N)),
    (b'(', b's', b'T', info("Primary Font: Typeface", N)),
    (b'(', b's', b'V', info("Primary Font: Height", N)),
    (b'(', b's', b'W', info("Download Character", DR)),
    (b'(', b'f', b'W', info("Define Symbol Set", DR)),
    (b'(', NO_GROUP, b'@', info("Primary Font: Default", N)),
    (b'(', NO_GROUP, b'X', info("Primary Font: Select by ID", N)),
    (b')', b's', b'B', info("Secondary Font: Stroke Weight", N)),
    (b')', b's', b'H', info("Secondary Font: Pitch", N)),
    (b')', b's', b'P', info("Secondary Font: Spacing", N)),
    (b')', b's', b'S', info("Secondary Font: Style", N)),
    (b')', b's', b'T', info("Secondary Font: Typeface", N)),
    (b')', b's', b'V', info("Secondary Font: Height", N)),
    (b')', b's', b'W', info("Font Header", DR)),
    (b')', NO_GROUP, b'@', info("Secondary Font: Default", N)),
    (b')', NO_GROUP, b'X', info("Secondary Font: Select by ID", N)),
    (b'*', b'b', b'M', info("Raster Compression Method", N)),
    (b'*', b'b', b'V', info("Transfer Raster Data by Plane", D)),
    (b'*', b'b', b'W', info("Transfer Raster Data by Row/Block", D)),
    (b'*', b'b', b'Y', info("Raster Y Offset", N)),
    (b'*', b'c', b'A', info("Rectangle Width (Dots)", N)),
    (b'*', b'c', b'B', info("Rectangle Height (Dots)", N)),
    (b'*', b'c', b'D', info("Font ID", R)),
    (b'*', b'c', b'E', info("Character Code", R)),
    (b'*', b'c', b'F', info("Font Control", R)),
    (b'*', b'c', b'G', info("Area Fill / Pattern ID", N)),
    (b'*', b'c', b'H', info("Rectangle Width (Decipoints)", N)),
    (b'*', b'c', b'K', info("HP-GL/2 Plot Horizontal Size", N)),
    (b'*', b'c', b'L', info("HP-GL/2 Plot Vertical Size", N)),
    (b'*', b'c', b'P', info("Fill Rectangular Area", N)),
    (b'*', b'c', b'Q', info("Pattern Control", R)),
    (b'*', b'c', b'R', info("Symbol Set ID Code", R)),
    (b'*', b'c', b'S', info("Symbol Set Control", R)),
    (b'*', b'c', b'T', info("Picture Frame Anchor Point", N)),
    (b'*', b'c', b'V', info("Rectangle Height (Decipoints)", N)),
    (b'*', b'c', b'W', info("User-Defined Pattern", DR)),
    (b'*', b'c', b'X', info("Picture Frame Horizontal Size", N)),
    (b'*', b'c', b'Y', info("Picture Frame Vertical Size", N)),
    (b'*', b'g', b'W', info("Configure Raster Data", D)),
    (b'*', b'i', b'W', info("Viewing Illuminant", D)),
    (b'*', b'l', b'O', info("Logical Operation", N)),
    (b'*', b'l', b'R', info("Pixel Placement", N)),
    (b'*', b'l', b'W', info("Color Lookup Tables", D)),
    (b'*', b'm', b'W', info("Download Dither Matrix", D)),
    (b'*', b'o', b'W', info("Driver Configuration", D)),
    (b'*', b'p', b'P', info("Push/Pop Palette", N)),
    (b'*', b'p', b'R', info("Pattern Reference Point", N)),
    (b'*', b'p', b'X', info("Horizontal Cursor Position (Dots)", N)),
    (b'*', b'p', b'Y', info("Vertical Cursor Position (Dots)", N)),
    (b'*', b'r', b'A', info("Start Raster Graphics", N)),
    (b'*', b'r', b'B', info("End Raster Graphics (B)", N)),
    (b'*', b'r', b'C', info("End Raster Graphics (C)", N)),
    (b'*', b'r', b'F', info("Raster Presentation Mode", N)),
    (b'*', b'r', b'S', info("Source Raster Width", N)),
    (b'*', b'r', b'T', info("Source Raster Height", N)),
    (b'*', b'r', b'U', info("Simple Color", N)),
    (b'*', b't', b'J', info("Render Algorithm", N)),
    (b'*', b't', b'R', info("Raster Resolution", N)),
    (b'*', b'v', b'A', info("Color Component 1", N)),
    (b'*', b'v', b'B', info("Color Component 2", N)),
    (b'*', b'v', b'C', info("Color Component 3", N)),
    (b'*', b'v', b'I', info("Assign Color Index", N)),
    (b'*', b'v', b'N', info("Source Transparency Mode", N)),
    (b'*', b'v', b'O', info("Pattern Transparency Mode", N)),
    (b'*', b'v', b'S', info("Foreground Color", N)),
    (b'*', b'v', b'T', info("Select Current Pattern", N)),
    (b'*', b'v', b'W', info("Configure Image Data", D)),
    (b'%', NO_GROUP, b'A', info("Enter PCL Mode", N)),
    (b'%', NO_GROUP, b'B', info("Enter HP-GL/2 Mode", SeqFlags::ENTER_HPGL2)),
];

#[rustfmt::skip]
static TWO_CHAR: &[(u8, SeqInfo)] = &[
    (b'E', info("Printer Reset", SeqFlags::RESET)),
    (b'9', info("Clear Horizontal Margins", N)),
    (b'=', info("Half Line Feed", N)),
    (b'Y', info("Display Functions On", N)),
    (b'Z', info("Display Functions Off", N)),
    (b'z', info("Self Test", S)),
];

lazy_static::lazy_static! {
    static ref PARAMETERIZED_LUT: HashMap<(u8, u8, u8), SeqInfo> = {
        let mut map = HashMap::with_capacity(PARAMETERIZED.len());
        for (param, group, term, entry) in PARAMETERIZED {
            map.insert((*param, *group, *term), *entry);
        }
        map
    };
}

/// Looks up `ESC <param> [<group>] <value> <terminator>`; the terminator is matched upper case.
pub fn lookup_parameterized(param: u8, group: u8, terminator: u8) -> Option<SeqInfo> {
    let term = terminator.to_ascii_uppercase();
    if let Some(entry) = PARAMETERIZED_LUT.get(&(param, group, term)) {
        return Some(*entry);
    }
    if group == NO_GROUP && term.is_ascii_uppercase() {
        match param {
            b'(' => return Some(info("Primary Symbol Set", N)),
            b')' => return Some(info("Secondary Symbol Set", N)),
            _ => {}
        }
    }
    None
}

pub fn lookup_two_char(byte: u8) -> Option<SeqInfo> {
    TWO_CHAR.iter().find(|(b, _)| *b == byte).map(|(_, entry)| *entry)
}

/// Human readable interpretation of well known values.
pub fn describe_value(param: u8, group: u8, terminator: u8, value: i64) -> Option<&'static str> {
    let term = terminator.to_ascii_uppercase();
    let text = match (param, group, term, value) {
        (b'&', b'l', b'O', 0) => "Portrait",
        (b'&', b'l', b'O', 1) => "Landscape",
        (b'&', b'l', b'O', 2) => "Reverse Portrait",
        (b'&', b'l', b'O', 3) => "Reverse Landscape",
        (b'&', b'l', b'A', 1) => "Executive",
        (b'&', b'l', b'A', 2) => "Letter",
        (b'&', b'l', b'A', 3) => "Legal",
        (b'&', b'l', b'A', 6) => "Ledger",
        (b'&', b'l', b'A', 26) => "A4",
        (b'&', b'l', b'A', 27) => "A3",
        (b'&', b'l', b'A', 25) => "A5",
        (b'&', b'l', b'H', 0) => "Eject Page",
        (b'&', b'l', b'H', 1) => "Main Tray",
        (b'&', b'l', b'H', 2) => "Manual Feed",
        (b'&', b'l', b'H', 4) => "Upper Tray",
        (b'&', b'l', b'H', 5) => "Lower Tray",
        (b'&', b'l', b'H', 7) => "Auto Select",
        (b'&', b'l', b'S', 0) => "Simplex",
        (b'&', b'l', b'S', 1) => "Duplex Long Edge",
        (b'&', b'l', b'S', 2) => "Duplex Short Edge",
        (b'&', b'f', b'X', 0) => "Start Macro Definition",
        (b'&', b'f', b'X', 1) => "Stop Macro Definition",
        (b'&', b'f', b'X', 2) => "Execute Macro",
        (b'&', b'f', b'X', 3) => "Call Macro",
        (b'&', b'f', b'X', 4) => "Enable Overlay",
        (b'&', b'f', b'X', 5) => "Disable Overlay",
        (b'&', b'f', b'X', 6) => "Delete All Macros",
        (b'&', b'f', b'X', 7) => "Delete Temporary Macros",
        (b'&', b'f', b'X', 8) => "Delete Macro ID",
        (b'&', b'f', b'X', 9) => "Make Macro Temporary",
        (b'&', b'f', b'X', 10) => "Make Macro Permanent",
        (b'&', b'f', b'S', 0) => "Push",
        (b'&', b'f', b'S', 1) => "Pop",
        (b'*', b'b', b'M', 0) => "Unencoded",
        (b'*', b'b', b'M', 1) => "Run-Length",
        (b'*', b'b', b'M', 2) => "TIFF",
        (b'*', b'b', b'M', 3) => "Delta Row",
        (b'*', b'b', b'M', 5) => "Adaptive",
        (b'&', b'u', b'D', 300) => "300 units/inch",
        (b'&', b'u', b'D', 600) => "600 units/inch",
        (b'%', NO_GROUP, b'B', 0) => "Previous Pen Position",
        (b'%', NO_GROUP, b'B', 1) => "Current PCL Cursor Position",
        (b'%', NO_GROUP, b'A', 0) => "Previous PCL Cursor Position",
        (b'%', NO_GROUP, b'A', 1) => "Current HP-GL/2 Pen Position",
        _ => return None,
    };
    Some(text)
}

/// Description of a C0 control byte inside PCL text.
pub fn describe_control(byte: u8) -> &'static str {
    match byte {
        0x08 => "Backspace",
        0x09 => "Horizontal Tab",
        0x0A => "Line Feed",
        0x0C => "Form Feed",
        0x0D => "Carriage Return",
        0x0E => "Shift Out (Secondary Font)",
        0x0F => "Shift In (Primary Font)",
        0x00 => "Null",
        _ => "Control Code",
    }
}
