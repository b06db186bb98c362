// ASCII control character codes
pub const ETX: u8 = 0x03;
pub const BACKSPACE: u8 = 0x08;
pub const TAB: u8 = 0x09;
pub const LINE_FEED: u8 = 0x0A;
pub const FORM_FEED: u8 = 0x0C;
pub const CARRIAGE_RETURN: u8 = 0x0D;
pub const SHIFT_OUT: u8 = 0x0E;
pub const SHIFT_IN: u8 = 0x0F;
pub const ESC: u8 = 0x1B;
pub const SPACE: u8 = 0x20;

/// Universal Exit Language: `<ESC>%-12345X`
pub const UEL: &[u8] = b"\x1b%-12345X";

/// Introducer of a Prescribe command block
pub const PRESCRIBE_INTRO: &[u8] = b"!R!";

/// Text following the binding byte of a PCL XL stream header
pub const PCLXL_HEADER_TAG: &[u8] = b" HP-PCL XL";

/// Length of the longest fixed marker any parser needs to look ahead for.
pub const MAX_MARKER_LEN: usize = 11;

/// Checks whether `data` begins with `marker`.
///
/// Returns `None` when `data` is a strict prefix of `marker`, i.e. more bytes are needed before
/// a decision can be made.
pub fn match_marker(data: &[u8], marker: &[u8]) -> Option<bool> {
    if data.len() >= marker.len() {
        Some(data.starts_with(marker))
    } else if marker.starts_with(data) {
        None
    } else {
        Some(false)
    }
}

/// Same as [`match_marker`] with ASCII case folding.
pub fn match_marker_ignore_case(data: &[u8], marker: &[u8]) -> Option<bool> {
    let n = data.len().min(marker.len());
    if !data[..n].eq_ignore_ascii_case(&marker[..n]) {
        return Some(false);
    }
    if n < marker.len() { None } else { Some(true) }
}

/// Matches a PCL XL stream header (`) HP-PCL XL`, `( HP-PCL XL` or `' HP-PCL XL`).
pub fn match_pclxl_header(data: &[u8]) -> Option<bool> {
    match data.first() {
        None => None,
        Some(b')' | b'(' | b'\'') => match_marker(&data[1..], PCLXL_HEADER_TAG),
        Some(_) => Some(false),
    }
}
