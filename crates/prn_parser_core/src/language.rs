//! Printer languages and start-of-stream classification

use std::fmt::Display;

use crate::control_codes::{PRESCRIBE_INTRO, UEL, match_marker, match_marker_ignore_case, match_pclxl_header};

/// Page description (or job control) language active at some point of a print stream.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum Language {
    #[default]
    Pcl,
    Pcl3Gui,
    PclXl,
    Hpgl2,
    Pjl,
    PostScript,
    Prescribe,
    Xl2hb,
    Unknown,
}

impl Language {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pcl => "PCL",
            Self::Pcl3Gui => "PCL3GUI",
            Self::PclXl => "PCL XL",
            Self::Hpgl2 => "HP-GL/2",
            Self::Pjl => "PJL",
            Self::PostScript => "PostScript",
            Self::Prescribe => "Prescribe",
            Self::Xl2hb => "XL2HB",
            Self::Unknown => "Unknown",
        }
    }

    /// Maps the value of a `@PJL ENTER LANGUAGE = ...` command.
    pub fn from_pjl_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "PCL" => Self::Pcl,
            "PCL3GUI" => Self::Pcl3Gui,
            "PCLXL" | "PCL XL" | "PCL-XL" => Self::PclXl,
            "HPGL2" | "HP-GL/2" | "HPGL" => Self::Hpgl2,
            "POSTSCRIPT" => Self::PostScript,
            "PRESCRIBE" => Self::Prescribe,
            "XL2HB" => Self::Xl2hb,
            _ => Self::Unknown,
        }
    }

    /// PCL and its PCL3GUI variant share one sub-parser.
    pub fn is_pcl_family(&self) -> bool {
        matches!(self, Self::Pcl | Self::Pcl3Gui)
    }

    /// Languages whose content is not decoded, only walked until the next UEL.
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::PostScript | Self::Xl2hb)
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Classifies the content starting at `data`.
///
/// Returns `None` if `data` is too short to decide and more bytes may follow (`eof == false`).
/// PCL is the fallback for anything that does not carry a recognisable signature.
pub fn sniff_language(data: &[u8], eof: bool) -> Option<Language> {
    let undecided = |m: Option<bool>| m.is_none() && !eof;

    let uel = match_marker(data, UEL);
    let pjl = match_marker_ignore_case(data, b"@PJL");
    let pclxl = match_pclxl_header(data);
    let ps = match_marker(data, b"%!");
    let prescribe = match_marker(data, PRESCRIBE_INTRO);

    if uel == Some(true) || pjl == Some(true) {
        return Some(Language::Pjl);
    }
    if pclxl == Some(true) {
        return Some(Language::PclXl);
    }
    if ps == Some(true) {
        return Some(Language::PostScript);
    }
    if prescribe == Some(true) {
        return Some(Language::Prescribe);
    }
    if data.is_empty() && !eof {
        return None;
    }
    if undecided(uel) || undecided(pjl) || undecided(pclxl) || undecided(ps) || undecided(prescribe) {
        return None;
    }
    Some(Language::Pcl)
}
