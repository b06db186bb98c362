//! Analysis error types and diagnostic levels

use std::fmt::Display;

use thiserror::Error;

/// Severity level for diagnostic rows
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub enum ErrorLevel {
    /// Informational message (e.g., unrecognized but harmless sequences)
    Info = 0,
    /// Warning about potentially problematic input (parsing continues)
    Warning = 1,
    /// Error that aborts the current pass
    Error = 2,
}

impl ErrorLevel {
    /// Returns a human-readable string for the error level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl Display for ErrorLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fatal errors of an analysis or overlay pass.
///
/// Everything that is not listed here (invalid sequences, unresolved continuations at end of
/// file, unsupported languages) is reported as a row and the walk carries on.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open '{path}': {source}")]
    Open {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Macro identifier {id} is already defined in the source stream")]
    MacroIdentifierCollision { id: i32 },

    #[error("Stream name '{name}' is already defined in the source stream")]
    StreamNameCollision { name: String },

    #[error("Language {0} cannot be used as overlay source")]
    UnsupportedOverlayLanguage(crate::Language),
}

impl AnalysisError {
    /// True for the errors that abort overlay generation because of the source content.
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::MacroIdentifierCollision { .. } | Self::StreamNameCollision { .. })
    }
}

/// Format a byte value for human-readable row descriptions.
///
/// Returns a string with both hex and human-readable representation:
/// - Printable ASCII (0x20-0x7E): "0x41 ('A')"
/// - Control characters with names: "0x0A (LF)", "0x09 (HT)", etc.
/// - Other bytes: "0x00"
pub fn print_char_value(byte: u8) -> String {
    match control_name(byte) {
        Some(name) => format!("0x{:02X} ({})", byte, name),
        None if (0x20..=0x7E).contains(&byte) => format!("0x{:02X} ('{}')", byte, byte as char),
        None => format!("0x{:02X}", byte),
    }
}

/// Mnemonic of a C0 control byte (or DEL), as shown in sequence columns.
pub fn control_name(byte: u8) -> Option<&'static str> {
    const NAMES: [&str; 32] = [
        "NUL", "SOH", "STX", "ETX", "EOT", "ENQ", "ACK", "BEL", "BS", "HT", "LF", "VT", "FF", "CR", "SO", "SI", "DLE", "DC1", "DC2", "DC3", "DC4", "NAK",
        "SYN", "ETB", "CAN", "EM", "SUB", "ESC", "FS", "GS", "RS", "US",
    ];
    match byte {
        0x00..=0x1F => Some(NAMES[byte as usize]),
        0x7F => Some("DEL"),
        _ => None,
    }
}

/// Render raw bytes for the sequence column: printable ASCII as-is, control bytes as `<ESC>`
/// style mnemonics and anything else as `<xx>` hex.
pub fn render_bytes(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len() + 8);
    for &b in bytes {
        match control_name(b) {
            Some(name) => {
                result.push('<');
                result.push_str(name);
                result.push('>');
            }
            None if b < 0x80 => result.push(b as char),
            None => result.push_str(&format!("<{:02x}>", b)),
        }
    }
    result
}

/// Render bytes as space separated hex pairs.
pub fn render_hex(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            result.push(' ');
        }
        result.push_str(&format!("{:02x}", b));
    }
    result
}
