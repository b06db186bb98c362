//! Read-only analysis options.
//!
//! The inclusion flags only decide which rows are emitted; every byte of the input is walked
//! regardless of them.

use serde::{Deserialize, Serialize};

use crate::Language;

/// Default size of a block read from the input.
pub const DEFAULT_BLOCK_SIZE: usize = 2048;

/// Smallest block size accepted; anything below is raised to it.
pub const MIN_BLOCK_SIZE: usize = 16;

/// Default cap for nested embedded-data analysis.
pub const DEFAULT_MAX_EMBED_DEPTH: u32 = 16;

/// Number of payload bytes shown per text/data row.
pub const DEFAULT_TEXT_CHUNK: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OffsetBase {
    #[default]
    Decimal,
    Hexadecimal,
}

impl OffsetBase {
    pub fn format(&self, offset: i64) -> String {
        match self {
            Self::Decimal => format!("{offset:>10}"),
            Self::Hexadecimal => format!("{offset:>08x}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PclOptions {
    /// Show runs of printable text
    pub show_text: bool,
    /// Show control codes (CR, LF, FF, ...)
    pub show_control_codes: bool,
    /// Show a row for the binary data that follows data-carrying sequences
    pub show_binary_data: bool,
    /// Switch to Prescribe when a `!R!` introducer is seen in the text stream
    pub detect_prescribe: bool,
}

impl Default for PclOptions {
    fn default() -> Self {
        Self {
            show_text: true,
            show_control_codes: true,
            show_binary_data: true,
            detect_prescribe: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PclXlOptions {
    /// Show one row per attribute (value + attribute id)
    pub show_attributes: bool,
    /// Show rows for embedded data blocks
    pub show_embedded_data: bool,
    /// Show whitespace bytes between operators
    pub show_whitespace: bool,
    /// Decode font headers and characters downloaded with ReadFontHeader / ReadChar
    pub decode_fonts: bool,
    /// Analyse user-defined stream contents
    pub decode_streams: bool,
    /// Analyse PCL passed through with the PassThrough operator
    pub decode_pass_through: bool,
}

impl Default for PclXlOptions {
    fn default() -> Self {
        Self {
            show_attributes: true,
            show_embedded_data: true,
            show_whitespace: false,
            decode_fonts: true,
            decode_streams: true,
            decode_pass_through: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hpgl2Options {
    /// Show label text as part of the LB row
    pub show_label_text: bool,
}

impl Default for Hpgl2Options {
    fn default() -> Self {
        Self { show_label_text: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PjlOptions {
    /// Show `@PJL COMMENT` lines
    pub show_comments: bool,
}

impl Default for PjlOptions {
    fn default() -> Self {
        Self { show_comments: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpaqueOptions {
    /// Dump PostScript / XL2HB / unknown content as data rows
    pub show_data: bool,
}

impl Default for OpaqueOptions {
    fn default() -> Self {
        Self { show_data: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Language of the first byte; `None` classifies the start of the stream
    pub initial_language: Option<Language>,
    /// First byte offset analysed
    pub start_offset: u64,
    /// Offset after the last byte analysed; `None` means end of input
    pub end_offset: Option<u64>,
    /// Display base of offsets (report formatting only)
    pub offset_base: OffsetBase,
    /// Size of the blocks read from the input
    pub block_size: usize,
    /// Maximum depth of embedded-data recursion
    pub max_embed_depth: u32,
    /// Payload bytes per text/data row
    pub text_chunk: usize,

    pub pcl: PclOptions,
    pub pclxl: PclXlOptions,
    pub hpgl2: Hpgl2Options,
    pub pjl: PjlOptions,
    pub opaque: OpaqueOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            initial_language: None,
            start_offset: 0,
            end_offset: None,
            offset_base: OffsetBase::default(),
            block_size: DEFAULT_BLOCK_SIZE,
            max_embed_depth: DEFAULT_MAX_EMBED_DEPTH,
            text_chunk: DEFAULT_TEXT_CHUNK,
            pcl: PclOptions::default(),
            pclxl: PclXlOptions::default(),
            hpgl2: Hpgl2Options::default(),
            pjl: PjlOptions::default(),
            opaque: OpaqueOptions::default(),
        }
    }
}

impl Options {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.initial_language = Some(language);
        self
    }

    pub(crate) fn effective_block_size(&self) -> usize {
        self.block_size.max(MIN_BLOCK_SIZE)
    }

    pub(crate) fn effective_text_chunk(&self) -> usize {
        self.text_chunk.max(1)
    }
}
