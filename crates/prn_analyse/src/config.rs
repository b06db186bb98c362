use std::path::Path;

use anyhow::Context;
use prn_parser_core::{Language, Options, PclOverlaySettings, PclXlOverlaySettings};
use serde::Deserialize;

/// Settings file, all sections optional:
///
/// ```toml
/// [options]
/// block_size = 4096
/// [options.pcl]
/// show_text = false
/// [pcl_overlay]
/// macro_id = 5
/// [pclxl_overlay]
/// stream_name = "Form"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub options: Options,
    pub pcl_overlay: PclOverlaySettings,
    pub pclxl_overlay: PclXlOverlaySettings,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Value parser for `--language`; accepts the names used by `@PJL ENTER LANGUAGE`.
pub fn parse_language(name: &str) -> Result<Language, String> {
    match Language::from_pjl_name(name) {
        Language::Unknown => Err(format!("unknown language '{name}' (expected PCL, PCL3GUI, PCLXL, HPGL2, PJL, POSTSCRIPT, PRESCRIBE or XL2HB)")),
        language => Ok(language),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_sections() {
        let config = Config::parse(
            r#"
            [options]
            block_size = 512
            initial_language = "PclXl"
            [options.pcl]
            show_text = false
            [pcl_overlay]
            macro_id = 9
            "#,
        )
        .unwrap();
        assert_eq!(config.options.block_size, 512);
        assert_eq!(config.options.initial_language, Some(Language::PclXl));
        assert!(!config.options.pcl.show_text);
        assert!(config.options.pcl.show_control_codes);
        assert_eq!(config.pcl_overlay.macro_id, 9);
        assert!(config.pcl_overlay.encapsulate);
        assert_eq!(config.pclxl_overlay.stream_name, "Overlay");
    }

    #[test]
    fn test_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.options, Options::default());
    }

    #[test]
    fn test_language_names() {
        assert_eq!(parse_language("pclxl"), Ok(Language::PclXl));
        assert!(parse_language("zjs").is_err());
    }
}
