use std::io::Write;

use prn_parser_core::{OffsetBase, Row, RowSink};
use serde::Serialize;

/// Writes rows as they are produced, one line each.
pub struct TextSink<W: Write> {
    out: W,
    base: OffsetBase,
    /// First write error; later rows are dropped
    pub error: Option<std::io::Error>,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W, base: OffsetBase) -> Self {
        Self { out, base, error: None }
    }

    pub fn finish(mut self) -> std::io::Result<()> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.out.flush()
    }
}

impl<W: Write> RowSink for TextSink<W> {
    fn add_row(&mut self, row: Row) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = writeln!(self.out, "{}", row.format(self.base)) {
            self.error = Some(err);
        }
    }
}

#[derive(Serialize)]
pub struct JsonReport<'a, S: Serialize> {
    pub rows: &'a [Row],
    pub summary: &'a S,
}

pub fn write_json<S: Serialize>(out: impl Write, rows: &[Row], summary: &S) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(out, &JsonReport { rows, summary })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prn_parser_core::RowKind;

    #[test]
    fn test_text_sink_lines() {
        let mut out = Vec::new();
        let mut sink = TextSink::new(&mut out, OffsetBase::Hexadecimal);
        sink.add_row(Row::new(RowKind::PclSequence, 0x20, 0).label("PCL").sequence("<ESC>E").description("Printer Reset"));
        sink.comment(-1, 0, "done");
        sink.finish().unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000020 PCL"));
        assert!(lines[0].ends_with("Printer Reset"));
        assert!(lines[1].trim_start().starts_with("Comment"));
    }

    #[test]
    fn test_json_report() {
        let rows = vec![Row::new(RowKind::PjlCommand, 9, 0).label("PJL").sequence("@PJL EOJ")];
        let mut out = Vec::new();
        write_json(&mut out, &rows, &42u32).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["rows"][0]["kind"], "PjlCommand");
        assert_eq!(value["rows"][0]["offset"], 9);
        assert_eq!(value["summary"], 42);
    }
}
