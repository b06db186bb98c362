#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::struct_excessive_bools, clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]

mod config;
mod report;

use std::{
    io::{BufWriter, Write},
    path::PathBuf,
};

use anyhow::Context;
use bstr::ByteSlice;
use clap::{Args, Parser, Subcommand};
use flexi_logger::Logger;
use prn_parser_core::{Language, OffsetBase, Options, Row, RowKind, analyse_file, make_overlay_pcl, make_overlay_pclxl, scan_language, split_pjl_responses};

use crate::{
    config::{Config, parse_language},
    report::{TextSink, write_json},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML file with analysis and overlay settings
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a print stream and list one row per sequence, operator or command
    Analyse(AnalyseArgs),
    /// Report the page description language of each file
    Scan {
        #[arg(value_name = "PATH", required = true)]
        files: Vec<PathBuf>,
    },
    /// Rewrite a PCL stream into a macro overlay
    OverlayPcl {
        #[command(flatten)]
        io: OverlayIo,
        /// Macro identifier of the overlay
        #[arg(long)]
        macro_id: Option<i32>,
        /// Do not wrap the overlay into a macro definition
        #[arg(long)]
        no_encapsulate: bool,
        /// Do not bracket the overlay with push/pop cursor position
        #[arg(long)]
        no_restore: bool,
    },
    /// Rewrite a PCL XL stream into a user defined stream overlay
    OverlayPclxl {
        #[command(flatten)]
        io: OverlayIo,
        /// Name of the user defined stream
        #[arg(long)]
        stream_name: Option<String>,
        /// Do not wrap the overlay into a user defined stream
        #[arg(long)]
        no_encapsulate: bool,
        /// Do not bracket the page with PushGS / PopGS
        #[arg(long)]
        no_restore: bool,
    },
    /// Split captured PJL readback data into its responses
    SplitPjl {
        #[arg(value_name = "PATH")]
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct AnalyseArgs {
    #[arg(value_name = "PATH")]
    file: PathBuf,
    /// Language of the first byte (PCL, PCLXL, HPGL2, PJL, PRESCRIBE, ...); detected if omitted
    #[arg(long, short, value_parser = parse_language)]
    language: Option<Language>,
    /// First byte offset analysed
    #[arg(long)]
    start: Option<u64>,
    /// Offset after the last byte analysed
    #[arg(long)]
    end: Option<u64>,
    #[arg(long)]
    block_size: Option<usize>,
    /// Maximum nesting of embedded data analysis
    #[arg(long)]
    max_depth: Option<u32>,
    /// Show offsets in hexadecimal
    #[arg(long)]
    hex: bool,
    /// Write rows and summary as JSON
    #[arg(long)]
    json: bool,
    /// Hide PCL text rows
    #[arg(long)]
    no_text: bool,
    /// Hide binary data rows
    #[arg(long)]
    no_data: bool,
    /// Hide PCL XL attribute rows
    #[arg(long)]
    no_attributes: bool,
}

#[derive(Args, Debug)]
struct OverlayIo {
    #[arg(value_name = "SOURCE")]
    source: PathBuf,
    #[arg(value_name = "TARGET")]
    target: PathBuf,
    /// Print the rows of the overlay pass
    #[arg(long, short)]
    verbose: bool,
}

fn main() {
    let args = Cli::parse();

    let _logger = match Logger::try_with_env_or_str("warn").and_then(|logger| logger.log_to_stderr().start()) {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("Failed to initialize logger: {err}");
            None
        }
    };

    if let Err(err) = run(args) {
        log::error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(args: Cli) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match args.command {
        Command::Analyse(analyse_args) => run_analyse(analyse_args, config.options),
        Command::Scan { files } => {
            let mut out = std::io::stdout().lock();
            for file in files {
                let language = scan_language(&file, &config.options)?;
                writeln!(out, "{}: {language}", file.display())?;
            }
            Ok(())
        }
        Command::OverlayPcl {
            io,
            macro_id,
            no_encapsulate,
            no_restore,
        } => {
            let mut settings = config.pcl_overlay;
            if let Some(id) = macro_id {
                settings.macro_id = id;
            }
            settings.encapsulate &= !no_encapsulate;
            settings.restore_cursor &= !no_restore;

            let mut rows = Vec::new();
            let result = make_overlay_pcl(&io.source, &io.target, &config.options, &settings, &mut rows);
            finish_overlay(&io, &config.options, &rows, result)
        }
        Command::OverlayPclxl {
            io,
            stream_name,
            no_encapsulate,
            no_restore,
        } => {
            let mut settings = config.pclxl_overlay;
            if let Some(name) = stream_name {
                settings.stream_name = name;
            }
            settings.encapsulate &= !no_encapsulate;
            settings.restore_gs &= !no_restore;

            let mut rows = Vec::new();
            let result = make_overlay_pclxl(&io.source, &io.target, &config.options, &settings, &mut rows);
            finish_overlay(&io, &config.options, &rows, result)
        }
        Command::SplitPjl { file } => {
            let data = std::fs::read(&file).with_context(|| format!("Failed to read '{}'", file.display()))?;
            let mut out = std::io::stdout().lock();
            for (i, response) in split_pjl_responses(&data).into_iter().enumerate() {
                let text = response.trim_end_with(|c| c == '\x0c' || c.is_whitespace());
                writeln!(out, "--- response {} ({} bytes)", i + 1, response.len())?;
                writeln!(out, "{}", text.as_bstr())?;
            }
            Ok(())
        }
    }
}

fn run_analyse(args: AnalyseArgs, mut options: Options) -> anyhow::Result<()> {
    if args.language.is_some() {
        options.initial_language = args.language;
    }
    if let Some(start) = args.start {
        options.start_offset = start;
    }
    if args.end.is_some() {
        options.end_offset = args.end;
    }
    if let Some(block_size) = args.block_size {
        options.block_size = block_size;
    }
    if let Some(depth) = args.max_depth {
        options.max_embed_depth = depth;
    }
    if args.hex {
        options.offset_base = OffsetBase::Hexadecimal;
    }
    options.pcl.show_text &= !args.no_text;
    options.pcl.show_binary_data &= !args.no_data;
    options.pclxl.show_embedded_data &= !args.no_data;
    options.opaque.show_data &= !args.no_data;
    options.pclxl.show_attributes &= !args.no_attributes;

    log::info!("Analysing '{}'", args.file.display());
    let stdout = BufWriter::new(std::io::stdout().lock());
    if args.json {
        let mut rows = Vec::new();
        let summary = analyse_file(&args.file, &options, &mut rows)?;
        write_json(stdout, &rows, &summary)
    } else {
        let mut sink = TextSink::new(stdout, options.offset_base);
        let summary = analyse_file(&args.file, &options, &mut sink)?;
        sink.finish()?;
        log::info!(
            "{} bytes, {} language switches, ended in {}",
            summary.end_offset - summary.start_offset,
            summary.language_switches,
            summary.final_language
        );
        Ok(())
    }
}

fn finish_overlay<S: serde::Serialize>(io: &OverlayIo, options: &Options, rows: &[Row], result: Result<S, prn_parser_core::AnalysisError>) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    let failed = result.is_err();
    for row in rows {
        // messages explain a failure even without --verbose
        if io.verbose || (failed && matches!(row.kind, RowKind::MsgError | RowKind::MsgWarning)) {
            writeln!(out, "{}", row.format(options.offset_base))?;
        }
    }
    let summary = match result {
        Ok(summary) => summary,
        Err(err) if err.is_collision() => {
            anyhow::bail!("{err}; choose another identifier with --macro-id or --stream-name")
        }
        Err(err) => return Err(anyhow::Error::new(err).context(format!("Overlay generation from '{}' failed", io.source.display()))),
    };
    if io.verbose {
        serde_json::to_writer_pretty(&mut out, &summary)?;
        writeln!(out)?;
    }
    log::info!("Overlay written to '{}'", io.target.display());
    Ok(())
}
