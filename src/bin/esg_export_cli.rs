//! CLI tool for esg-export: spreadsheet and PDF exports from the command line
//!
//! Usage:
//!   esg_export_cli sheets records.json -o esg-data.xlsx
//!   esg_export_cli pdf snapshot.png -o esg-report.pdf [--width 800 --height 2000] [--inline]
//!   esg_export_cli inspect esg-data.xlsx

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    native::run()
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::process::ExitCode;

    use clap::{ArgAction, Parser, Subcommand};
    use futures::executor::block_on;
    use tracing::{debug, error};
    use tracing_subscriber::EnvFilter;

    use esg_export::config::{ExportConfig, OffloadMode};
    use esg_export::offload::ThreadSpawner;
    use esg_export::reader::read_workbook;
    use esg_export::sink::DirectorySink;
    use esg_export::snapshot::{MemoryDom, MemoryElement};
    use esg_export::{Exporter, Result, SheetInput};

    /// Element id the input image is mounted under.
    const CONTENT_ID: &str = "report-content";

    #[derive(Parser)]
    #[command(
        name = "esg_export_cli",
        version,
        about = "Export ESG records to .xlsx and rendered reports to .pdf"
    )]
    struct Cli {
        #[command(subcommand)]
        command: Command,

        /// TOML configuration file.
        #[arg(long, value_name = "FILE", global = true)]
        config: Option<PathBuf>,

        /// More logging (-v debug, -vv trace). Overrides RUST_LOG.
        #[arg(short, long, action = ArgAction::Count, global = true)]
        verbose: u8,
    }

    #[derive(Subcommand)]
    enum Command {
        /// Write a multi-sheet workbook from a JSON object of record arrays.
        Sheets {
            #[arg(value_name = "RECORDS_JSON")]
            input: PathBuf,
            #[arg(short, long, value_name = "OUT_XLSX")]
            output: PathBuf,
        },
        /// Place a PNG snapshot onto a one-page A4 PDF.
        Pdf {
            #[arg(value_name = "IMAGE")]
            input: PathBuf,
            #[arg(short, long, value_name = "OUT_PDF")]
            output: PathBuf,
            /// Content width in CSS pixels (defaults to the image width).
            #[arg(long)]
            width: Option<u32>,
            /// Content height in CSS pixels (defaults to the image height).
            #[arg(long)]
            height: Option<u32>,
            /// Assemble on the calling thread instead of a worker.
            #[arg(long)]
            inline: bool,
        },
        /// Print a workbook as JSON.
        Inspect {
            #[arg(value_name = "XLSX")]
            input: PathBuf,
        },
    }

    pub fn run() -> ExitCode {
        let cli = Cli::parse();
        init_logging(cli.verbose);

        let config = match cli.config.as_deref().map(ExportConfig::load).transpose() {
            Ok(config) => config.unwrap_or_default(),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        };
        debug!(?config, "configuration loaded");

        let outcome = match cli.command {
            Command::Sheets { input, output } => sheets(config, &input, &output),
            Command::Pdf {
                input,
                output,
                width,
                height,
                inline,
            } => pdf(config, &input, &output, (width, height), inline),
            Command::Inspect { input } => inspect(&input),
        };
        match outcome {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                error!(error = %e, "command failed");
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        }
    }

    fn init_logging(verbose: u8) {
        let filter = match verbose {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        };
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    /// Directory and file name the sink writes `output` as.
    fn split_output(output: &Path) -> (PathBuf, String) {
        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (dir, name)
    }

    fn sheets(config: ExportConfig, input: &Path, output: &Path) -> Result<bool> {
        let data: SheetInput = serde_json::from_slice(&fs::read(input)?)?;
        let (dir, filename) = split_output(output);
        let exporter = Exporter::new(
            config,
            MemoryDom::new(),
            ThreadSpawner,
            DirectorySink::new(dir),
        );
        Ok(block_on(exporter.export_spreadsheet(&data, &filename)))
    }

    fn pdf(
        mut config: ExportConfig,
        input: &Path,
        output: &Path,
        size: (Option<u32>, Option<u32>),
        inline: bool,
    ) -> Result<bool> {
        if inline {
            config.offload = OffloadMode::Inline;
        }
        let image = image::open(input)?;
        let mut element = MemoryElement::from_image(image);
        if let Some(w) = size.0 {
            element.scroll_width = w;
        }
        if let Some(h) = size.1 {
            element.scroll_height = h;
        }

        let dom = MemoryDom::new();
        dom.insert(CONTENT_ID, element);
        let (dir, filename) = split_output(output);
        let exporter = Exporter::new(config, dom, ThreadSpawner, DirectorySink::new(dir));
        Ok(block_on(exporter.export_document(CONTENT_ID, &filename)))
    }

    fn inspect(input: &Path) -> Result<bool> {
        let workbook = read_workbook(&fs::read(input)?)?;
        println!("{}", serde_json::to_string_pretty(&workbook)?);
        Ok(true)
    }
}
