use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{error, info, warn};

use playbill_archive::{
    convert, format_preview, InputConfig, OutputFormat, SinkConfig, SinkMode,
};

#[cfg(feature = "extract")]
use playbill_archive::{extract_images, ContentUnderstandingClient, ExtractionSettings};
#[cfg(feature = "extract")]
use std::time::Duration;

/// Playbill archive: scanned programs → structured spreadsheets by year
#[derive(Parser, Debug)]
#[command(name = "playbill-archive", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert extracted JSON results into a CSV or Excel table
    Convert(ConvertArgs),

    /// Send scanned images to the extraction service and save the JSON results
    #[cfg(feature = "extract")]
    Extract(ExtractArgs),

    /// Extract every pending image, then build the year workbook
    #[cfg(feature = "extract")]
    Run(RunArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Csv,
    Excel,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Excel => OutputFormat::Excel,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    /// All rows in one table
    Flat,
    /// One sheet per year plus Summary (Excel only)
    YearSheets,
}

impl From<LayoutArg> for SinkMode {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Flat => SinkMode::Flat,
            LayoutArg::YearSheets => SinkMode::YearSheets,
        }
    }
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Input JSON file or folder containing JSON files
    input: PathBuf,

    /// Output file path (default: derived from input)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: FormatArg,

    /// Table layout
    #[arg(short, long, value_enum, default_value = "flat")]
    layout: LayoutArg,

    /// Append to an existing output table instead of overwriting
    #[arg(short, long)]
    append: bool,

    /// Process JSON files in subdirectories too
    #[arg(short, long)]
    recursive: bool,

    /// File pattern for JSON files
    #[arg(long, default_value = "*.json")]
    pattern: String,

    /// Move converted JSON files into processed/ afterwards
    #[arg(long)]
    archive: bool,
}

#[cfg(feature = "extract")]
#[derive(Args, Debug)]
struct ServiceArgs {
    /// Service endpoint
    #[arg(long, env = "AZURE_CONTENT_UNDERSTANDING_ENDPOINT")]
    endpoint: String,

    /// Analyzer to run on each image
    #[arg(long, env = "AZURE_CONTENT_UNDERSTANDING_ANALYZER_ID")]
    analyzer_id: String,

    #[arg(long, env = "AZURE_CONTENT_UNDERSTANDING_SUBSCRIPTION_KEY", hide_env_values = true)]
    subscription_key: Option<String>,

    #[arg(long, env = "AZURE_CONTENT_UNDERSTANDING_AAD_TOKEN", hide_env_values = true)]
    aad_token: Option<String>,

    #[arg(long, default_value = playbill_archive::config::DEFAULT_API_VERSION)]
    api_version: String,

    /// Give up on one image after this many seconds
    #[arg(long, default_value = "3600")]
    timeout_secs: u64,

    /// Seconds between status polls
    #[arg(long, default_value = "1")]
    poll_secs: u64,
}

#[cfg(feature = "extract")]
impl ServiceArgs {
    fn settings(&self) -> ExtractionSettings {
        let mut settings = ExtractionSettings::new(&self.endpoint, &self.analyzer_id)
            .with_subscription_key(self.subscription_key.clone())
            .with_aad_token(self.aad_token.clone())
            .with_polling(
                Duration::from_secs(self.timeout_secs),
                Duration::from_secs(self.poll_secs),
            );
        settings.api_version = self.api_version.clone();
        settings
    }
}

#[cfg(feature = "extract")]
#[derive(Args, Debug)]
struct ExtractArgs {
    /// Folder of scanned program images
    #[arg(long, default_value = "./playbills")]
    images: PathBuf,

    /// Folder receiving <image>_result.json files
    #[arg(long, default_value = "./curesults")]
    results: PathBuf,

    #[command(flatten)]
    service: ServiceArgs,
}

#[cfg(feature = "extract")]
#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    extract: ExtractArgs,

    /// Year workbook to write
    #[arg(short, long, default_value = "seattle_opera_complete_by_year.xlsx")]
    output: PathBuf,
}

fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Convert(args) => run_convert(args),
        #[cfg(feature = "extract")]
        Command::Extract(args) => run_extract(&args).map(|_| ()),
        #[cfg(feature = "extract")]
        Command::Run(args) => run_pipeline(args),
    };

    if let Err(err) = result {
        error!("{:#}", err);
        eprintln!("❌ {:#}", err);
        std::process::exit(1);
    }
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    let input = InputConfig::new(&args.input)
        .with_recursive(args.recursive)
        .with_pattern(&args.pattern);

    let format = OutputFormat::from(args.format);
    let destination = args
        .output
        .clone()
        .unwrap_or_else(|| input.default_destination(format));

    let sink = SinkConfig::new(destination, format, args.layout.into()).with_append(args.append);

    println!("📂 Loading JSON data from: {}", input.input.display());
    let report = convert(&input, &sink, args.archive)?;

    println!("\n{}", report);
    if !report.batch.rows.is_empty() {
        println!("{}", format_preview(report.preview(5), report.batch.rows.len()));
    }
    Ok(())
}

#[cfg(feature = "extract")]
fn run_extract(args: &ExtractArgs) -> Result<usize> {
    let client = ContentUnderstandingClient::new(args.service.settings())?;

    println!("🛰️  Extracting images from: {}", args.images.display());
    let report = extract_images(&client, &args.images, &args.results)?;

    println!("✓ Results saved: {}", report.saved.len());
    println!("✓ Images failed: {}", report.failed.len());
    for item in &report.failed {
        println!("   - {}: {}", item.path.display(), item.reason);
    }
    println!(
        "📁 Moved {} images to {}",
        report.archive.moved_count(),
        args.images.join("processed").display()
    );

    Ok(report.saved.len())
}

#[cfg(feature = "extract")]
fn run_pipeline(args: RunArgs) -> Result<()> {
    // Results already on disk still get converted
    if let Err(err) = run_extract(&args.extract) {
        warn!("Extraction step failed: {:#}", err);
        println!("⚠️  Extraction step failed: {:#}", err);
    }
    std::fs::create_dir_all(&args.extract.results)?;

    println!("\n{}", "=".repeat(60));
    println!("Converting JSON results to Excel table organized by year...");
    println!("{}", "=".repeat(60));

    let input = InputConfig::new(&args.extract.results);
    let sink = SinkConfig::new(&args.output, OutputFormat::Excel, SinkMode::YearSheets);
    let report = convert(&input, &sink, true)?;

    println!("\n{}", report);
    if report.outcome.written {
        info!(output = %args.output.display(), "Excel conversion completed");
        println!("✅ Excel conversion completed: {}", args.output.display());
    } else {
        println!("❌ Excel conversion failed or no data found");
    }
    Ok(())
}
