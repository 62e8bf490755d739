use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context};
use argh::FromArgs;
use chrono::Local;

use smartvision_lib::constants::LOG_DATE_FORMAT;
use smartvision_lib::fs_utils::app_storage_dir;
use smartvision_lib::services::{format_elapsed, LlmDescriptionClient};
use smartvision_lib::{
    api_key_info, resolve_prompt, run_batch, save_api_key, AppConfig, BatchMode, BatchRequest,
    BatchResult, CancelFlag, ConfigLoader,
};

#[derive(FromArgs)]
/// Describe folders of images with a multimodal model, then embed the results
/// as IPTC metadata or export them to CSV
struct Cli {
    /// configuration file (TOML or JSON)
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// log debug output
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// also append the log to this file
    #[argh(option)]
    log_file: Option<PathBuf>,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Embed(EmbedCommand),
    Csv(CsvCommand),
    SetKey(SetKeyCommand),
    KeyInfo(KeyInfoCommand),
}

#[derive(FromArgs)]
/// Embed title, description and keywords into each image
#[argh(subcommand, name = "embed")]
struct EmbedCommand {
    /// folder with the images to describe
    #[argh(option, short = 's')]
    source: PathBuf,

    /// folder for the annotated images (defaults to the source folder)
    #[argh(option, short = 'd')]
    destination: Option<PathBuf>,

    /// custom prompt, saved for later runs
    #[argh(option, short = 'p')]
    prompt: Option<String>,

    /// author name written as the by-line
    #[argh(option, short = 'a')]
    author: Option<String>,
}

#[derive(FromArgs)]
/// Write the descriptions of all images to a CSV file
#[argh(subcommand, name = "csv")]
struct CsvCommand {
    /// folder with the images to describe
    #[argh(option, short = 's')]
    source: PathBuf,

    /// folder for the CSV file (defaults to the source folder)
    #[argh(option, short = 'd')]
    destination: Option<PathBuf>,

    /// custom prompt, saved for later runs
    #[argh(option, short = 'p')]
    prompt: Option<String>,

    /// CSV file name (defaults to the run's date and time)
    #[argh(option, short = 'o')]
    output: Option<String>,
}

#[derive(FromArgs)]
/// Save the API key used for the description service
#[argh(subcommand, name = "set-key")]
struct SetKeyCommand {
    /// the API key
    #[argh(positional)]
    key: String,
}

#[derive(FromArgs)]
/// Show when the API key was last saved
#[argh(subcommand, name = "key-info")]
struct KeyInfoCommand {}

fn init_logging(verbose: bool, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {}",
            Local::now().format(LOG_DATE_FORMAT),
            record.level(),
            record.args()
        )
    });

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn print_summary(result: &BatchResult) {
    println!(
        "Processed {} of {} image(s) in {}",
        result.processed_count,
        result.total,
        format_elapsed(result.elapsed_time)
    );
    if result.skipped > 0 {
        println!("Not attempted: {}", result.skipped);
    }
    if result.cancelled {
        println!("Run was cancelled");
    }
    for failure in &result.failed {
        println!("  {} - {}: {}", failure.file, failure.kind, failure.reason);
    }
    if let Some(output) = &result.output {
        println!("Output: {}", output.display());
    }
}

async fn describe_folder(config: AppConfig, request: BatchRequest) -> anyhow::Result<()> {
    let storage = app_storage_dir();
    let api_key = config.resolve_api_key(&storage)?;
    let client = LlmDescriptionClient::new(config.build_llm_client(&api_key)?);
    // saves a custom prompt for later runs
    let default_prompt = resolve_prompt(&storage, request.custom_prompt.as_deref()).await?;

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; stopping after the current file");
            on_interrupt.cancel();
        }
    });

    match run_batch(&client, &config, &request, &default_prompt, cancel).await {
        Ok(result) => {
            print_summary(&result);
            Ok(())
        }
        Err(err) => {
            print_summary(err.partial());
            bail!(err)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli: Cli = argh::from_env();
    init_logging(cli.verbose, cli.log_file.as_ref())?;

    let storage = app_storage_dir();
    let mut config = ConfigLoader::load(cli.config.as_deref(), &storage)
        .context("failed to load configuration")?;

    match cli.command {
        Command::Embed(args) => {
            let request = BatchRequest::new(args.source, args.destination, BatchMode::EmbedMetadata)
                .with_prompt(args.prompt)
                .with_author(args.author);
            describe_folder(config, request).await
        }
        Command::Csv(args) => {
            if args.output.is_some() {
                config.csv_file_name = args.output;
            }
            let request = BatchRequest::new(args.source, args.destination, BatchMode::GenerateCsv)
                .with_prompt(args.prompt);
            describe_folder(config, request).await
        }
        Command::SetKey(args) => {
            save_api_key(&storage, &args.key).await?;
            println!("{}", api_key_info(&storage).await?);
            Ok(())
        }
        Command::KeyInfo(_) => {
            println!("{}", api_key_info(&storage).await?);
            Ok(())
        }
    }
}
