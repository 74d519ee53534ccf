// ABOUTME: Entry point: parses the command line and runs one workflow
// ABOUTME: Progress goes to the tracing log, final summaries to stdout

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dataset_toolkit::cli::{Cli, Commands};
use dataset_toolkit::config::{
    ConversionConfig, CopyMappingsConfig, DescriptionConfig, DownloadConfig, MappingSource,
    UploadConfig,
};
use dataset_toolkit::error::ToolkitError;
use dataset_toolkit::mappings::{self, copy};
use dataset_toolkit::remote::DatasetClient;
use dataset_toolkit::schema::{self, DescriptionOutcome};
use dataset_toolkit::{download, tabular, upload};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    run_command(&cli.api_url, cli.command).await
}

async fn run_command(api_url: &str, command: Commands) -> Result<()> {
    match command {
        Commands::CopyMappings(args) => copy_mappings(api_url, args.try_into()?).await,
        Commands::CsvToMappings(args) => {
            let count = mappings::convert_csv_to_mappings(&args.csv_file, &args.output_file)?;
            println!(
                "Successfully converted {} mappings to {}",
                count,
                args.output_file.display()
            );
            Ok(())
        }
        Commands::DownloadFiles(args) => download_files(api_url, args.try_into()?).await,
        Commands::UploadFile(args) => upload_file(api_url, args.try_into()?).await,
        Commands::ParquetToCsv(args) => parquet_to_csv(args.try_into()?),
        Commands::UpdateDescriptions(args) => update_descriptions(api_url, args.try_into()?).await,
    }
}

async fn copy_mappings(api_url: &str, config: CopyMappingsConfig) -> Result<()> {
    let records = match &config.source {
        MappingSource::Dataset { dataset_id, token } => {
            let client = DatasetClient::new(api_url, token.as_str())?;
            let (records, path) =
                copy::export_dataset_mappings(&client, dataset_id, &config.output_dir).await?;
            println!("Saved {} mappings to {}", records.len(), path.display());
            records
        }
        MappingSource::File(path) => mappings::load_mappings(path)?,
    };

    let Some(target) = &config.target else {
        return Ok(());
    };

    let client = DatasetClient::new(api_url, target.token.as_str())?;
    let summary = copy::copy_mappings(&client, target, &records).await?;

    println!("\nSummary:");
    println!("Total successful mappings: {}", summary.succeeded);
    println!("Total failed mappings: {}", summary.failed());
    if !summary.failures.is_empty() {
        println!("\nFailed Mappings Details:");
        for failure in &summary.failures {
            println!(
                "Attribute ID: {}, Error: {}",
                failure.attribute_id, failure.error
            );
        }
    }
    Ok(())
}

async fn download_files(api_url: &str, config: DownloadConfig) -> Result<()> {
    let client = DatasetClient::new(api_url, config.token.as_str())?;
    let summary = download::download_dataset_files(&client, &config).await?;

    println!(
        "Downloaded {} files ({} bytes) to {}",
        summary.downloaded,
        summary.bytes,
        config.output_dir.join(&config.dataset_id).display()
    );
    for snapshot_id in &summary.skipped_snapshots {
        println!("Snapshot {} is not downloadable.", snapshot_id);
    }
    if !summary.failures.is_empty() {
        println!("\nFailed downloads: {}", summary.failures.len());
        for failure in &summary.failures {
            println!("File: {}, Error: {}", failure.path, failure.error);
        }
    }
    Ok(())
}

async fn upload_file(api_url: &str, config: UploadConfig) -> Result<()> {
    let client = DatasetClient::new(api_url, config.token.as_str())?;
    let chunks = upload::upload_file(&client, &config).await?;

    println!(
        "Uploaded {} chunks of {} to dataset {}",
        chunks.len(),
        config.file_path.display(),
        config.dataset_id
    );
    for chunk in &chunks {
        println!("{} -> {} ({} bytes)", chunk.name, chunk.remote_path, chunk.bytes);
    }
    Ok(())
}

fn parquet_to_csv(config: ConversionConfig) -> Result<()> {
    match tabular::merge_parquet_to_csv(&config)? {
        Some(summary) => println!(
            "Successfully wrote {} rows from {} files to {}",
            summary.rows,
            summary.files,
            summary.output.display()
        ),
        None => println!("No parquet files found in {}", config.directory.display()),
    }
    Ok(())
}

async fn update_descriptions(api_url: &str, config: DescriptionConfig) -> Result<()> {
    let client = DatasetClient::new(api_url, config.token.as_str())?;
    match schema::update_descriptions(&client, &config).await? {
        DescriptionOutcome::Updated(fields) => {
            println!("Successfully updated the following fields: {:?}", fields);
            Ok(())
        }
        DescriptionOutcome::MissingFields(fields) => Err(ToolkitError::InvalidInput(format!(
            "the following fields are missing from the dataset: {:?}",
            fields
        ))
        .into()),
    }
}
