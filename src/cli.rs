// ABOUTME: Command-line surface: one subcommand per workflow
// ABOUTME: Raw clap arguments, converted into validated configs before any network call

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::remote::DEFAULT_API_BASE_URL;
use crate::tabular::FileFormat;
use crate::upload::DEFAULT_CHUNK_ROWS;

#[derive(Parser, Debug)]
#[command(
    name = "dataset-toolkit",
    version,
    about = "Workflows for the dataset-management API"
)]
pub struct Cli {
    /// Base URL of the dataset API
    #[arg(long, global = true, env = "DATASET_API_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export the mappings of a dataset and optionally copy them onto another dataset
    CopyMappings(CopyMappingsArgs),
    /// Convert a CSV export of mappings into a mapping file
    CsvToMappings(CsvToMappingsArgs),
    /// Download every file of every downloadable snapshot of a dataset
    DownloadFiles(DownloadFilesArgs),
    /// Upload a local file to a dataset in row chunks
    UploadFile(UploadFileArgs),
    /// Merge the Parquet files of a directory into one CSV file
    ParquetToCsv(ParquetToCsvArgs),
    /// Update schema field descriptions of a dataset from a CSV file
    UpdateDescriptions(UpdateDescriptionsArgs),
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["source_dataset", "mappings_file"])
))]
pub struct CopyMappingsArgs {
    /// Dataset whose mappings are exported and copied
    #[arg(long)]
    pub source_dataset: Option<String>,

    /// Previously exported mapping file to copy from
    #[arg(long)]
    pub mappings_file: Option<PathBuf>,

    /// Token used to read the source dataset
    #[arg(long, env = "DATASET_SOURCE_TOKEN", hide_env_values = true)]
    pub source_token: Option<String>,

    /// Dataset the mappings are posted to. Without it only the export runs.
    #[arg(long)]
    pub target_dataset: Option<String>,

    /// Token used to read the target dataset and post mappings
    #[arg(long, env = "DATASET_TARGET_TOKEN", hide_env_values = true)]
    pub target_token: Option<String>,

    /// Post through the global admin endpoint instead of the company endpoint
    #[arg(long)]
    pub admin: bool,

    /// Directory the mapping export file is written to
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct CsvToMappingsArgs {
    /// CSV file with attribute_id and mapping columns
    pub csv_file: PathBuf,
    /// Mapping file to write
    pub output_file: PathBuf,
}

#[derive(Args, Debug)]
pub struct DownloadFilesArgs {
    #[arg(long)]
    pub dataset_id: String,

    #[arg(long, env = "DATASET_API_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Files land under <output-dir>/<dataset-id>/
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct UploadFileArgs {
    pub dataset_id: String,

    pub file_path: PathBuf,

    #[arg(value_enum)]
    pub file_type: FileFormat,

    #[arg(long, env = "DATASET_API_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Maximum number of rows per uploaded chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_ROWS)]
    pub chunk_rows: usize,

    /// Directory for staged chunk files (system temp dir by default)
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ParquetToCsvArgs {
    /// Directory containing the Parquet files
    pub path: PathBuf,

    /// Output CSV file name (defaults to <directory-name>.csv)
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateDescriptionsArgs {
    pub dataset_id: String,

    /// CSV file with field_name and description columns
    pub csv_file_path: PathBuf,

    #[arg(long, env = "DATASET_API_TOKEN", hide_env_values = true)]
    pub token: String,
}
