// ABOUTME: Validated configuration for each workflow
// ABOUTME: Converts raw command-line arguments in one upfront validation step

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::cli::{
    CopyMappingsArgs, DownloadFilesArgs, ParquetToCsvArgs, UpdateDescriptionsArgs, UploadFileArgs,
};
use crate::error::ToolkitError;
use crate::tabular::FileFormat;

/// Where the mappings to copy come from. Exactly one source per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingSource {
    Dataset { dataset_id: String, token: String },
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTarget {
    pub dataset_id: String,
    pub token: String,
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyMappingsConfig {
    pub source: MappingSource,
    /// `None` runs the export only.
    pub target: Option<CopyTarget>,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    pub dataset_id: String,
    pub token: String,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub dataset_id: String,
    pub token: String,
    pub file_path: PathBuf,
    pub format: FileFormat,
    pub chunk_rows: usize,
    pub staging_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionConfig {
    pub directory: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionConfig {
    pub dataset_id: String,
    pub token: String,
    pub csv_path: PathBuf,
}

fn required(value: Option<String>, what: &str) -> Result<String, ToolkitError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ToolkitError::Configuration(format!("{} is required", what))),
    }
}

fn non_empty(value: String, what: &str) -> Result<String, ToolkitError> {
    required(Some(value), what)
}

impl TryFrom<CopyMappingsArgs> for CopyMappingsConfig {
    type Error = ToolkitError;

    fn try_from(args: CopyMappingsArgs) -> Result<Self, Self::Error> {
        let source = match (args.source_dataset, args.mappings_file) {
            (Some(dataset_id), None) => MappingSource::Dataset {
                dataset_id: non_empty(dataset_id, "--source-dataset")?,
                token: required(args.source_token, "--source-token for --source-dataset")?,
            },
            (None, Some(path)) => MappingSource::File(path),
            _ => {
                return Err(ToolkitError::Configuration(
                    "exactly one of --source-dataset or --mappings-file is required".to_string(),
                ))
            }
        };

        let target = match args.target_dataset {
            Some(dataset_id) => Some(CopyTarget {
                dataset_id: non_empty(dataset_id, "--target-dataset")?,
                token: required(args.target_token, "--target-token for --target-dataset")?,
                admin: args.admin,
            }),
            None if args.admin => {
                return Err(ToolkitError::Configuration(
                    "--admin only applies together with --target-dataset".to_string(),
                ))
            }
            None => None,
        };

        Ok(Self {
            source,
            target,
            output_dir: args.output_dir,
        })
    }
}

impl TryFrom<DownloadFilesArgs> for DownloadConfig {
    type Error = ToolkitError;

    fn try_from(args: DownloadFilesArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            dataset_id: non_empty(args.dataset_id, "--dataset-id")?,
            token: non_empty(args.token, "--token")?,
            output_dir: args.output_dir,
        })
    }
}

impl TryFrom<UploadFileArgs> for UploadConfig {
    type Error = ToolkitError;

    fn try_from(args: UploadFileArgs) -> Result<Self, Self::Error> {
        if args.chunk_rows == 0 {
            return Err(ToolkitError::Configuration(
                "--chunk-rows must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            dataset_id: non_empty(args.dataset_id, "dataset id")?,
            token: non_empty(args.token, "--token")?,
            file_path: args.file_path,
            format: args.file_type,
            chunk_rows: args.chunk_rows,
            staging_dir: args.staging_dir,
        })
    }
}

impl TryFrom<UpdateDescriptionsArgs> for DescriptionConfig {
    type Error = ToolkitError;

    fn try_from(args: UpdateDescriptionsArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            dataset_id: non_empty(args.dataset_id, "dataset id")?,
            token: non_empty(args.token, "--token")?,
            csv_path: args.csv_file_path,
        })
    }
}

impl ConversionConfig {
    /// Resolves the output name: `<directory-name>.csv` unless given, always
    /// ending in `.csv`.
    pub fn resolve(directory: &Path, output: Option<&str>) -> Result<Self, ToolkitError> {
        let directory = directory.canonicalize().map_err(|e| {
            ToolkitError::InvalidInput(format!("cannot resolve {}: {}", directory.display(), e))
        })?;

        let mut name = match output {
            Some(name) => name.to_string(),
            None => {
                let dir_name = directory
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "output".to_string());
                format!("{}.csv", dir_name)
            }
        };
        if !name.ends_with(".csv") {
            name.push_str(".csv");
        }

        Ok(Self {
            directory,
            output: PathBuf::from(name),
        })
    }
}

impl TryFrom<ParquetToCsvArgs> for ConversionConfig {
    type Error = ToolkitError;

    fn try_from(args: ParquetToCsvArgs) -> Result<Self, Self::Error> {
        Self::resolve(&args.path, args.output.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn copy_args(argv: &[&str]) -> CopyMappingsArgs {
        let mut full = vec!["dataset-toolkit", "copy-mappings"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::CopyMappings(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_dataset_source_with_target() {
        let config = CopyMappingsConfig::try_from(copy_args(&[
            "--source-dataset",
            "100",
            "--source-token",
            "s",
            "--target-dataset",
            "200",
            "--target-token",
            "t",
        ]))
        .unwrap();

        assert_eq!(
            config.source,
            MappingSource::Dataset {
                dataset_id: "100".to_string(),
                token: "s".to_string()
            }
        );
        assert_eq!(
            config.target,
            Some(CopyTarget {
                dataset_id: "200".to_string(),
                token: "t".to_string(),
                admin: false
            })
        );
    }

    #[test]
    fn test_file_source_without_target_is_export_only() {
        let config =
            CopyMappingsConfig::try_from(copy_args(&["--mappings-file", "m.json"])).unwrap();
        assert_eq!(config.source, MappingSource::File(PathBuf::from("m.json")));
        assert_eq!(config.target, None);
    }

    #[test]
    fn test_both_sources_are_rejected_by_parser() {
        let result = Cli::try_parse_from([
            "dataset-toolkit",
            "copy-mappings",
            "--source-dataset",
            "1",
            "--mappings-file",
            "m.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_tokens_are_configuration_errors() {
        let err = CopyMappingsConfig::try_from(copy_args(&["--source-dataset", "1"])).unwrap_err();
        assert!(matches!(err, ToolkitError::Configuration(_)));

        let err = CopyMappingsConfig::try_from(copy_args(&[
            "--mappings-file",
            "m.json",
            "--target-dataset",
            "2",
        ]))
        .unwrap_err();
        assert!(matches!(err, ToolkitError::Configuration(_)));

        let err =
            CopyMappingsConfig::try_from(copy_args(&["--mappings-file", "m.json", "--admin"]))
                .unwrap_err();
        assert!(matches!(err, ToolkitError::Configuration(_)));
    }

    #[test]
    fn test_zero_chunk_rows_rejected() {
        let cli = Cli::try_parse_from([
            "dataset-toolkit",
            "upload-file",
            "42",
            "data.csv",
            "csv",
            "--token",
            "t",
            "--chunk-rows",
            "0",
        ])
        .unwrap();
        let Commands::UploadFile(args) = cli.command else {
            panic!("expected upload-file");
        };
        assert!(UploadConfig::try_from(args).is_err());
    }

    #[test]
    fn test_conversion_output_name() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("events");
        std::fs::create_dir(&data_dir).unwrap();

        let config = ConversionConfig::resolve(&data_dir, None).unwrap();
        assert_eq!(config.output, PathBuf::from("events.csv"));

        let config = ConversionConfig::resolve(&data_dir, Some("merged")).unwrap();
        assert_eq!(config.output, PathBuf::from("merged.csv"));

        let config = ConversionConfig::resolve(&data_dir, Some("merged.csv")).unwrap();
        assert_eq!(config.output, PathBuf::from("merged.csv"));
    }
}
