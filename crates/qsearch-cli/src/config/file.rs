use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileGridConfig {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSolverConfig {
    pub method: Option<String>,
    pub max_iterations: Option<usize>,
    pub fit_parameters: Option<Vec<String>>,
    pub goodness_of_fit: Option<bool>,
    pub program: Option<PathBuf>,
    pub args: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSweepConfig {
    pub target_parameter: Option<String>,
    pub workers: Option<usize>,
    pub output_root: Option<PathBuf>,
    pub sweep_directory: Option<String>,
    pub disabled_inputs: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileOuterConfig {
    pub parameter: Option<String>,
    pub prefix: Option<String>,
    pub values: Option<Vec<f64>>,
}

/// The optional TOML configuration file of the `search` command.
///
/// ```toml
/// model = "system.json.gz"
///
/// [grid]
/// min = 0.30
/// max = 0.60
/// step = 0.02
///
/// [solver]
/// program = "fit-binary"
/// max-iterations = 250
///
/// [outer]
/// values = [82.0, 85.0]
/// ```
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub model: Option<PathBuf>,
    pub grid: Option<FileGridConfig>,
    pub solver: Option<FileSolverConfig>,
    pub sweep: Option<FileSweepConfig>,
    pub outer: Option<FileOuterConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parses_all_sections() {
        let config = FileConfig::from_toml(
            r#"
            model = "system.json.gz"

            [grid]
            min = 0.3
            max = 0.6
            step = 0.02

            [solver]
            method = "nelder-mead"
            max-iterations = 400
            fit-parameters = ["teffratio", "fillout_factor"]
            goodness-of-fit = false
            program = "/opt/fit/bin/fit-binary"
            args = ["--quiet"]

            [sweep]
            target-parameter = "q@binary"
            workers = 6
            output-root = "runs"
            sweep-directory = "solutions"
            disabled-inputs = ["mesh01", "lc02"]

            [outer]
            parameter = "incl@binary"
            prefix = "incl"
            values = [82.0, 85.5]
            "#,
        )
        .unwrap();

        assert_eq!(config.model, Some(PathBuf::from("system.json.gz")));
        let grid = config.grid.unwrap();
        assert_eq!((grid.min, grid.max, grid.step), (Some(0.3), Some(0.6), Some(0.02)));
        let solver = config.solver.unwrap();
        assert_eq!(solver.max_iterations, Some(400));
        assert_eq!(solver.goodness_of_fit, Some(false));
        assert_eq!(solver.args, Some(vec!["--quiet".to_string()]));
        let sweep = config.sweep.unwrap();
        assert_eq!(sweep.workers, Some(6));
        assert_eq!(sweep.disabled_inputs.unwrap().len(), 2);
        assert_eq!(config.outer.unwrap().values, Some(vec![82.0, 85.5]));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FileConfig::from_toml("[grid]\nminimum = 0.1\n").is_err());
        assert!(FileConfig::from_toml("threads = 4\n").is_err());
    }

    #[test]
    fn from_file_wraps_parse_errors_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("search.toml");
        fs::write(&path, "[grid\nmin = 0.1").unwrap();

        let result = FileConfig::from_file(&path);

        match result {
            Err(CliError::FileParsing { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected a parse error, got {other:?}"),
        }
    }
}
