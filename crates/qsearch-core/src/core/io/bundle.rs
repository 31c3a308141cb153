use crate::core::model::bundle::Bundle;
use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const JSON_EXTENSION: &str = "json";
const GZIP_EXTENSION: &str = "gz";

#[derive(Debug, Error)]
pub enum BundleLoadError {
    #[error("Model source '{path}' does not exist", path = path.display())]
    NotFound { path: PathBuf },

    #[error(
        "Model source '{path}' is not a recognized format; expected a '.json' or '.gz' file",
        path = path.display()
    )]
    UnrecognizedFormat { path: PathBuf },

    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON parsing error for '{path}': {source}", path = path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Json,
    Gzip,
}

fn detect_format(path: &Path) -> Result<SourceFormat, BundleLoadError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(JSON_EXTENSION) => Ok(SourceFormat::Json),
        Some(GZIP_EXTENSION) => Ok(SourceFormat::Gzip),
        _ => Err(BundleLoadError::UnrecognizedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Loads a [`Bundle`] from a `.json` or gzip-compressed `.gz` source.
pub fn load_bundle(path: &Path) -> Result<Bundle, BundleLoadError> {
    load_model(path)
}

/// Loads any JSON-deserializable model document from `path`.
///
/// Gzip sources are inflated into a temporary `.json` file first; the temporary file
/// is removed after parsing whether or not parsing succeeds.
///
/// # Errors
///
/// Returns [`BundleLoadError::NotFound`] if `path` does not exist,
/// [`BundleLoadError::UnrecognizedFormat`] if its extension is neither `json` nor
/// `gz`, and an I/O or JSON error if the document cannot be read or parsed.
pub fn load_model<M: DeserializeOwned>(path: &Path) -> Result<M, BundleLoadError> {
    load_model_via(path, &std::env::temp_dir())
}

/// Same as [`load_model`], inflating gzip sources inside `scratch`.
fn load_model_via<M: DeserializeOwned>(path: &Path, scratch: &Path) -> Result<M, BundleLoadError> {
    if !path.exists() {
        return Err(BundleLoadError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let format = detect_format(path)?;
    info!("Reading in model from {}", path.display());

    match format {
        SourceFormat::Json => read_json(path),
        SourceFormat::Gzip => {
            let inflated = inflate_to_temp(path, scratch)?;
            debug!(
                "Inflated {} into temporary file {}",
                path.display(),
                inflated.path().display()
            );
            let model = read_json(inflated.path());
            let temp_path = inflated.path().to_path_buf();
            inflated.close().map_err(|e| BundleLoadError::Io {
                path: temp_path,
                source: e,
            })?;
            model
        }
    }
}

fn read_json<M: DeserializeOwned>(path: &Path) -> Result<M, BundleLoadError> {
    let file = File::open(path).map_err(|e| BundleLoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| BundleLoadError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

fn inflate_to_temp(
    path: &Path,
    scratch: &Path,
) -> Result<tempfile::NamedTempFile, BundleLoadError> {
    let io_error = |source: io::Error| BundleLoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let source = File::open(path).map_err(io_error)?;
    let mut decoder = GzDecoder::new(BufReader::new(source));
    let mut temp = tempfile::Builder::new()
        .prefix("qsearch-model-")
        .suffix(".json")
        .tempfile_in(scratch)
        .map_err(io_error)?;
    io::copy(&mut decoder, temp.as_file_mut()).map_err(io_error)?;
    temp.as_file_mut().flush().map_err(io_error)?;
    Ok(temp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{BaseModel, Topology};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs;
    use tempfile::tempdir;

    const BUNDLE_JSON: &str = r#"{
        "components": ["binary", "primary", "secondary", "contact_envelope"],
        "datasets": [{"name": "lc01", "enabled": false}, {"name": "mesh01"}],
        "parameters": {"q@binary@orbit@component": 0.45, "incl@binary@orbit@component": 82.0}
    }"#;

    fn write_gzip(path: &Path, text: &str) {
        let file = File::create(path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn loads_plain_json_bundle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("system.json");
        fs::write(&path, BUNDLE_JSON).unwrap();

        let bundle = load_bundle(&path).unwrap();

        assert_eq!(bundle.topology(), Topology::Contact);
        assert_eq!(bundle.parameter("q").unwrap(), 0.45);
        assert!(!bundle.dataset("lc01").unwrap().enabled);
    }

    #[test]
    fn loads_gzipped_bundle_without_touching_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("system.json.gz");
        write_gzip(&path, BUNDLE_JSON);
        let original = fs::read(&path).unwrap();

        let scratch = tempdir().unwrap();

        let bundle: Bundle = load_model_via(&path, scratch.path()).unwrap();

        assert_eq!(bundle.parameter("incl@binary").unwrap(), 82.0);
        assert_eq!(fs::read(&path).unwrap(), original);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn inflated_copy_is_removed_when_parsing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json.gz");
        write_gzip(&path, "{ \"components\": ");
        let scratch = tempdir().unwrap();

        let result: Result<Bundle, _> = load_model_via(&path, scratch.path());

        assert!(matches!(result, Err(BundleLoadError::Json { .. })));
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_source_is_not_found() {
        let dir = tempdir().unwrap();
        let result = load_bundle(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(BundleLoadError::NotFound { .. })));
    }

    #[test]
    fn unrecognized_extension_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("system.yaml");
        fs::write(&path, BUNDLE_JSON).unwrap();
        let result = load_bundle(&path);
        assert!(matches!(
            result,
            Err(BundleLoadError::UnrecognizedFormat { .. })
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let result = load_bundle(&path);
        assert!(matches!(result, Err(BundleLoadError::Json { .. })));
    }

    #[test]
    fn corrupt_gzip_is_an_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.gz");
        fs::write(&path, b"definitely not gzip").unwrap();
        let result = load_bundle(&path);
        assert!(matches!(result, Err(BundleLoadError::Io { .. })));
    }
}
