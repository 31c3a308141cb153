use super::{FitOutcome, Optimizer, SolveError, SolverConfig};
use crate::core::model::BaseModel;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::debug;

const OPTIMIZE_SUBCOMMAND: &str = "optimize";
const COMPUTE_SUBCOMMAND: &str = "compute";

fn default_converged() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct OptimizeReply {
    #[serde(default = "default_converged")]
    converged: bool,
    #[serde(flatten)]
    outcome: FitOutcome,
}

#[derive(Debug, Deserialize)]
struct ComputeReply {
    goodness_of_fit: f64,
}

/// Delegates optimization to an external executable.
///
/// The program is invoked once per call, with any configured leading arguments:
///
/// - `<program> [args..] optimize <model.json> <config.json>` must print a JSON
///   [`FitOutcome`] on stdout, optionally with `"converged": false` to report a
///   non-converged fit.
/// - `<program> [args..] compute <model.json>` must print
///   `{"goodness_of_fit": <number>}` on stdout.
///
/// A non-zero exit status fails the call with the program's stderr as the reason.
/// Model and configuration files are temporary and removed after each call.
#[derive(Debug, Clone)]
pub struct CommandOptimizer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandOptimizer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn invoke<T: DeserializeOwned>(
        &self,
        subcommand: &str,
        inputs: &[&Path],
    ) -> Result<T, SolveError> {
        debug!(
            "Invoking optimizer '{}' {} with {} input file(s)",
            self.program.display(),
            subcommand,
            inputs.len()
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(subcommand)
            .args(inputs)
            .output()
            .map_err(|e| {
                SolveError::Backend(format!(
                    "failed to launch '{}': {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SolveError::Backend(format!(
                "'{} {}' exited with {}: {}",
                self.program.display(),
                subcommand,
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            SolveError::Backend(format!(
                "unreadable reply from '{} {}': {}",
                self.program.display(),
                subcommand,
                e
            ))
        })
    }
}

fn write_json_temp<T: Serialize>(value: &T) -> Result<NamedTempFile, SolveError> {
    let backend = |e: std::io::Error| SolveError::Backend(format!("temporary file error: {e}"));

    let mut file = tempfile::Builder::new()
        .prefix("qsearch-")
        .suffix(".json")
        .tempfile()
        .map_err(backend)?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        serde_json::to_writer(&mut writer, value)
            .map_err(|e| SolveError::Backend(format!("failed to serialize input: {e}")))?;
        writer.flush().map_err(backend)?;
    }
    Ok(file)
}

impl<M> Optimizer<M> for CommandOptimizer
where
    M: BaseModel + Serialize,
{
    fn optimize(&self, model: &M, config: &SolverConfig) -> Result<FitOutcome, SolveError> {
        if config.fit_parameters.is_empty() {
            return Err(SolveError::InvalidConfig(
                "no free parameters to fit".to_string(),
            ));
        }
        let model_file = write_json_temp(model)?;
        let config_file = write_json_temp(config)?;

        let reply: OptimizeReply = self.invoke(
            OPTIMIZE_SUBCOMMAND,
            &[model_file.path(), config_file.path()],
        )?;

        if !reply.converged {
            return Err(SolveError::NotConverged {
                iterations: reply.outcome.iterations.unwrap_or(config.max_iterations),
            });
        }
        Ok(reply.outcome)
    }

    fn goodness_of_fit(&self, model: &M) -> Result<f64, SolveError> {
        let model_file = write_json_temp(model)?;
        let reply: ComputeReply = self.invoke(COMPUTE_SUBCOMMAND, &[model_file.path()])?;
        Ok(reply.goodness_of_fit)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::model::bundle::Bundle;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn script_optimizer(body: &str) -> (TempDir, CommandOptimizer) {
        let dir = tempdir().unwrap();
        let script = dir.path().join("optimizer.sh");
        fs::write(&script, body).unwrap();
        let optimizer =
            CommandOptimizer::new("sh").with_args(vec![script.to_string_lossy().to_string()]);
        (dir, optimizer)
    }

    fn solver_config() -> SolverConfig {
        SolverConfig {
            method: "nelder-mead".to_string(),
            max_iterations: 250,
            fit_parameters: vec!["teffratio".to_string()],
        }
    }

    fn bundle() -> Bundle {
        Bundle::new()
            .with_parameter("q@binary", 0.32)
            .with_parameter("teffratio@binary", 0.9)
    }

    #[test]
    fn optimize_parses_reply_and_passes_model() {
        let (dir, optimizer) = script_optimizer(
            r#"
cp "$2" "$(dirname "$0")/seen-model.json"
echo '{"iterations": 42, "fitted_parameters": {"teffratio@binary": 0.95}, "objective": 3.5}'
"#,
        );

        let outcome = optimizer.optimize(&bundle(), &solver_config()).unwrap();

        assert_eq!(outcome.iterations, Some(42));
        assert_eq!(outcome.objective, Some(3.5));
        assert_eq!(outcome.fitted_parameters["teffratio@binary"], 0.95);
        let seen: Bundle =
            serde_json::from_str(&fs::read_to_string(dir.path().join("seen-model.json")).unwrap())
                .unwrap();
        assert_eq!(seen.parameters["q@binary"], 0.32);
    }

    #[test]
    fn non_converged_reply_is_an_error() {
        let (_dir, optimizer) =
            script_optimizer(r#"echo '{"converged": false, "iterations": 250}'"#);
        let result = optimizer.optimize(&bundle(), &solver_config());
        assert!(matches!(
            result,
            Err(SolveError::NotConverged { iterations: 250 })
        ));
    }

    #[test]
    fn failing_program_reports_stderr() {
        let (_dir, optimizer) = script_optimizer("echo 'matrix is singular' >&2\nexit 3\n");
        let err = optimizer
            .optimize(&bundle(), &solver_config())
            .unwrap_err();
        assert!(err.to_string().contains("matrix is singular"));
    }

    #[test]
    fn compute_returns_goodness_of_fit() {
        let (_dir, optimizer) = script_optimizer(
            r#"
if [ "$1" = "compute" ]; then
  echo '{"goodness_of_fit": 12.25}'
else
  exit 1
fi
"#,
        );
        let chi2 = Optimizer::<Bundle>::goodness_of_fit(&optimizer, &bundle()).unwrap();
        assert_eq!(chi2, 12.25);
    }

    #[test]
    fn empty_fit_parameters_are_rejected_before_launch() {
        let optimizer = CommandOptimizer::new("/nonexistent/optimizer");
        let config = SolverConfig {
            fit_parameters: vec![],
            ..solver_config()
        };
        let result = optimizer.optimize(&bundle(), &config);
        assert!(matches!(result, Err(SolveError::InvalidConfig(_))));
    }

    #[test]
    fn missing_program_is_a_backend_error() {
        let optimizer = CommandOptimizer::new("/nonexistent/optimizer");
        let result = optimizer.optimize(&bundle(), &solver_config());
        assert!(matches!(result, Err(SolveError::Backend(_))));
    }
}
