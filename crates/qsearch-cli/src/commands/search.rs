use crate::cli::SearchArgs;
use crate::config::{OptimizerCommand, build_config};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use qsearch::core::backend::command::CommandOptimizer;
use qsearch::engine::progress::ProgressReporter;
use qsearch::workflows::{self, sweep::SweepReport};
use tracing::{info, warn};

pub async fn run(args: SearchArgs) -> Result<()> {
    info!("Merging configuration from defaults, file, and CLI arguments...");
    let app_config = build_config(&args)?;
    let config = &app_config.core_config;

    let optimizer = optimizer_for(&app_config.optimizer);
    info!(
        "Using optimizer program {:?} with {} worker(s).",
        optimizer.program(),
        config.workers
    );

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Sweeping {} from {} to {} in steps of {} (output under {}).",
        config.target_parameter,
        config.grid.min,
        config.grid.max,
        config.grid.step,
        config.output_root.display()
    );

    let report = tokio::task::block_in_place(|| {
        workflows::sweep::run(&app_config.model_path, config, &optimizer, &reporter)
    })?;

    print_report(&report);
    if report.total_failed() > 0 {
        warn!(
            "{} unit(s) failed; rerun the same command to retry them.",
            report.total_failed()
        );
    }

    Ok(())
}

fn optimizer_for(command: &OptimizerCommand) -> CommandOptimizer {
    CommandOptimizer::new(command.program.clone()).with_args(command.args.clone())
}

fn print_report(report: &SweepReport) {
    for outer in &report.outers {
        let label = match outer.outer_value {
            Some(value) => format!(" [{}]", value),
            None => String::new(),
        };
        println!(
            "✓ {}{}: {} solved, {} skipped, {} failed",
            outer.directory.display(),
            label,
            outer.solved(),
            outer.skipped(),
            outer.failed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    #[test]
    fn optimizer_carries_program_and_leading_args() {
        let command = OptimizerCommand {
            program: PathBuf::from("/opt/fit/bin/fit-binary"),
            args: vec!["--backend".to_string(), "phoebe".to_string()],
        };

        let optimizer = optimizer_for(&command);

        assert_eq!(optimizer.program(), Path::new("/opt/fit/bin/fit-binary"));
    }
}
