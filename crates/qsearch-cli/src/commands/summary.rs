use crate::cli::SummaryArgs;
use crate::error::{CliError, Result};
use qsearch::workflows::summary::{self, SummaryRow, SweepSummary};
use tracing::{info, warn};

pub async fn run(args: SummaryArgs) -> Result<()> {
    let directories = summary::discover_sweep_directories(&args.root, &args.sweep_dir)?;
    if directories.is_empty() {
        return Err(CliError::Argument(format!(
            "No '{}' solution directories found under {}",
            args.sweep_dir,
            args.root.display()
        )));
    }
    info!("Summarizing {} solution directories.", directories.len());

    let summary = tokio::task::block_in_place(|| summary::summarize(&directories))?;

    for row in &summary.rows {
        println!("{}", format_row(row));
    }
    for path in &summary.unreadable {
        warn!("Unreadable solution: {}", path.display());
    }
    println!("{}", headline(&summary));

    if let Some(csv_path) = &args.csv {
        summary.write_csv(csv_path)?;
        println!("Summary written to: {}", csv_path.display());
    }

    Ok(())
}

fn format_row(row: &SummaryRow) -> String {
    let outer = match (&row.outer_parameter, row.outer_value) {
        (Some(parameter), Some(value)) => format!("{}={:<8} ", parameter, value),
        _ => String::new(),
    };
    let goodness = match row.goodness_of_fit {
        Some(value) => format!("{:.6}", value),
        None => "-".to_string(),
    };
    format!(
        "{}{}={:.4}  goodness-of-fit={}",
        outer, row.parameter, row.grid_value, goodness
    )
}

fn headline(summary: &SweepSummary) -> String {
    match summary.best() {
        Some(best) => format!(
            "✓ {} solutions; best fit: {}",
            summary.rows.len(),
            format_row(best)
        ),
        None => format!(
            "{} solutions; none carries a finite goodness of fit.",
            summary.rows.len()
        ),
    }
}
