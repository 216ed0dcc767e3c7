use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::executor::{RunOutcome, RunResult};
use crate::resolver::RunConfig;

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "run id")]
    run_id: String,
    target: String,
    environment: String,
    #[tabled(rename = "VUs")]
    vus: u32,
    #[tabled(rename = "observed")]
    duration: String,
    sinks: String,
    outcome: String,
}

/// Print a one-row summary of the finished run.
pub(crate) fn print_summary(config: &RunConfig, result: &RunResult) {
    let row = SummaryRow {
        run_id: result.run_id.clone(),
        target: config.target_url.to_string(),
        environment: config.environment.to_string(),
        vus: config.vus,
        duration: format!("{}s", result.duration_observed.as_secs()),
        sinks: config.fan_out.output_selector(),
        outcome: match &result.outcome {
            RunOutcome::Success => "success".to_string(),
            RunOutcome::Failed(err) => format!("failed: {err}"),
        },
    };

    let mut table = Table::new([row]);
    table.with(Style::modern());

    println!("\nRun summary");
    println!("{table}");
}
