use gust_core::prelude::OrchestratorError;
use gust_runner::prelude::{init, run};

/// Exit code 0 on success; every failure kind maps to its own non-zero code,
/// propagated unchanged to the external trigger.
fn main() {
    let cli = init();

    match run(cli) {
        Ok(result) => std::process::exit(result.outcome.exit_code()),
        Err(err) => {
            log::error!("{err:#}");
            let code = err
                .downcast_ref::<OrchestratorError>()
                .map(OrchestratorError::exit_code)
                .unwrap_or(1);
            std::process::exit(code);
        }
    }
}
