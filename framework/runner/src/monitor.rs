use sysinfo::{Pid, ProcessRefreshKind, System};

use gust_core::prelude::CancelListener;

/// Monitor the orchestrator host's resource usage and report high usage.
///
/// This won't stop a run, it just warns the operator that results might be
/// skewed: when the host generating load is itself saturated, observed
/// latencies say more about the host than the target.
///
/// The CPU usage of this process is collected every
/// [sysinfo::MINIMUM_CPU_UPDATE_INTERVAL] and checked. If it is above 10%
/// with respect to the number of cores then a warning is logged.
pub(crate) fn start_monitor(mut cancel: CancelListener) {
    std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let this_process_pid = Pid::from_u32(std::process::id());
            let mut sys = System::new();

            sys.refresh_cpu();
            let cpu_count = sys.cpus().len();

            loop {
                if cancel.is_cancelled() {
                    break;
                }

                sys.refresh_process_specifics(this_process_pid, ProcessRefreshKind::new().with_cpu());

                let Some(process) = sys.process(this_process_pid) else {
                    log::trace!("Could not read own process info, stopping monitor");
                    break;
                };

                let usage = (process.cpu_usage() / (cpu_count * 100) as f32) * 100.0;
                if usage > 10.0 {
                    log::warn!("High CPU usage detected. The orchestrator is using {:.2}% of the CPU, with {} available cores", usage, cpu_count);
                }

                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            }
        })
        .expect("Failed to start monitor thread");
}
