use drybox_common::Fault;
use tracing::{debug, warn};

// aborted web requests are routine, keep them at debug
pub fn log_fault(task: &'static str, fault: &Fault) {
    match fault {
        Fault::Request(_) => debug!(task, kind = fault.kind(), "{fault}"),
        _ => warn!(task, kind = fault.kind(), "{fault}"),
    }
}
