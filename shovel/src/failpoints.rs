use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, ShovelResult};

/// Triggered right before the replication output is assembled from the tracker.
pub const BUILD_REPLICATION_OUTPUT: &str = "replication_worker.build_output";

/// Fails with [`ErrorKind::FailpointTriggered`] when the named failpoint is configured to return.
pub fn shovel_fail_point(name: &str) -> ShovelResult<()> {
    fail_point!(name, |parameter| {
        let detail = match parameter {
            Some(parameter) => format!("The failpoint '{name}' returned an error: {parameter}"),
            None => format!("The failpoint '{name}' returned an error"),
        };

        bail!(
            ErrorKind::FailpointTriggered,
            "An error occurred in a fail point",
            detail
        );
    });

    Ok(())
}
