use fail::fail_point;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};

/// Makes the executing DDL report "not done" without reaching the sink.
pub const EXECUTE_DDL_NOT_DONE: &str = "ddl_coordinator.execute_ddl_not_done";
/// Fails the tick right before the executing DDL is handed to the sink.
pub const BEFORE_EMIT_DDL: &str = "ddl_coordinator.before_emit_ddl";

/// Returns an error when the fail point `name` is configured to return.
pub fn cdc_fail_point(name: &str) -> CdcResult<()> {
    fail_point!(name, |parameter| {
        let detail = match parameter {
            Some(parameter) => format!("The failpoint '{name}' returned an error: {parameter}"),
            None => format!("The failpoint '{name}' returned an error"),
        };

        bail!(
            ErrorKind::InjectedFailure,
            "An error occurred in a fail point",
            detail
        );
    });

    Ok(())
}

/// Returns `true` when the fail point `name` is configured to return.
pub fn cdc_fail_point_active(name: &str) -> bool {
    fail_point!(name, |_| true);

    false
}
