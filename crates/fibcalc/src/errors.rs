//! Error handling and exit codes.

use std::process::ExitCode;

use fibcalc_core::calculator::FibError;
use fibcalc_core::constants::exit_codes;

/// Exit code for a calculation error.
#[must_use]
pub fn handle_error(err: &FibError) -> i32 {
    err.exit_code()
}

/// Exit code for any application error; non-calculation failures are generic.
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<FibError>()
        .map_or(exit_codes::ERROR_GENERIC, handle_error)
}

/// Process status for an application error.
#[must_use]
pub fn exit_status(err: &anyhow::Error) -> ExitCode {
    u8::try_from(exit_code(err)).map_or(ExitCode::FAILURE, ExitCode::from)
}
