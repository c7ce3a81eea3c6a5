use flexi_logger::{DeferredNow, Logger, LoggerHandle};
use log::Record;

use crate::Error;

/// `LEVEL message`, without timestamps; the CLI output is read by people.
fn cli_format(
    w: &mut dyn std::io::Write,
    _now: &mut DeferredNow,
    record: &Record,
) -> std::io::Result<()> {
    write!(w, "{:<5} {}", record.level(), record.args())
}

/// Log to stderr so stdout stays clean for command output.
pub fn init() -> Result<LoggerHandle, Error> {
    let handle = Logger::try_with_env_or_str("info")?
        .format(cli_format)
        .log_to_stderr()
        .start()?;

    Ok(handle)
}
