//! Project-wide constants.

use std::path::PathBuf;
use std::time::Duration;

/// Items requested per page for list commands.
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Wait between two polls of an async job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// The command that reports the state of an async job.
pub const JOB_QUERY_COMMAND: &str = "queryAsyncJobResult";

/// Commands whose lower-cased name contains this are paginated.
pub const LIST_MARKER: &str = "list";

/// Parameter carrying the request signature.
pub const SIGNATURE_KEY: &str = "signature";

pub const ENV_ENDPOINT: &str = "CLOUDSTACK_ENDPOINT";
pub const ENV_API_KEY: &str = "CLOUDSTACK_API_KEY";
pub const ENV_SECRET: &str = "CLOUDSTACK_SECRET";

/// Default profile database path: `~/.stratus/stratus.db`.
pub fn default_db_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".stratus").join("stratus.db"))
}
