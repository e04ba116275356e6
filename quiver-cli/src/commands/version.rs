//! `quiver version` command - Display version information.

use crate::error::CliResult;
use crate::output::{self, kv};

/// Package version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
const NAME: &str = env!("CARGO_PKG_NAME");

/// Run the version command
pub async fn run() -> CliResult<()> {
    output::section("quiver");
    output::newline();

    kv("Version", VERSION);
    kv("Binary", NAME);

    #[cfg(debug_assertions)]
    let build_mode = "debug";
    #[cfg(not(debug_assertions))]
    let build_mode = "release";

    kv("Build", build_mode);
    kv("Search API", quiver_migrate::service::DEFAULT_API_VERSION);

    output::newline();

    output::section("Components");
    kv("quiver-schema", env!("CARGO_PKG_VERSION"));
    kv("quiver-migrate", env!("CARGO_PKG_VERSION"));

    Ok(())
}
