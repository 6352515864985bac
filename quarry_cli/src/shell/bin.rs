// Binary entry point for quarry
// This is a thin wrapper that delegates to the library implementation

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    quarry_cli::shell::run().await
}
