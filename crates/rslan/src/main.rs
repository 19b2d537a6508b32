//! rslan binary entry point.

use clap::Parser;
use tracing::error;

use rslan::Cli;
use rslan_core::LogGate;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.validate() {
        eprintln!("rslan: {}", e);
        std::process::exit(2);
    }

    // Console configuration mode closes the gate to keep prompts readable.
    let gate = LogGate::new();
    let log_format = cli.log_format.into();
    if let Err(e) =
        rslan_core::init_logging(cli.verbose, cli.log_file.as_deref(), log_format, gate.clone())
    {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start runtime");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(rslan::app::run(cli, gate)) {
        error!(error = %e, "rslan failed");
        std::process::exit(1);
    }
}
