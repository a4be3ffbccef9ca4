//! `tund [-f|--foreground] INTERFACE-NAME`

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use tund::prelude::*;

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();
    let args = match StartupArgs::resolve(&argv) {
        Ok(args) => args,
        Err(usage) => {
            println!("{usage}");
            return ExitCode::SUCCESS;
        }
    };

    let config = match TunnelConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tund: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_level);

    match run(&args, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !e.already_reported() {
                tracing::error!(interface = %args.interface_name, error = %e, "tund exiting");
            }
            if e.device_was_live() {
                tracing::debug!(interface = %args.interface_name, "runtime device left to process exit");
            }
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over `LOG_LEVEL`.
fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &StartupArgs, config: TunnelConfig) -> tund_core::Result<()> {
    let backend = LinuxBackend::new(&config);
    let workers = config.effective_worker_threads();
    let coordinator = Coordinator::new(Arc::new(backend), config);

    // Still single-threaded here, so the re-exec sees a clean process.
    if coordinator.select_mode(args)? == Launch::Detached {
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .enable_all()
        .build()
        .map_err(LifecycleError::Runtime)?;

    runtime.block_on(async {
        let signals = SignalSource::register().map_err(LifecycleError::Signal)?;
        let event = coordinator.run(args, signals.recv()).await?;
        tracing::debug!(interface = %args.interface_name, cause = ?event.cause(), "shut down");
        Ok::<(), LifecycleError>(())
    })
}
