//! Binary entry point: arguments, configuration, logging, then the demo

use crate::app::cli::{load_config, AppSettings, Args, ConfigError};
use crate::app::demo::{self, DemoSettings, WorkProfile};
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use clap::Parser;
use std::process::ExitCode;

/// Parse the command line and run the demo on a multi-threaded runtime
pub fn startup() -> ExitCode {
    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("smartqueue")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(args))
}

async fn run(args: Args) -> ExitCode {
    let settings = match resolve_settings(&args).await {
        Ok(settings) => settings,
        Err(e) => {
            // Logging is not up yet
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let log_file = settings
        .log_file
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned());
    if let Err(e) = init_logging(
        Some(&settings.log_level),
        Some(settings.log_format.as_str()),
        log_file.as_deref(),
        settings.color,
    ) {
        eprintln!("Error: failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    log::info!("SmartQueue demo {} starting", crate::core::version::long_version());
    log::debug!("Resolved settings: {:?}", settings);

    let demo_settings = DemoSettings {
        queue: settings.queue.clone(),
        publish_interval: settings.publish_interval,
        run_for: settings.run_for,
        work: WorkProfile::default(),
    };

    let outcome = ShutdownCoordinator::guard_with_signals(|signal| async move {
        demo::run(&demo_settings, signal).await
    })
    .await;

    match outcome {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log_error_with_context(&e, "Running queue demo");
            ExitCode::FAILURE
        }
    }
}

async fn resolve_settings(args: &Args) -> Result<AppSettings, ConfigError> {
    let file = load_config(args.config_file.as_deref()).await?;
    AppSettings::resolve(args, file, std::io::IsTerminal::is_terminal(&std::io::stdout()))
}
