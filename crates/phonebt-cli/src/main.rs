//! PhoneBT binary: interactive HFP client over the simulated gateway

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use phonebt_cli::audio::SystemAudioRouter;
use phonebt_cli::cli::{PairedDevice, Shell};
use phonebt_cli::gateway::SimulatedGateway;
use phonebt_cli::tools::ToolDispatcher;
use phonebt_hfp_core::HfpEngine;

/// PhoneBT - control a paired phone's calls from your desktop
#[derive(Parser)]
#[command(name = "phonebt")]
#[command(about = "Hands-free profile client for a paired mobile phone")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "phonebt_cli=debug,phonebt_hfp_core=debug"
    } else {
        "phonebt_cli=info,phonebt_hfp_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let gateway = SimulatedGateway::new();
    let engine = HfpEngine::new(Arc::new(gateway.clone()));
    engine.start();

    let dispatcher = Arc::new(ToolDispatcher::new(
        engine.clone(),
        Arc::new(SystemAudioRouter),
    ));
    let devices = vec![PairedDevice {
        name: "Simulated Phone".to_string(),
        address: "AA:BB:CC:11:22:33".to_string(),
    }];
    let mut shell = Shell::new(engine.clone(), dispatcher, devices, Some(gateway));

    let exit = tokio::select! {
        result = shell.run() => match result {
            Ok(code) => code,
            Err(e) => {
                eprintln!("fatal: {}", e);
                1
            }
        },
        _ = shutdown_signal() => {
            println!();
            info!("signal received, disconnecting");
            0
        }
    };

    engine.disconnect().await;
    engine.shutdown().await;
    ExitCode::from(exit as u8)
}

/// Resolve on SIGINT or, on unix, SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).ok();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = async {
                match term.as_mut() {
                    Some(term) => { term.recv().await; }
                    None => std::future::pending::<()>().await,
                }
            } => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
