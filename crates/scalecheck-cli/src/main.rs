//! scalecheck — queue-driven autoscaling validation harness.
//!
//! Provisions a disposable environment (namespace, credential secret,
//! workload, trigger authentication, scaling policy), drives load
//! through a topic subscription, and asserts that the observed
//! replica count converges to the expected values within bounded
//! time, then tears everything down.
//!
//! # Usage
//!
//! ```text
//! scalecheck simulate                 # full scenario, in-process environment
//! scalecheck render                   # print the manifests a run would apply
//! scalecheck simulate --format json   # machine-readable verdict
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use scalecheck_core::{HarnessConfig, QueueTriggerConfig, Scenario, manifest};
use scalecheck_scenario::ScenarioRunner;
use scalecheck_sim::{SimAutoscaler, SimBroker, SimCluster};

#[derive(Parser)]
#[command(
    name = "scalecheck",
    about = "scalecheck — validates queue-driven autoscaling end to end",
    version,
)]
struct Cli {
    /// Harness config file; defaults apply when it does not exist.
    #[arg(long, default_value = "scalecheck.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full scenario against the in-process simulated
    /// environment (cluster, broker, and scaler all local).
    Simulate {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Simulated scaler polling interval in milliseconds.
        #[arg(long, default_value = "500")]
        scaler_interval_ms: u64,
    },
    /// Print the manifests the scenario would apply, as a JSON
    /// stream suitable for piping into a control-plane client.
    Render,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scalecheck=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = HarnessConfig::load(&cli.config)?;

    match cli.command {
        Command::Simulate {
            format,
            scaler_interval_ms,
        } => simulate(config, &format, scaler_interval_ms).await,
        Command::Render => render(config),
    }
}

async fn simulate(config: HarnessConfig, format: &str, scaler_interval_ms: u64) -> anyhow::Result<()> {
    let cluster = SimCluster::new();
    let broker = SimBroker::new();
    let (scaler, shutdown) = SimAutoscaler::new(cluster.clone(), broker.clone())
        .spawn(Duration::from_millis(scaler_interval_ms));

    let runner = ScenarioRunner::new(&cluster, &broker, config, "sim-connection".to_string());
    let report = runner.run().await;

    let _ = shutdown.send(true);
    let _ = scaler.await;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print!("{}", report.render_text()),
    }
    if !report.passed {
        std::process::exit(1);
    }
    Ok(())
}

fn render(config: HarnessConfig) -> anyhow::Result<()> {
    let scenario = Scenario::new(&config.scenario);
    let trigger = QueueTriggerConfig::from_harness(&config, &scenario);
    // Rendering should work without a live credential.
    let credential = HarnessConfig::credential_from_env()
        .unwrap_or_else(|_| "<connection-string>".to_string());

    let manifests = [
        manifest::namespace(&scenario),
        manifest::secret(&scenario, &credential),
        manifest::deployment(&scenario, &config.workload_image),
        manifest::trigger_authentication(&scenario),
        manifest::scaled_object(&scenario, &trigger),
    ];
    for m in &manifests {
        println!("{}", serde_json::to_string_pretty(m)?);
    }
    Ok(())
}
