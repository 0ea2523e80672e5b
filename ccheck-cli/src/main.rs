use ccheck::Harness;
use ccheck_cli::{build_config, read_tests, Args, ReportOutput};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;
    let tests = read_tests(args.tests.as_deref())?;

    let harness = Harness::new(config);
    info!(
        "Grading programs in {} (build base {})",
        args.source_dir.display(),
        harness.config().build_base.display()
    );
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, stopping run...");
        } else {
            std::future::pending::<()>().await;
        }
    };
    let report = harness.run_until(&args.source_dir, &tests, shutdown).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ReportOutput::from(&report))?);
    } else {
        println!("{}", report.transcript());
    }

    if !report.overall_passed {
        std::process::exit(1);
    }
    Ok(())
}
