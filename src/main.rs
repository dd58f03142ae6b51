use anyhow::Result;

use stdio_bench::bench::{run_load_check, BenchmarkRunner};
use stdio_bench::config::{Cli, Commands, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::load()?;

    // Initialize logging with a configured level
    let log_level = cli.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);
    match cli.log_format() {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }

    match cli.command {
        Commands::Bench(args) => {
            let json_output = args.json;
            let config = args.into_suite_config();
            tracing::info!(
                "Benchmarking {} and {}",
                config.gatekeeper.executable.display(),
                config.health_monitor.executable.display()
            );

            let report = BenchmarkRunner::new(config).run().await;

            if json_output {
                println!("{}", report.to_json());
            } else {
                report.print_table();
            }
        }

        Commands::LoadCheck(args) => {
            let config = args.into_config();
            let result = run_load_check(&config).await?;
            result.print_summary();

            if !result.passed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
