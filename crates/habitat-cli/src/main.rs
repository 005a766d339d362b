use anyhow::Result;
use log::LevelFilter;
use std::path::PathBuf;

use habitat_classifiers::models::factory::ClassifierRegistry;
use habitat_cli::cli::build_cli;
use habitat_cli::run::config::RunConfig;
use habitat_cli::run::runner;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("HABITAT_LOG", "error,habitat=info"))
        .init();

    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let config_path: &PathBuf = run_matches
                .get_one("config")
                .ok_or_else(|| anyhow::anyhow!("missing configuration path"))?;
            log::info!("[Habitat::Run] Using config: {:?}", config_path);

            let config = RunConfig::from_arguments(config_path, run_matches)?;
            match runner::run_pipeline(&config) {
                Ok(report) if report.n_failures() == 0 => Ok(()),
                Ok(report) => {
                    log::error!("Run finished with {} failed task(s)", report.n_failures());
                    std::process::exit(1)
                }
                Err(e) => {
                    log::error!("Run failed: {:#}", e);
                    std::process::exit(1)
                }
            }
        }
        Some(("classifiers", sub_m)) => {
            let seed = sub_m.get_one::<u64>("seed").copied().unwrap_or(42);
            let registry = ClassifierRegistry::standard(seed);
            println!("{}", serde_json::to_string_pretty(registry.specs())?);
            Ok(())
        }
        Some(("config", _)) => {
            println!("{}", serde_json::to_string_pretty(&RunConfig::default())?);
            Ok(())
        }
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}
