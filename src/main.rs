use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use grader::compiler::Registry;
use grader::config::CliArgs;
use grader::error::JudgeError;
use grader::judge::Judge;
use grader::report::{FallbackReport, PLACEHOLDER};

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let settings = match cli.to_settings() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to resolve the run directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    // a report must exist even if the process is killed midway
    let report = settings.dir.join("correction").join("correction.yml");
    write_placeholder(&report).expect("Failed to write the placeholder report");

    let mut judge = None;
    let outcome = Judge::new(settings, Registry::standard()).and_then(|j| {
        let judge = judge.insert(j);
        judge.run()
    });

    match outcome {
        Ok(verdict) => {
            log::info!("final veredict: {verdict}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let fallback = if JudgeError::is_cheating(&e) {
                log::warn!("integrity violation: {e:#}");
                FallbackReport::cheating()
            } else {
                log::error!("judging aborted: {e:#}");
                FallbackReport::internal_error(format!("{e:#}"))
            };
            if let Err(e) = fallback.write(&report) {
                log::error!("{e:#}");
            }
            if let Some(judge) = &judge {
                match serde_json::to_string_pretty(&judge.snapshot()) {
                    Ok(dump) => eprintln!("{dump}"),
                    Err(e) => log::error!("Failed to dump the judge state: {e}"),
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn write_placeholder(report: &Path) -> Result<()> {
    if let Some(parent) = report.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(report, PLACEHOLDER)?;
    Ok(())
}
