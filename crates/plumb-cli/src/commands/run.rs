use super::{colorize_status, json_pretty, load_config, EXIT_FAILURE, EXIT_SUCCESS};
use plumb_core::{CancelToken, Harness, ScenarioReport};
use std::path::Path;
use tracing::debug;

fn detail(report: &ScenarioReport) -> String {
    match report.failure() {
        Some(outcome) => format!(
            "{}: {}",
            outcome.name,
            outcome.last_error.as_deref().unwrap_or("-")
        ),
        None => report
            .outcomes
            .iter()
            .map(|o| format!("{}:{}", o.name, o.attempts))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

pub fn run(config_path: &Path, workers: usize, cancel: &CancelToken, json: bool) -> Result<u8, String> {
    let config = load_config(config_path)?;
    let (harness, _cluster) = Harness::simulated(config).map_err(|e| e.to_string())?;
    let apps = harness.config().apps.clone();
    if apps.is_empty() {
        println!("no apps configured in {}", config_path.display());
        return Ok(EXIT_SUCCESS);
    }

    debug!(workers, apps = apps.len(), config = %config_path.display(), "starting run");
    let results = harness.run_parallel(&apps, workers, cancel);

    if json {
        let entries: Vec<serde_json::Value> = results
            .iter()
            .zip(&apps)
            .map(|(result, app)| match result {
                Ok(report) => serde_json::to_value(report)
                    .unwrap_or_else(|e| serde_json::json!({ "app": app.key(), "error": e.to_string() })),
                Err(e) => serde_json::json!({ "app": app.key(), "error": e.to_string() }),
            })
            .collect();
        println!("{}", json_pretty(&entries)?);
    } else {
        println!("{:<24} {:<8} {:<10} DETAIL", "APP", "DRIVER", "STATUS");
        for (result, app) in results.iter().zip(&apps) {
            match result {
                Ok(report) => println!(
                    "{:<24} {:<8} {:<10} {}",
                    report.app,
                    report.driver,
                    colorize_status(&report.status.to_string()),
                    detail(report)
                ),
                Err(e) => println!(
                    "{:<24} {:<8} {:<10} {e}",
                    app.key(),
                    "-",
                    colorize_status("error")
                ),
            }
        }
    }

    if let Some(err) = results.iter().find_map(|r| r.as_ref().err()) {
        return Err(err.to_string());
    }
    if results.iter().flatten().all(ScenarioReport::passed) {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILURE)
    }
}
