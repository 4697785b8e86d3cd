use super::{json_pretty, load_config, registry, EXIT_SUCCESS};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct CheckReport {
    driver: String,
    apps: Vec<AppRoute>,
    organizations: usize,
    credentials: usize,
}

#[derive(Serialize)]
struct AppRoute {
    app: String,
    driver: String,
}

/// Parse the config and confirm every app resolves to a registered driver.
pub fn run(config_path: &Path, json: bool) -> Result<u8, String> {
    let config = load_config(config_path)?;
    let mut registry = registry()?;
    registry.set_default_provisioner(config.driver.default_provisioner.clone());

    let resolve = |requested: &str| {
        registry
            .resolve_id(requested)
            .map(str::to_owned)
            .map_err(|e| format!("driver error: {e}"))
    };
    let driver = resolve(&config.driver.name)?;

    let mut apps = Vec::with_capacity(config.apps.len());
    for app in &config.apps {
        let requested = app
            .provisioner
            .as_deref()
            .or(config.driver.provisioner.as_deref())
            .unwrap_or(config.driver.name.as_str());
        apps.push(AppRoute {
            app: app.key(),
            driver: resolve(requested)?,
        });
    }

    let report = CheckReport {
        driver,
        apps,
        organizations: config.organizations.len(),
        credentials: config.credentials.len(),
    };
    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        println!(
            "{}: ok (driver {}, {} apps, {} organizations, {} credentials)",
            config_path.display(),
            report.driver,
            report.apps.len(),
            report.organizations,
            report.credentials
        );
        for route in &report.apps {
            println!("  {:<24} -> {}", route.app, route.driver);
        }
    }
    Ok(EXIT_SUCCESS)
}
