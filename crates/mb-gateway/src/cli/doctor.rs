use mb_domain::config::{Config, ConfigSeverity};

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("mb-gateway doctor");
    println!("=================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_database(config, &mut all_passed).await;
    check_bus(config, &mut all_passed).await;
    check_launcher(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({} error(s))", issues.len(), error_count),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

async fn check_database(config: &Config, all_passed: &mut bool) {
    let reachable = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        mb_store::pool::connect(&config.database),
    )
    .await
    .map(|r| r.is_ok())
    .unwrap_or(false);

    let url = config.database.effective_url();
    print_check(
        "Database reachable",
        reachable,
        if reachable { url } else { format!("{url} (unreachable)") },
    );
    if !reachable {
        *all_passed = false;
    }
}

async fn check_bus(config: &Config, all_passed: &mut bool) {
    let reachable = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        mb_bus::BusClient::connect(&config.bus),
    )
    .await
    .map(|r| r.is_ok())
    .unwrap_or(false);

    let url = config.bus.effective_url();
    print_check(
        "Bus reachable",
        reachable,
        if reachable { url } else { format!("{url} (unreachable)") },
    );
    if !reachable {
        *all_passed = false;
    }
}

fn check_launcher(config: &Config, all_passed: &mut bool) {
    let ok = mb_launcher::from_config(&config.launcher).is_ok();
    print_check(
        "Launcher configured",
        ok,
        format!("{:?} backend, image {}", config.launcher.kind, config.launcher.bot_image),
    );
    if !ok {
        *all_passed = false;
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
