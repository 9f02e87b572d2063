use std::path::Path;

use marketmate_core::config::{AppConfig, MemoryBackend};

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

pub async fn run_doctor(config: &AppConfig) {
    let checks = vec![
        check_api_key(config),
        check_search(config),
        check_writable("Workspace", &config.workspace_dir()),
        check_store(config).await,
        check_reports(config),
    ];

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
}

fn usable_key(key: Option<&str>) -> bool {
    key.map_or(false, |k| !k.is_empty() && !k.starts_with("${"))
}

fn check_api_key(config: &AppConfig) -> CheckResult {
    let provider = &config.model.provider;
    let needs_key = provider != "ollama";

    if !needs_key || usable_key(config.model.api_key.as_deref()) {
        CheckResult {
            label: "Model".into(),
            ok: true,
            detail: format!("{} ({})", config.model.model_id, provider),
        }
    } else {
        CheckResult {
            label: "Model".into(),
            ok: false,
            detail: format!("No API key set for provider '{}'", provider),
        }
    }
}

fn check_search(config: &AppConfig) -> CheckResult {
    match config.search {
        Some(ref search) if usable_key(Some(&search.api_key)) => CheckResult {
            label: "Search".into(),
            ok: true,
            detail: format!("{} (up to {} results)", search.provider, search.max_results),
        },
        Some(ref search) => CheckResult {
            label: "Search".into(),
            ok: false,
            detail: format!("No API key set for search provider '{}'", search.provider),
        },
        None => CheckResult {
            label: "Search".into(),
            ok: false,
            detail: "Not configured (competitor, review and trend steps will use fallbacks)".into(),
        },
    }
}

fn check_writable(label: &str, dir: &Path) -> CheckResult {
    if let Err(e) = std::fs::create_dir_all(dir) {
        return CheckResult {
            label: label.into(),
            ok: false,
            detail: format!("{} (cannot create: {})", dir.display(), e),
        };
    }

    let test_file = dir.join(".doctor_test");
    match std::fs::write(&test_file, "test") {
        Ok(_) => {
            std::fs::remove_file(&test_file).ok();
            CheckResult {
                label: label.into(),
                ok: true,
                detail: format!("{}", dir.display()),
            }
        }
        Err(e) => CheckResult {
            label: label.into(),
            ok: false,
            detail: format!("{} (not writable: {})", dir.display(), e),
        },
    }
}

async fn check_store(config: &AppConfig) -> CheckResult {
    let backend = match config.memory.backend {
        MemoryBackend::File => "json files",
        MemoryBackend::Sqlite => "sqlite",
    };

    let probe = match marketmate_memory::open_store(config) {
        Ok(store) => store.get(".doctor").await.map(|_| ()),
        Err(e) => Err(e),
    };

    match probe {
        Ok(()) => CheckResult {
            label: "Snapshot store".into(),
            ok: true,
            detail: format!("{} in {}", backend, config.data_dir().display()),
        },
        Err(e) => CheckResult {
            label: "Snapshot store".into(),
            ok: false,
            detail: format!("{}: {}", config.data_dir().display(), e),
        },
    }
}

fn check_reports(config: &AppConfig) -> CheckResult {
    if !config.report.enabled {
        return CheckResult {
            label: "Reports".into(),
            ok: true,
            detail: "Disabled".into(),
        };
    }
    check_writable("Reports", &config.report_dir())
}
