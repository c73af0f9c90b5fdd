use concierge_core::config::{AppConfig, LoadOptions};
use concierge_db::migrations;
use serde::Serialize;

use crate::commands::{block_on, open_pool, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Exit code is 0 only when every check passes.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let mut checks =
                vec![DoctorCheck::pass("config_validation", "configuration loaded and validated")];
            checks.extend(check_database(&config));
            checks
        }
        Err(error) => vec![
            DoctorCheck::fail("config_validation", error.to_string()),
            DoctorCheck::skipped("database_connectivity", "configuration did not load"),
            DoctorCheck::skipped("schema_version", "configuration did not load"),
        ],
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let outcome = block_on("doctor", async {
        let pool = match open_pool(config).await {
            Ok(pool) => pool,
            Err((_, message, _)) => {
                return vec![
                    DoctorCheck::fail("database_connectivity", message),
                    DoctorCheck::skipped("schema_version", "the database is unreachable"),
                ];
            }
        };

        let connectivity = DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        );
        let schema = match migrations::applied_versions(&pool).await {
            Ok(applied) => schema_check(&applied),
            Err(error) => DoctorCheck::fail("schema_version", error.to_string()),
        };
        pool.close().await;
        vec![connectivity, schema]
    });

    outcome.unwrap_or_else(|failure| {
        vec![
            DoctorCheck::fail("database_connectivity", failure.output),
            DoctorCheck::skipped("schema_version", "the database is unreachable"),
        ]
    })
}

fn schema_check(applied: &[i64]) -> DoctorCheck {
    let expected = migrations::latest_version();
    match applied.iter().max() {
        Some(&current) if current >= expected => {
            DoctorCheck::pass("schema_version", format!("schema is at version {current}"))
        }
        Some(&current) => DoctorCheck::fail(
            "schema_version",
            format!("schema is at version {current}, expected {expected}; run `concierge migrate`"),
        ),
        None => DoctorCheck::fail(
            "schema_version",
            "no migrations applied; run `concierge migrate`".to_string(),
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
