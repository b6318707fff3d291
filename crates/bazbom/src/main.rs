//! `depscan`: scan npm/PyPI projects for known vulnerabilities, from the
//! command line or as an HTTP service (C8, C9, §4.9).

use bazbom::cli::{Cli, Commands};
use bazbom::config::{env_overrides, FileConfig, Overrides, Settings};
use bazbom::progress::ScanProgressReporter;
use bazbom::{build_app_state, collect_manifest_files, run_scan};
use bazbom_core::ScanOptions;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn config_path(explicit: &Option<PathBuf>) -> PathBuf {
    explicit.clone().unwrap_or_else(|| PathBuf::from("depscan.toml"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            bazbom::output::print_scan_error(&format!("failed to start async runtime: {e}"));
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Commands::Scan {
            path,
            json,
            no_include_dev,
            ignore_severity,
            osv_api_url,
            cache_path,
            cache_ttl_hours,
        } => {
            let overrides = Overrides {
                osv_api_url,
                cache_path,
                cache_ttl_hours,
                ..Default::default()
            };
            let file = FileConfig::load_or_default(&config_path(&cli.config));
            let settings = Settings::resolve(&file, &env_overrides(), &overrides);
            let options = ScanOptions {
                include_dev_dependencies: !no_include_dev,
                ignore_severities: ignore_severity,
            };
            runtime.block_on(run_scan_command(&settings, &path, options, json))
        }
        Commands::Serve {
            bind,
            allow_origin,
            osv_api_url,
            cache_path,
            cache_ttl_hours,
            max_concurrent_scans,
        } => {
            let overrides = Overrides {
                osv_api_url,
                cache_path,
                cache_ttl_hours,
                bind_addr: bind,
                allowed_origins: if allow_origin.is_empty() { None } else { Some(allow_origin) },
                max_concurrent_scans,
            };
            let file = FileConfig::load_or_default(&config_path(&cli.config));
            let settings = Settings::resolve(&file, &env_overrides(), &overrides);
            runtime.block_on(run_serve_command(&settings))
        }
    }
}

async fn run_scan_command(
    settings: &Settings,
    path: &std::path::Path,
    options: ScanOptions,
    json_out: Option<PathBuf>,
) -> ExitCode {
    let files = match collect_manifest_files(path) {
        Ok(files) => files,
        Err(e) => {
            bazbom::output::print_scan_error(&format!("failed to read {}: {e}", path.display()));
            return ExitCode::from(2);
        }
    };

    let reporter = ScanProgressReporter::new();
    let result = run_scan(settings, files, options, Some(&reporter)).await;

    match result {
        Ok(report) => {
            reporter.finish("done");
            if let Some(json_path) = &json_out {
                match serde_json::to_string_pretty(&report) {
                    Ok(body) => {
                        if let Err(e) = std::fs::write(json_path, body) {
                            bazbom::output::print_scan_error(&format!(
                                "failed to write {}: {e}",
                                json_path.display()
                            ));
                            return ExitCode::from(2);
                        }
                    }
                    Err(e) => {
                        bazbom::output::print_scan_error(&format!("failed to encode report: {e}"));
                        return ExitCode::from(2);
                    }
                }
            }
            bazbom::output::print_report(&report);
            if report.vulnerable_count > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            reporter.abandon("failed");
            bazbom::output::print_scan_error(&e.to_string());
            ExitCode::from(2)
        }
    }
}

async fn run_serve_command(settings: &Settings) -> ExitCode {
    let state = build_app_state(settings);
    let app = bazbom_dashboard::router(state, settings.allowed_origins.clone(), settings.max_body_bytes);

    let listener = match tokio::net::TcpListener::bind(&settings.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            bazbom::output::print_scan_error(&format!("failed to bind {}: {e}", settings.bind_addr));
            return ExitCode::from(2);
        }
    };

    tracing::info!(addr = %settings.bind_addr, "depscan serve listening");
    println!("{} listening on {}", "depscan".bold(), settings.bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        bazbom::output::print_scan_error(&format!("server error: {e}"));
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}
