//! Unit tests for CLI commands

use crate::cli::{execute, Cli, Commands};
use clap::Parser;
use std::io::Write;

const ROUTES: &str = r#"
routes:
  - method: get
    endpoint: /accounts/{account_id}/items
    library: lib/accounts
    callback: list_items
    endpoint_parameters:
      account_id: { type: integer, pattern: "[0-9]+" }
  - method: post
    endpoint: /accounts
    library: lib/accounts
    callback: create_account
errors:
  InternalError:
    status_code: 500
    status_code_text: Internal Server Error
    user_error_code: 9000
    user_message: Something went wrong
"#;

fn route_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    file.write_all(ROUTES.as_bytes()).unwrap();
    file
}

fn run(args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(args).unwrap();
    let mut out = Vec::new();
    execute(&cli, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

#[test]
fn test_match_command_parses_defaults() {
    let cli = Cli::try_parse_from(["routegate", "match", "--path", "/a"]).unwrap();
    match cli.command {
        Commands::Match { method, path, routes } => {
            assert_eq!(method, "GET");
            assert_eq!(path, "/a");
            assert!(routes.is_none());
        }
        _ => panic!("Expected Match command"),
    }
}

#[test]
fn test_check_reports_summary() {
    let file = route_file();
    let path = file.path().to_str().unwrap();
    let out = run(&["routegate", "check", "--routes", path]).unwrap();
    assert!(out.starts_with("ok: 2 routes"), "{out}");
}

#[test]
fn test_routes_lists_compiled_patterns() {
    let file = route_file();
    let path = file.path().to_str().unwrap();
    let out = run(&["routegate", "routes", "--routes", path]).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("/accounts/[0-9]+/items"));
    assert!(lines[0].ends_with("-> lib/accounts.list_items"));
    assert!(lines[1].starts_with("POST"));
}

#[test]
fn test_match_shows_params_and_rejects_unknown_paths() {
    let file = route_file();
    let path = file.path().to_str().unwrap();
    let out = run(&[
        "routegate", "match", "--routes", path, "--path", "/accounts/42/items.json",
    ])
    .unwrap();
    assert!(out.contains("account_id = 42"));
    assert!(out.contains("format = json"));

    assert!(run(&["routegate", "match", "--routes", path, "--path", "/nowhere"]).is_err());
}

#[test]
fn test_check_fails_on_missing_file() {
    assert!(run(&["routegate", "check", "--routes", "/definitely/not/here.yaml"]).is_err());
}
