#[macro_use]
mod log;

mod config;
mod fetch;
mod gmail;
mod processor;
mod rules;
mod store;

use config::Config;
use gmail::client::GmailClient;
use gmail::types::truncate_str;
use std::path::PathBuf;
use std::process::Command;

fn print_usage() {
    eprintln!("Usage: gmrules [OPTIONS] COMMAND");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  fetch            Fetch message metadata into the local store");
    eprintln!("  process          Apply a rule set to unprocessed stored records");
    eprintln!("  list             Print every stored record and its processed status");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config=PATH    Use config file at PATH instead of default");
    eprintln!("  --rules=PATH     Rule set JSON file (default: rules.json next to config)");
    eprintln!("  --db=PATH        Use record store at PATH instead of the configured one");
    eprintln!("  --print-rules    Parse and print the rule set, then exit");
    eprintln!("  --help           Show this help");
}

/// Run a shell command that prints the API access token to stdout.
fn run_token_command(cmd: &str) -> Result<String, String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .output()
        .map_err(|e| format!("failed to execute token command: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "token command exited with {}: {}",
            output.status, stderr
        ));
    }

    let token = String::from_utf8(output.stdout)
        .map_err(|e| format!("token command output is not valid UTF-8: {}", e))?;

    let token = token.trim().to_string();
    if token.is_empty() {
        return Err("token command printed nothing".to_string());
    }
    Ok(token)
}

fn build_client(config: &Config) -> GmailClient {
    let token = match run_token_command(&config.gmail.token_command) {
        Ok(token) => token,
        Err(e) => {
            eprintln!("Error obtaining access token: {}", e);
            std::process::exit(1);
        }
    };
    GmailClient::new(&config.gmail.api_url, &config.gmail.user_id, &token)
}

/// Print every stored record with its processed status, one line each.
fn list_records(records: &[store::MailRecord]) {
    if records.is_empty() {
        println!("No records in the store.");
        return;
    }
    println!(
        "{:<20} {:<34} {:<40} {}",
        "ID", "From", "Subject", "Processed"
    );
    for record in records {
        let processed = match record.processed_at {
            Some(ts) => log::format_unix_secs(ts),
            None => "not yet".to_string(),
        };
        println!(
            "{:<20} {:<34} {:<40} {}",
            truncate_str(&record.id, 20),
            truncate_str(&record.from_address, 34),
            truncate_str(&record.subject, 40),
            processed
        );
    }
}

fn flag_value(args: &[String], prefix: &str) -> Option<PathBuf> {
    args.iter()
        .find(|a| a.starts_with(prefix))
        .map(|a| PathBuf::from(&a[prefix.len()..]))
}

fn print_rules(rules_path: &PathBuf) {
    if !rules_path.exists() {
        eprintln!("No rules file found at {}", rules_path.display());
        std::process::exit(1);
    }
    let rule_set = match rules::load_rule_set(rules_path) {
        Ok(rule_set) => rule_set,
        Err(e) => {
            eprintln!(
                "Failed to load rules from {}: {}",
                rules_path.display(),
                e
            );
            std::process::exit(1);
        }
    };
    println!("Rules file: {}", rules_path.display());
    print!("{}", rules::format_rule_set_for_display(&rule_set));
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        std::process::exit(0);
    }

    let config_path =
        flag_value(&args, "--config=").unwrap_or_else(config::default_config_path);
    let rules_path = flag_value(&args, "--rules=").unwrap_or_else(|| {
        config_path
            .parent()
            .map(|p| p.join("rules.json"))
            .unwrap_or_else(|| PathBuf::from("rules.json"))
    });

    if args.iter().any(|a| a == "--print-rules") {
        print_rules(&rules_path);
        std::process::exit(0);
    }

    let command = match args.iter().find(|a| !a.starts_with("--")) {
        Some(c) => c.as_str(),
        None => {
            print_usage();
            std::process::exit(1);
        }
    };

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config from {}: {}", config_path.display(), e);
            eprintln!("Create a config file with:");
            eprintln!();
            eprintln!("  [gmail]");
            eprintln!("  token_command = \"pass show gmail/api-token\"");
            std::process::exit(1);
        }
    };

    let db_path = flag_value(&args, "--db=").unwrap_or_else(|| config.db_path.clone());
    let store = match store::RecordStore::open(&db_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error opening record store at {}: {}", db_path.display(), e);
            std::process::exit(1);
        }
    };

    match command {
        "fetch" => match fetch::fetch_and_store(
            &build_client(&config),
            &store,
            config.fetch_max_results,
        ) {
            Ok(count) => {
                println!("Fetched and stored {} message(s).", count);
            }
            Err(e) => {
                eprintln!("Fetch failed: {}", e);
                std::process::exit(1);
            }
        },
        "process" => {
            let rule_set = match rules::load_rule_set(&rules_path) {
                Ok(rule_set) => rule_set,
                Err(e) => {
                    eprintln!(
                        "Failed to load rules from {}: {}",
                        rules_path.display(),
                        e
                    );
                    std::process::exit(1);
                }
            };
            match processor::process(&store, &build_client(&config), &rule_set) {
                Ok(summary) => {
                    println!(
                        "Processed {} of {} unprocessed record(s) ({} matched).",
                        summary.processed, summary.scanned, summary.matched
                    );
                }
                Err(e) => {
                    eprintln!("Processing failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        "list" => match store.all() {
            Ok(records) => list_records(&records),
            Err(e) => {
                eprintln!("Listing failed: {}", e);
                std::process::exit(1);
            }
        },
        other => {
            eprintln!("Unknown command '{}'", other);
            print_usage();
            std::process::exit(1);
        }
    }
}
