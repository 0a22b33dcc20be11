pub mod cli;
pub mod config;
pub mod expr;
pub mod harvest;
pub mod links;
pub mod retrieval;

use crate::config::DorepyConfig;
use crate::expr::{Filter, MatchOptions, PatternTable, Spanned, Token, tokenize_with};
use crate::harvest::{HarvestReport, Harvester, Selection, select_links};
use crate::links::{HtmlDocument, ensure_scheme};
use crate::retrieval::{LocalRetriever, ThreadPause, file_url};
use anyhow::{Context, Result};
pub use cli::{Cli, ColorMode, Commands, OutputFormat, cli_parse};
use colored::Colorize;
use comfy_table::Table;
use log::{LevelFilter, info, warn};
use serde_json::json;
use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;

/// Install the logger; `DOREPY_LOG` (env_logger syntax) overrides the flags
pub fn init_logger(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.parse_env("DOREPY_LOG");
    builder.format_timestamp(None);
    builder.format_indent(Some(2));
    let _ = builder.try_init();
}

fn apply_color_mode(mode: ColorMode) {
    match mode {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }
}

/// Match options from the config, with command-line flags taking precedence
fn effective_options(cli: &Cli, config: &DorepyConfig) -> MatchOptions {
    let mut options = config.match_options();
    if cli.case_sensitive {
        options = options.case_sensitive(true);
    } else if cli.ignore_case {
        options = options.case_sensitive(false);
    }
    if let Some(policy) = cli.on_invalid_pattern {
        options = options.on_invalid_pattern(policy.into());
    }
    options
}

fn effective_patterns(cli: &Cli, config: &DorepyConfig) -> Result<PatternTable> {
    let mut table = config.patterns.clone();
    for def in &cli.defines {
        table
            .define(def.name.clone(), def.pattern.clone())
            .with_context(|| format!("Invalid pattern definition '{}'", def.name))?;
    }
    Ok(table)
}

fn build_filter(expression: &str, table: &PatternTable, options: MatchOptions) -> Result<Filter> {
    let filter = Filter::parse_with(expression, table, options)
        .with_context(|| format!("Invalid filter expression: {expression}"))?;
    for pattern in filter.disabled_patterns() {
        warn!("pattern \"{pattern}\" is disabled because it does not compile");
    }
    Ok(filter)
}

fn write_output_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output file '{}'", path.display()))
}

fn emit(output: Option<&Path>, text: &str) -> Result<()> {
    print!("{text}");
    if let Some(path) = output {
        write_output_file(path, text)?;
    }
    Ok(())
}

fn token_table(tokens: &[Spanned]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", "Offset", "Token", "Text"]);
    for (idx, spanned) in tokens.iter().enumerate() {
        let text = match &spanned.token {
            Token::Pattern(text) => text.clone(),
            _ => String::new(),
        };
        table.add_row(vec![
            idx.to_string(),
            spanned.offset.to_string(),
            spanned.token.label().to_string(),
            text,
        ]);
    }
    table
}

fn read_subjects(subjects: &[String]) -> Result<Vec<String>> {
    if !subjects.is_empty() {
        return Ok(subjects.to_vec());
    }
    let stdin = std::io::stdin();
    let mut lines = Vec::new();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read subjects from stdin")?;
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

fn read_page(page: &Path) -> Result<HtmlDocument> {
    let html = std::fs::read_to_string(page)
        .with_context(|| format!("Failed to read page '{}'", page.display()))?;
    Ok(HtmlDocument::new(html))
}

fn page_url(page: &Path) -> Result<String> {
    let absolute = page
        .canonicalize()
        .with_context(|| format!("Failed to resolve page path '{}'", page.display()))?;
    Ok(file_url(&absolute))
}

pub fn run() -> Result<ExitCode> {
    let cli = cli_parse();
    init_logger(cli.verbose, cli.quiet);
    apply_color_mode(cli.color);

    let config =
        crate::config::load_config(cli.config.as_deref()).context("Failed to load config")?;
    let options = effective_options(&cli, &config);
    let table = effective_patterns(&cli, &config)?;
    let output = cli.output.as_deref();

    info!(
        "matching is case {}",
        if options.case_sensitive {
            "sensitive"
        } else {
            "insensitive"
        }
    );
    if let Some(config_path) = &cli.config {
        info!("config file: {}", config_path.display());
    }

    match &cli.command {
        Commands::Check { expression, tokens } => {
            let spanned = tokenize_with(expression, &table)
                .with_context(|| format!("Invalid filter expression: {expression}"))?;
            let filter = build_filter(expression, &table, options)?;

            let text = match cli.format {
                OutputFormat::Text => {
                    let mut text = format!("{filter}\n");
                    if *tokens {
                        text.push_str(&format!("{}\n", token_table(&spanned)));
                    }
                    text
                }
                OutputFormat::Json => {
                    let mut body = json!({
                        "expression": filter.to_string(),
                        "patterns": filter.expr().leaves(),
                        "disabled_patterns": filter.disabled_patterns(),
                        "case_sensitive": options.case_sensitive,
                    });
                    if *tokens {
                        body["tokens"] = spanned
                            .iter()
                            .map(|s| {
                                json!({
                                    "token": s.token.label(),
                                    "offset": s.offset,
                                    "text": match &s.token {
                                        Token::Pattern(text) => Some(text.as_str()),
                                        _ => None,
                                    },
                                })
                            })
                            .collect();
                    }
                    let pretty = serde_json::to_string_pretty(&json!({ "check": body }))
                        .context("Failed to serialize check output")?;
                    format!("{pretty}\n")
                }
            };
            emit(output, &text)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Match {
            expression,
            subjects,
            all,
        } => {
            let filter = build_filter(expression, &table, options)?;
            let subjects = read_subjects(subjects)?;
            let verdicts: Vec<(&str, bool)> = subjects
                .iter()
                .map(|s| (s.as_str(), filter.matches(s)))
                .collect();
            let accepted = verdicts.iter().filter(|(_, ok)| *ok).count();
            info!("{accepted} of {} subjects accepted", verdicts.len());

            match cli.format {
                OutputFormat::Text => {
                    let mut plain = String::new();
                    for (subject, ok) in &verdicts {
                        if *all {
                            let mark = if *ok { "+" } else { "-" };
                            plain.push_str(&format!("{mark} {subject}\n"));
                            if *ok {
                                println!("{} {}", mark.green().bold(), subject);
                            } else {
                                println!("{} {}", mark.red().bold(), subject.dimmed());
                            }
                        } else if *ok {
                            plain.push_str(&format!("{subject}\n"));
                            println!("{subject}");
                        }
                    }
                    if let Some(path) = output {
                        write_output_file(path, &plain)?;
                    }
                }
                OutputFormat::Json => {
                    let results: Vec<_> = verdicts
                        .iter()
                        .filter(|(_, ok)| *all || *ok)
                        .map(|(subject, ok)| json!({ "subject": subject, "accepted": ok }))
                        .collect();
                    let pretty = serde_json::to_string_pretty(&json!({
                        "match": {
                            "expression": filter.to_string(),
                            "examined": verdicts.len(),
                            "accepted": accepted,
                            "results": results,
                        }
                    }))
                    .context("Failed to serialize match output")?;
                    emit(output, &format!("{pretty}\n"))?;
                }
            }

            Ok(if accepted > 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Commands::Links {
            pages,
            expression,
            base,
        } => {
            let filter = build_filter(expression, &table, options)?;
            let base = base.as_deref().map(ensure_scheme);

            let mut selection = Selection::default();
            for page in pages {
                let document = read_page(page)?;
                let found = select_links(&document, base.as_deref(), &filter);
                info!(
                    "{}: {} of {} links accepted",
                    page.display(),
                    found.accepted.len(),
                    found.examined
                );
                selection.merge(found);
            }

            let text = match cli.format {
                OutputFormat::Text => crate::harvest::format_selection_text(&selection),
                OutputFormat::Json => {
                    let sources: Vec<String> =
                        pages.iter().map(|p| p.display().to_string()).collect();
                    format!(
                        "{}\n",
                        crate::harvest::format_selection_json(&sources, &filter, &selection)
                    )
                }
            };
            emit(output, &text)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Harvest {
            pages,
            expression,
            base,
            dest,
            wait,
        } => {
            let filter = build_filter(expression, &table, options)?;
            std::fs::create_dir_all(dest)
                .with_context(|| format!("Failed to create directory '{}'", dest.display()))?;

            let mut rules = config.retrieval.clone();
            if let Some(wait) = wait {
                rules.wait_secs = *wait;
            }

            let mut retriever = LocalRetriever;
            let mut pause = ThreadPause;
            let mut harvester =
                Harvester::new(&mut retriever, &mut pause, rules.retry_policy(), dest);

            let mut report = HarvestReport::default();
            for page in pages {
                let document = read_page(page)?;
                let page_base = match base {
                    Some(base) => ensure_scheme(base),
                    None => page_url(page)?,
                };
                info!("harvesting {} (base {page_base})", page.display());
                report.merge(harvester.harvest(&document, Some(page_base.as_str()), &filter));
            }

            let text = match cli.format {
                OutputFormat::Text => crate::harvest::format_report_text(&report),
                OutputFormat::Json => format!("{}\n", crate::harvest::format_report_json(&report)),
            };
            emit(output, &text)?;

            Ok(if report.failed.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("valid arguments")
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = DorepyConfig::default();
        config.on_invalid_pattern = crate::expr::InvalidPatternPolicy::NeverMatch;

        let cli = parse(&["dorepy", "check", "\"x\""]);
        let options = effective_options(&cli, &config);
        assert!(!options.case_sensitive);
        assert_eq!(
            options.on_invalid_pattern,
            crate::expr::InvalidPatternPolicy::NeverMatch
        );

        let cli = parse(&["dorepy", "-c", "--on-invalid-pattern", "fail", "check", "\"x\""]);
        let options = effective_options(&cli, &config);
        assert!(options.case_sensitive);
        assert_eq!(
            options.on_invalid_pattern,
            crate::expr::InvalidPatternPolicy::Fail
        );
    }

    #[test]
    fn test_ignore_case_overrides_config() {
        let mut config = DorepyConfig::default();
        config.case_sensitive = true;

        let cli = parse(&["dorepy", "check", "\"x\""]);
        assert!(effective_options(&cli, &config).case_sensitive);

        let cli = parse(&["dorepy", "--ignore-case", "check", "\"x\""]);
        assert!(!effective_options(&cli, &config).case_sensitive);
    }

    #[test]
    fn test_defines_extend_config_patterns() {
        let mut config = DorepyConfig::default();
        config.patterns.define("X", "cat").unwrap();
        config.patterns.define("Y", "dog").unwrap();

        let cli = parse(&["dorepy", "-D", "Y=wolf", "-D", "Z=fish", "check", "X"]);
        let table = effective_patterns(&cli, &config).unwrap();
        assert_eq!(table.get("X"), Some("cat"));
        assert_eq!(table.get("Y"), Some("wolf"));
        assert_eq!(table.get("Z"), Some("fish"));
    }

    #[test]
    fn test_token_table_lists_every_token() {
        let tokens = crate::expr::tokenize(r#""a" OR NOT "b""#).unwrap();
        let rendered = token_table(&tokens).to_string();
        assert!(rendered.contains("pattern"));
        assert!(rendered.contains("OR"));
        assert!(rendered.contains("NOT"));
    }
}
