//! Subcommand implementations
//!
//! Every command writes its result to `out` so it can be captured in tests;
//! progress and diagnostics go to stderr through `tracing` or `eprintln!`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use anvil_agent::{AgentWorkflow, CodeRequest, RequestPipeline, WorkflowEvent, WorkflowOutcome};
use anvil_foundation::{
    cache_key, redact, AnvilConfig, ContextId, JsonStore, WordEstimator, ANVIL_CONFIG_FILE,
};
use anvil_patch::{parse_detailed, ApplyOutcome, ApplyReport, PatchApplier};
use anvil_provider::ReplayProvider;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Read a file, or stdin for `-`
pub fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        return std::io::read_to_string(std::io::stdin()).context("failed to read stdin");
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub fn load_config(root: &Path) -> anyhow::Result<AnvilConfig> {
    Ok(AnvilConfig::load(root)?)
}

fn write_json<T: serde::Serialize>(out: &mut impl Write, value: &T) -> anyhow::Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

// ============================================================================
// parse / apply
// ============================================================================

pub fn parse_reply(reply: &str, format: OutputFormat, out: &mut impl Write) -> anyhow::Result<()> {
    let parsed = parse_detailed(reply);
    if format == OutputFormat::Json {
        return write_json(out, &parsed);
    }

    for instruction in &parsed.instructions {
        let range = match instruction.line_range() {
            Some((start, end)) => format!(" lines {}-{}", start, end),
            None => String::new(),
        };
        writeln!(
            out,
            "{} {}{} ({} bytes)",
            instruction.action,
            instruction.file_path,
            range,
            instruction.code.len()
        )?;
    }
    for issue in &parsed.issues {
        writeln!(out, "warning: {}", issue)?;
    }
    writeln!(out, "{} instruction(s)", parsed.instructions.len())?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    pub dry_run: bool,
    /// Roll back everything when any instruction fails
    pub atomic: bool,
}

fn applier_for(root: &Path, config: &AnvilConfig) -> anyhow::Result<PatchApplier> {
    Ok(PatchApplier::new(root)?.with_protected_paths(&config.protected_paths)?)
}

pub fn apply_reply(
    root: &Path,
    config: &AnvilConfig,
    reply: &str,
    options: ApplyOptions,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let applier = applier_for(root, config)?;
    let parsed = parse_detailed(reply);
    for issue in &parsed.issues {
        tracing::warn!("reply issue: {}", redact(&issue.to_string()));
    }

    let report = if options.dry_run {
        applier.preview_all(&parsed.instructions)
    } else {
        applier.apply_all(&parsed.instructions)
    };

    let rolled_back = options.atomic && !report.is_success() && !report.dry_run;
    if rolled_back {
        let rollback = report.rollback();
        for failure in &rollback.failures {
            eprintln!("rollback failed: {}", failure);
        }
        tracing::info!("rolled back {} change(s)", rollback.restored);
    }

    if format == OutputFormat::Json {
        write_json(out, &report)?;
    } else {
        print_report(&report, out)?;
        if rolled_back {
            writeln!(out, "all changes rolled back")?;
        }
    }

    finish_report(&report)
}

fn print_report(report: &ApplyReport, out: &mut impl Write) -> anyhow::Result<()> {
    let verb = if report.dry_run { "would apply" } else { "applied" };
    for entry in &report.entries {
        match &entry.outcome {
            ApplyOutcome::Applied(change) => {
                let created = if change.created { " (new file)" } else { "" };
                writeln!(
                    out,
                    "{} {} {}: {} → {} lines{}",
                    verb, entry.action, entry.file_path, change.lines_before, change.lines_after, created
                )?;
            }
            ApplyOutcome::Failed { reason } => {
                writeln!(out, "rejected {} {}: {}", entry.action, entry.file_path, reason)?;
            }
        }
    }
    writeln!(out, "{}", report.summary())?;
    Ok(())
}

/// Non-zero exit when anything failed
fn finish_report(report: &ApplyReport) -> anyhow::Result<()> {
    let summary = report.summary();
    if summary.failed > 0 {
        bail!("{} of {} instruction(s) failed", summary.failed, summary.total);
    }
    Ok(())
}

// ============================================================================
// run
// ============================================================================

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub reply: PathBuf,
    pub code: String,
    pub language: String,
    pub action: String,
    pub agent: bool,
    pub dry_run: bool,
    pub context: Option<String>,
    pub aux_files: Vec<PathBuf>,
}

/// Send one request; Ctrl-C cancels it
pub async fn run_request(
    root: &Path,
    config: &AnvilConfig,
    args: RunArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let provider = Arc::new(ReplayProvider::from_file(&args.reply).await?);
    let pipeline = RequestPipeline::from_config(config, provider);

    let context = args
        .context
        .map(ContextId::new)
        .unwrap_or_else(ContextId::global);
    let request = CodeRequest::new(args.code, args.language, args.action)
        .with_aux_files(args.aux_files)
        .with_context(context);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ncancelling...");
            trigger.cancel();
        }
    });

    let mut stdout = std::io::stdout();

    if !args.agent {
        let response = pipeline.send(&request, &cancel).await?;
        if format == OutputFormat::Json {
            return write_json(&mut stdout, &response);
        }
        writeln!(stdout, "{}", response.text)?;
        if response.cache_hit {
            eprintln!("(cached)");
        }
        if response.cancelled {
            eprintln!("(cancelled; partial reply not cached)");
        }
        return Ok(());
    }

    let workflow = AgentWorkflow::new(pipeline, applier_for(root, config)?).dry_run(args.dry_run);
    let (tx, mut rx) = mpsc::channel(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let outcome = workflow.run(request, &cancel, Some(tx)).await;
    let _ = printer.await;
    let outcome = outcome?;

    if format == OutputFormat::Json {
        return write_json(&mut stdout, &outcome);
    }
    print_outcome(&outcome, &mut stdout)?;
    finish_report(&outcome.report)
}

fn print_event(event: &WorkflowEvent) {
    match event {
        WorkflowEvent::Started { key } => {
            eprintln!("[anvil] request {}", &key[..key.len().min(12)])
        }
        WorkflowEvent::InstructionReady { file_path } => {
            eprintln!("[anvil] received edit for {}", file_path)
        }
        WorkflowEvent::Parsed {
            instructions,
            issues,
        } => eprintln!("[anvil] {} edit(s), {} warning(s)", instructions, issues),
        WorkflowEvent::Applied { file_path } => eprintln!("[anvil] ✓ {}", file_path),
        WorkflowEvent::Rejected { file_path, reason } => {
            eprintln!("[anvil] ✗ {}: {}", file_path, reason)
        }
        WorkflowEvent::Cancelled => eprintln!("[anvil] cancelled; nothing applied"),
        WorkflowEvent::Finished { .. } => {}
    }
}

fn print_outcome(outcome: &WorkflowOutcome, out: &mut impl Write) -> anyhow::Result<()> {
    if outcome.response.cancelled {
        writeln!(out, "cancelled")?;
        return Ok(());
    }
    for issue in &outcome.parse.issues {
        writeln!(out, "warning: {}", issue)?;
    }
    print_report(&outcome.report, out)
}

// ============================================================================
// estimate / redact / key / config
// ============================================================================

pub async fn estimate(
    config: &AnvilConfig,
    text: &str,
    aux_files: &[PathBuf],
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let count = WordEstimator::new(config.token_multiplier)
        .estimate(text, aux_files)
        .await;
    let budget = config.token_budget();
    let within_budget = !budget.is_over_budget(count.total);

    if format == OutputFormat::Json {
        let value = serde_json::json!({
            "tokens": count,
            "maxTokens": budget.max_tokens,
            "withinBudget": within_budget,
        });
        return write_json(out, &value);
    }

    writeln!(out, "~{} tokens", count.total)?;
    writeln!(out, "words: {}, punctuation: {}", count.words, count.punctuation)?;
    if !aux_files.is_empty() {
        writeln!(
            out,
            "aux files: {} counted, {} skipped",
            count.aux_files_counted, count.aux_files_skipped
        )?;
    }
    if budget.is_unlimited() {
        writeln!(out, "budget: unlimited")?;
    } else if within_budget {
        writeln!(
            out,
            "budget: {} of {} remaining",
            budget.remaining(count.total),
            budget.max_tokens
        )?;
    } else {
        writeln!(out, "budget: exceeded (limit {})", budget.max_tokens)?;
    }
    Ok(())
}

pub fn redact_text(text: &str, out: &mut impl Write) -> anyhow::Result<()> {
    write!(out, "{}", redact(text))?;
    Ok(())
}

pub fn print_key(code: &str, language: &str, action: &str, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "{}", cache_key(code, language, action))?;
    Ok(())
}

pub fn show_config(config: &AnvilConfig, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "{}", config.to_pretty_json()?)?;
    Ok(())
}

pub fn init_config(root: &Path, force: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let store = JsonStore::project(root);
    let path = store.file_path(ANVIL_CONFIG_FILE);
    if store.exists(ANVIL_CONFIG_FILE) && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    AnvilConfig::default().save_project(root)?;
    writeln!(out, "wrote {}", path.display())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = "\
--- FILE: notes.txt ---
action: append
```
second
```
--- FILE: /etc/passwd ---
```
nope
```
";

    fn output(f: impl FnOnce(&mut Vec<u8>) -> anyhow::Result<()>) -> (String, anyhow::Result<()>) {
        let mut buf = Vec::new();
        let result = f(&mut buf);
        (String::from_utf8(buf).unwrap(), result)
    }

    #[test]
    fn test_parse_lists_instructions() {
        let (text, result) = output(|out| parse_reply(REPLY, OutputFormat::Text, out));
        assert!(result.is_ok());
        assert!(text.contains("append notes.txt"));
        assert!(text.contains("replace /etc/passwd"));
        assert!(text.contains("2 instruction(s)"));
    }

    #[test]
    fn test_parse_json() {
        let (text, _) = output(|out| parse_reply(REPLY, OutputFormat::Json, out));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["instructions"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_apply_reports_failure_and_exits_non_zero() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "first\n").unwrap();

        let (text, result) = output(|out| {
            apply_reply(
                dir.path(),
                &AnvilConfig::default(),
                REPLY,
                ApplyOptions::default(),
                OutputFormat::Text,
                out,
            )
        });
        assert!(result.is_err());
        assert!(text.contains("1 applied, 1 failed"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
            "first\nsecond\n"
        );
    }

    #[test]
    fn test_atomic_apply_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "first\n").unwrap();
        let options = ApplyOptions {
            dry_run: false,
            atomic: true,
        };

        let (text, result) = output(|out| {
            apply_reply(dir.path(), &AnvilConfig::default(), REPLY, options, OutputFormat::Text, out)
        });
        assert!(result.is_err());
        assert!(text.contains("rolled back"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
            "first\n"
        );
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let reply = "--- FILE: a.txt ---\n```\nhello\n```\n";
        let options = ApplyOptions {
            dry_run: true,
            atomic: false,
        };

        let (text, result) = output(|out| {
            apply_reply(dir.path(), &AnvilConfig::default(), reply, options, OutputFormat::Text, out)
        });
        assert!(result.is_ok());
        assert!(text.contains("would apply replace a.txt"));
        assert!(!dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_protected_paths_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let reply = "--- FILE: .git/config ---\n```\n[core]\n```\n";

        let (_, result) = output(|out| {
            apply_reply(
                dir.path(),
                &AnvilConfig::default(),
                reply,
                ApplyOptions::default(),
                OutputFormat::Text,
                out,
            )
        });
        assert!(result.is_err());
        assert!(!dir.path().join(".git/config").exists());
    }

    #[test]
    fn test_redact_and_key() {
        let (text, _) = output(|out| redact_text("password=hunter2", out));
        assert_eq!(text, "password=[REDACTED]");

        let (key, _) = output(|out| print_key("x", "rust", "fix", out));
        assert_eq!(key.trim(), cache_key("x", "rust", "fix"));
        assert_eq!(key.trim().len(), 64);
    }

    #[tokio::test]
    async fn test_estimate_reports_budget() {
        let config = AnvilConfig {
            max_tokens: 2,
            ..AnvilConfig::default()
        };
        let mut buf = Vec::new();
        estimate(&config, "one two three", &[], OutputFormat::Json, &mut buf)
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["withinBudget"], false);
        assert_eq!(value["maxTokens"], 2);
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();

        let (text, result) = output(|out| init_config(dir.path(), false, out));
        assert!(result.is_ok());
        assert!(text.contains(ANVIL_CONFIG_FILE));

        let (_, again) = output(|out| init_config(dir.path(), false, out));
        assert!(again.is_err());

        let (_, forced) = output(|out| init_config(dir.path(), true, out));
        assert!(forced.is_ok());
    }
}
