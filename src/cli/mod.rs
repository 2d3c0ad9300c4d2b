//! Session Sentinel CLI Module
//!
//! Command-line interface for detection, evaluation and reporting.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::detection::{DetectionConfig, DetectionSummary, HybridClassifier};
use crate::evaluation::{evaluate_signals, EvaluationReport};
use crate::reporting::SessionReport;
use crate::session::{self, columns, load_sessions, write_sessions, GroundTruth, SessionLabel};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn alert(s: &str) -> ColoredString  { s.truecolor(235, 110, 100) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hybrid rule + anomaly-detection bot session classifier")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify sessions and write the labeled table
    Detect {
        /// Input session table (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Detection configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the severity threshold
        #[arg(long, allow_hyphen_values = true)]
        threshold: Option<f64>,
    },

    /// Score each signal of a labeled table against user_id ground truth
    Evaluate {
        /// Labeled session table
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Write the report tables of a labeled table as CSV
    Report {
        /// Labeled session table
        #[arg(short, long)]
        data: PathBuf,

        /// Directory for the CSV tables
        #[arg(short, long)]
        output_dir: PathBuf,
    },

    /// Show data information
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Print the default configuration as JSON
    Config,
}

// ─── Commands ──────────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>, threshold: Option<f64>) -> anyhow::Result<DetectionConfig> {
    let config = match path {
        Some(p) => DetectionConfig::from_json_file(p)?,
        None => DetectionConfig::default(),
    };
    let config = match threshold {
        Some(t) => config.with_severity_threshold(t),
        None => config,
    };
    config.validate()?;
    Ok(config)
}

fn load_step(path: &Path) -> anyhow::Result<DataFrame> {
    step_run("Loading data");
    let start = Instant::now();
    let df = load_sessions(path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));
    Ok(df)
}

pub fn cmd_detect(
    data_path: &Path,
    output_path: &Path,
    config_path: Option<&Path>,
    threshold: Option<f64>,
) -> anyhow::Result<()> {
    section("Detect");

    let config = load_config(config_path, threshold)?;
    let df = load_step(data_path)?;

    step_run("Classifying sessions");
    let start = Instant::now();
    let output = HybridClassifier::new(config.clone()).run(&df)?;
    step_done(&format!("{:?}", start.elapsed()));

    let table = session::annotate_ground_truth(&output.table)?;

    step_run(&format!("Saving → {}", output_path.display()));
    write_sessions(&table, output_path)?;
    step_done(&format!("{} rows × {} cols", table.height(), table.width()));

    print_summary(&output.summary, config.severity_threshold);
    Ok(())
}

fn print_summary(summary: &DetectionSummary, threshold: f64) {
    let pct = |n: usize| {
        if summary.n_sessions == 0 {
            0.0
        } else {
            100.0 * n as f64 / summary.n_sessions as f64
        }
    };
    let row = |key: &str, n: usize| kv(key, &format!("{:>7}  {:>5.1}%", n, pct(n)));

    println!();
    line_box_top();
    line_box_center(&format!("{}", "Detection Summary".white().bold()));
    line_box_sep();
    line_box(&kv("Sessions     ", &summary.n_sessions.to_string()));
    line_box(&kv("Trained on   ", &format!("{} Human sessions", summary.n_train)));
    line_box(&kv("Threshold    ", &format!("{}", threshold)));
    line_box_empty();
    line_box(&row("Rule bots    ", summary.rule_bots));
    line_box(&row("Forest flags ", summary.if_bots));
    line_box(&row("SVM flags    ", summary.svm_bots));
    if let Some(n) = summary.baseline_bots {
        line_box(&row("Baseline     ", n));
    }
    line_box_sep();
    line_box(&format!("{} {}", alert("Final bots   "), format!("{:>7}  {:>5.1}%", summary.final_bots, pct(summary.final_bots)).white().bold()));
    line_box_bottom();
    println!();
}

pub fn cmd_evaluate(data_path: &Path) -> anyhow::Result<()> {
    section("Evaluate");

    let df = load_step(data_path)?;
    let report = evaluate_signals(&df)?;
    print_evaluation(&report);
    Ok(())
}

fn print_evaluation(report: &EvaluationReport) {
    println!("  {:<12} {}", muted("Evaluated"), report.n_evaluated);
    if report.n_excluded > 0 {
        println!("  {:<12} {}", muted("Excluded"), report.n_excluded.to_string().yellow());
    }

    for entry in &report.signals {
        section(entry.signal.name());
        for line in entry.report.to_string().lines() {
            println!("  {}", line);
        }
        println!();
        println!("  {}", muted("confusion matrix"));
        for line in entry.report.confusion.to_string().lines() {
            println!("  {}", line);
        }
    }
    println!();
}

pub fn cmd_report(data_path: &Path, output_dir: &Path) -> anyhow::Result<()> {
    section("Report");

    let df = load_step(data_path)?;

    step_run("Building tables");
    let report = SessionReport::build(&df)?;
    step_done("");

    let written = report.write(output_dir)?;
    for path in &written {
        step_ok(&path.display().to_string());
    }
    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = load_sessions(data_path)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);

    match session::validate_schema(&df) {
        Ok(()) => println!("  {:<12} {}", muted("Schema"), ok("ready for detection")),
        Err(e) => println!("  {:<12} {}", muted("Schema"), alert(&e.to_string())),
    }
    println!();

    println!("  {:<24} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(54)));

    for col in df.get_columns() {
        println!(
            "  {:<24} {:<12} {:>6} {:>8}",
            col.name(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
            col.n_unique().unwrap_or(0)
        );
    }

    if df.column(columns::CLASSIFICATION).is_ok() {
        section("Rule labels");
        let labels = session::session_labels(&df)?;
        for label in [SessionLabel::Human, SessionLabel::Bot, SessionLabel::Suspicious] {
            let n = labels.iter().filter(|l| **l == Some(label)).count();
            println!("  {:<12} {}", muted(label.as_str()), n);
        }
        let unknown = labels.iter().filter(|l| l.is_none()).count();
        if unknown > 0 {
            println!("  {:<12} {}", muted("unknown"), unknown.to_string().yellow());
        }
    }

    if df.column(columns::USER_ID).is_ok() {
        section("Ground truth");
        let truth = session::ground_truth(&df)?;
        for label in [GroundTruth::Human, GroundTruth::Bot] {
            let n = truth.iter().filter(|t| **t == Some(label)).count();
            println!("  {:<12} {}", muted(label.as_str()), n);
        }
    }

    println!();
    Ok(())
}

pub fn cmd_config() -> anyhow::Result<()> {
    println!("{}", DetectionConfig::default().to_json_pretty()?);
    Ok(())
}

pub fn show_help() {
    section("Commands");

    let cmds: &[(&str, &str)] = &[
        ("sentinel detect -d in.csv -o out.csv", "Classify sessions"),
        ("sentinel detect -d in.csv -o out.csv -c cfg.json", "Classify with a config file"),
        ("sentinel evaluate -d out.csv", "Score signals against user_id"),
        ("sentinel report -d out.csv -o reports/", "Write report tables"),
        ("sentinel info -d in.csv", "Inspect a dataset"),
        ("sentinel config", "Print the default config"),
    ];

    for (cmd, desc) in cmds {
        println!("  {:<50} {}", cmd.white(), muted(desc));
    }

    println!();
}
