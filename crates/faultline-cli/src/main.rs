use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use faultline_core::{
    rank, score, DdminMinimizer, Minimizer, MinimizeStats, Oracle, PredicateInfo, RankedPredicate,
    Reduction, RunLog,
};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

#[derive(Parser)]
#[command(name = "faultline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Reduce a crashing input to a smaller input that still crashes the target.
    Shrink(ShrinkArgs),
    /// Aggregate CBI instrumentation logs into a predicate report.
    Cbi(CbiArgs),
}

#[derive(Args)]
struct ShrinkArgs {
    target: PathBuf,

    input: PathBuf,
}

#[derive(Args)]
struct CbiArgs {
    #[arg(long = "success-logs")]
    success_logs: PathBuf,

    #[arg(long = "failure-logs")]
    failure_logs: PathBuf,

    #[arg(long, default_value_t = 1)]
    jobs: usize,

    #[arg(long, default_value_t = 10)]
    top: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Serialize)]
struct ResultJson {
    schema_version: String,
    tool: ToolInfo,
    invocation: Invocation,
    inputs: Vec<InputInfo>,
    status: String,
    exit_code: i32,
    started_at: String,
    finished_at: String,
    duration_ms: u64,
    result: Payload,
}

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    version: String,
    git_sha: String,
}

#[derive(Serialize)]
struct Invocation {
    command: String,
    args: Vec<String>,
    format: String,
    timeout_ms: Option<u64>,
    jobs: Option<usize>,
}

#[derive(Serialize)]
struct InputInfo {
    path: String,
    sha256: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Payload {
    Shrink(ShrinkSummary),
    Cbi(CbiSummary),
}

#[derive(Serialize)]
struct ShrinkSummary {
    original_bytes: u64,
    minimized_bytes: u64,
    output_path: String,
    stats: MinimizeStats,
}

#[derive(Serialize)]
struct CbiSummary {
    success_runs: usize,
    failure_runs: usize,
    predicates: Vec<PredicateInfo>,
    ranking: Vec<RankedPredicate>,
}

enum CommandOutput {
    /// Reported to the user on stderr; exit 1, nothing written.
    UserError(String),
    Completed {
        command: &'static str,
        args: Vec<String>,
        inputs: Vec<InputInfo>,
        payload: Payload,
    },
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("tool error: {err}");
            2
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    let started_at = Utc::now();
    let timer = Instant::now();

    let output = match &cli.command {
        Command::Shrink(args) => run_shrink(&cli, args)?,
        Command::Cbi(args) => run_cbi(&cli, args)?,
    };

    let (command, args, inputs, payload) = match output {
        CommandOutput::UserError(message) => {
            eprintln!("{message}");
            return Ok(1);
        }
        CommandOutput::Completed {
            command,
            args,
            inputs,
            payload,
        } => (command, args, inputs, payload),
    };

    let finished_at = Utc::now();
    let duration_ms = timer.elapsed().as_millis() as u64;

    let result = ResultJson {
        schema_version: "0.1".to_string(),
        tool: ToolInfo {
            name: "faultline".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_sha: std::env::var("FAULTLINE_GIT_SHA").unwrap_or_else(|_| "UNKNOWN".to_string()),
        },
        invocation: Invocation {
            command: command.to_string(),
            args,
            format: match cli.format {
                OutputFormat::Json => "json".to_string(),
                OutputFormat::Text => "text".to_string(),
            },
            timeout_ms: cli.timeout_ms,
            jobs: match &cli.command {
                Command::Cbi(args) => Some(args.jobs),
                Command::Shrink(_) => None,
            },
        },
        inputs,
        status: "ok".to_string(),
        exit_code: 0,
        started_at: started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        finished_at: finished_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        duration_ms,
        result: payload,
    };

    let top = match &cli.command {
        Command::Cbi(args) => args.top,
        Command::Shrink(_) => 0,
    };

    match cli.format {
        OutputFormat::Json => emit_json(&result, cli.output.as_deref()),
        OutputFormat::Text => emit_text(&result, top, cli.output.as_deref()),
    }?;

    Ok(0)
}

fn run_shrink(cli: &Cli, args: &ShrinkArgs) -> Result<CommandOutput> {
    if !args.target.exists() {
        return Ok(CommandOutput::UserError(format!(
            "{} not found",
            args.target.display()
        )));
    }
    if !args.input.exists() {
        return Ok(CommandOutput::UserError(format!(
            "{} not found",
            args.input.display()
        )));
    }

    let original =
        fs::read(&args.input).with_context(|| format!("read {}", args.input.display()))?;

    let mut oracle = ProcessOracle {
        target: args.target.clone(),
        timeout: cli.timeout_ms.map(Duration::from_millis),
    };
    if !oracle.reproduces(&original)? {
        return Ok(CommandOutput::UserError(
            "sanity check failed: the target does not crash on the original input".to_string(),
        ));
    }

    let Reduction { data, stats } = DdminMinimizer.minimize(&original, &mut oracle)?;

    let delta_path = delta_path(&args.input);
    write_atomic(&delta_path, &data)?;

    let inputs = build_inputs(&[args.target.clone(), args.input.clone()]);

    Ok(CommandOutput::Completed {
        command: "shrink",
        args: vec![
            args.target.to_string_lossy().to_string(),
            args.input.to_string_lossy().to_string(),
        ],
        inputs,
        payload: Payload::Shrink(ShrinkSummary {
            original_bytes: original.len() as u64,
            minimized_bytes: data.len() as u64,
            output_path: delta_path.to_string_lossy().to_string(),
            stats,
        }),
    })
}

fn run_cbi(_cli: &Cli, args: &CbiArgs) -> Result<CommandOutput> {
    if args.jobs == 0 {
        anyhow::bail!("--jobs must be >= 1");
    }
    for dir in [&args.success_logs, &args.failure_logs] {
        if !dir.is_dir() {
            return Ok(CommandOutput::UserError(format!(
                "{} not found",
                dir.display()
            )));
        }
    }

    let success_files = list_log_files(&args.success_logs)?;
    let failure_files = list_log_files(&args.failure_logs)?;

    let success_logs = load_logs(&success_files, args.jobs)?;
    let failure_logs = load_logs(&failure_files, args.jobs)?;

    let report = score(&success_logs, &failure_logs);
    let ranking = rank(&report);

    let mut input_paths = success_files;
    input_paths.extend(failure_files);
    let inputs = build_inputs(&input_paths);

    Ok(CommandOutput::Completed {
        command: "cbi",
        args: vec![
            args.success_logs.to_string_lossy().to_string(),
            args.failure_logs.to_string_lossy().to_string(),
        ],
        inputs,
        payload: Payload::Cbi(CbiSummary {
            success_runs: success_logs.len(),
            failure_runs: failure_logs.len(),
            predicates: report.predicates,
            ranking,
        }),
    })
}

/// Runs the target once per candidate, feeding the bytes on stdin.
/// Non-zero or signal exit means the failure reproduced; a timed-out
/// child is killed and counted as exit 124.
struct ProcessOracle {
    target: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessOracle {
    fn run_once(&self, input: &[u8]) -> Result<i32> {
        let mut child = std::process::Command::new(&self.target)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn target: {}", self.target.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            // Targets may exit before draining stdin; a broken pipe there
            // is an answer, not an error.
            match stdin.write_all(input) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("write candidate to {}", self.target.display())
                    })
                }
            }
        }

        let exit_code = if let Some(timeout) = self.timeout {
            match child.wait_timeout(timeout)? {
                Some(status) => status.code().unwrap_or(1),
                None => {
                    child.kill().ok();
                    let _ = child.wait();
                    124
                }
            }
        } else {
            let status = child.wait()?;
            status.code().unwrap_or(1)
        };
        Ok(exit_code)
    }
}

impl Oracle for ProcessOracle {
    type Error = anyhow::Error;

    fn reproduces(&mut self, input: &[u8]) -> Result<bool, Self::Error> {
        Ok(self.run_once(input)? != 0)
    }
}

fn delta_path(input: &Path) -> PathBuf {
    let mut path = input.as_os_str().to_os_string();
    path.push(".delta");
    PathBuf::from(path)
}

fn list_log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map(|ext| ext == "json").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn load_logs(files: &[PathBuf], jobs: usize) -> Result<Vec<RunLog>> {
    if jobs == 1 {
        return files.iter().map(|path| load_log(path)).collect();
    }
    let pool = ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("build thread pool")?;
    pool.install(|| files.par_iter().map(|path| load_log(path)).collect())
}

fn load_log(path: &Path) -> Result<RunLog> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
}

fn build_inputs(paths: &[PathBuf]) -> Vec<InputInfo> {
    paths
        .iter()
        .map(|path| InputInfo {
            path: path.to_string_lossy().to_string(),
            sha256: compute_sha256(path).unwrap_or_else(|| "UNKNOWN".to_string()),
        })
        .collect()
}

fn compute_sha256(path: &Path) -> Option<String> {
    let data = fs::read(path).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Some(hex::encode(hasher.finalize()))
}

fn emit_json(result: &ResultJson, output: Option<&Path>) -> Result<()> {
    let payload = serde_json::to_string_pretty(result).context("serialize result json")?;
    if let Some(path) = output {
        write_atomic(path, payload.as_bytes())?;
        return Ok(());
    }

    println!("{payload}");
    Ok(())
}

fn emit_text(result: &ResultJson, top: usize, output: Option<&Path>) -> Result<()> {
    let summary = match &result.result {
        Payload::Shrink(shrink) => format!(
            "Original Input Size: {}\nMinimized Input Size: {}",
            shrink.original_bytes, shrink.minimized_bytes
        ),
        Payload::Cbi(cbi) => {
            let mut lines = vec![format!(
                "runs: success={} failure={}",
                cbi.success_runs, cbi.failure_runs
            )];
            lines.push(format!(
                "{:<28} {:>9} {:>9} {:>9}",
                "predicate", "increase", "failure", "context"
            ));
            for ranked in cbi.ranking.iter().take(top) {
                lines.push(format!(
                    "{:<28} {:>9.3} {:>9.3} {:>9.3}",
                    ranked.predicate.to_string(),
                    ranked.increase,
                    ranked.failure,
                    ranked.context
                ));
            }
            lines.join("\n")
        }
    };
    if let Some(path) = output {
        write_atomic(path, summary.as_bytes())?;
        return Ok(());
    }
    println!("{summary}");
    Ok(())
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("rename {}", path.display()))?;
    Ok(())
}
