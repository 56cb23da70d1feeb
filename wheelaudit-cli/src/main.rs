use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use wheelaudit_core::filetree::TreeId;
use wheelaudit_core::layout::{is_dist_info_dir, WheelName};
use wheelaudit_core::localize::{FluentLoc, Localize};
use wheelaudit_core::path_safety::PathPolicy;
use wheelaudit_core::progress::Progress;
use wheelaudit_core::{
    BackedDistInfo, DistInfoDir, DistInfoProvider, FileProvider, InspectError, Manifest, PurePath,
    UnpackedWheel, VerifyOptions, VerifyReport, WheelFile,
};

/// Exit status when every input verified.
const EXIT_OK: u8 = 0;
/// At least one input disagrees with its RECORD.
const EXIT_DISCREPANCY: u8 = 1;
/// RECORD malformed, archive unreadable, or a usage error.
const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "wheelaudit", version, about = "Check wheels against their RECORD")]
struct Cli {
    /// Log filter, e.g. `warn` or `wheelaudit_core=debug`
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    /// Message language
    #[arg(long, global = true, default_value = "en-GB")]
    lang: String,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(clap::Args, Clone)]
struct SourceArgs {
    /// Wheel filename whose project and version the dist-info directory must match
    #[arg(long)]
    wheel_name: Option<String>,
    /// Treat symlinks in unpacked wheels as non-files
    #[arg(long, default_value_t = false)]
    no_follow_symlinks: bool,
}

#[derive(Subcommand)]
enum Cmd {
    /// Verify wheels or unpacked wheel directories against their RECORD
    Verify {
        #[command(flatten)]
        source: SourceArgs,
        /// One JSON report per input, one per line
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Compare sizes only
        #[arg(long, default_value_t = false)]
        no_digests: bool,
        /// Report every discrepancy instead of stopping at the first
        #[arg(long, default_value_t = false)]
        all_discrepancies: bool,
        #[arg(long, default_value_t = false)]
        progress: bool,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Print the parsed RECORD
    Record {
        #[command(flatten)]
        source: SourceArgs,
        /// Write RECORD CSV instead of JSON
        #[arg(long, default_value_t = false)]
        csv: bool,
        input: PathBuf,
    },
    /// List the files of one named tree
    Tree {
        #[command(flatten)]
        source: SourceArgs,
        /// ALL, ROOT, PURELIB, PLATLIB, DIST_INFO, DATA, or a .data category
        #[arg(long, default_value = "ROOT")]
        tree: String,
        /// Only files whose trailing components match this glob
        #[arg(long = "match")]
        pattern: Option<String>,
        /// List the available trees instead
        #[arg(long, default_value_t = false)]
        list: bool,
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(io::stderr))
        .init();

    let loc = FluentLoc::builtin(&cli.lang);
    match run(cli.cmd, &loc) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run(cmd: Cmd, loc: &FluentLoc) -> Result<u8> {
    match cmd {
        Cmd::Verify { source, json, no_digests, all_discrepancies, progress, inputs } => {
            let settings = VerifySettings { digests: !no_digests, fail_fast: !all_discrepancies, progress };
            verify(&inputs, &source, &settings, json, loc)
        }
        Cmd::Record { source, csv, input } => {
            record(&input, &source, csv)?;
            Ok(EXIT_OK)
        }
        Cmd::Tree { source, tree, pattern, list, input } => {
            tree_cmd(&input, &source, &tree, pattern.as_deref(), list)?;
            Ok(EXIT_OK)
        }
    }
}

/// An archive or an unpacked directory, opened for one run.
enum Target {
    Wheel(WheelFile),
    Unpacked(UnpackedWheel),
}

impl SourceArgs {
    fn wheel_name(&self) -> Result<Option<WheelName>> {
        self.wheel_name
            .as_deref()
            .map(|n| n.parse::<WheelName>())
            .transpose()
            .context("--wheel-name")
    }

    fn policy(&self) -> PathPolicy {
        PathPolicy { follow_symlinks: !self.no_follow_symlinks }
    }
}

fn open_target(path: &Path, wheel_name: Option<WheelName>, policy: PathPolicy) -> Result<Target, InspectError> {
    if path.is_dir() {
        debug!(path = %path.display(), "opening unpacked wheel");
        return Ok(Target::Unpacked(UnpackedWheel::from_path(path, wheel_name, policy)));
    }
    debug!(path = %path.display(), "opening wheel archive");
    let w = WheelFile::from_path(path)?;
    Ok(Target::Wheel(match wheel_name {
        Some(n) => w.with_wheel_name(n),
        None => w,
    }))
}

struct VerifySettings {
    digests: bool,
    fail_fast: bool,
    progress: bool,
}

#[derive(Serialize)]
struct ErrorOut {
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct Outcome {
    path: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<VerifyReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorOut>,
}

fn verify_backed<P: FileProvider>(
    w: &mut BackedDistInfo<P>,
    opts: &VerifyOptions,
) -> Result<VerifyReport, InspectError> {
    w.validate()?;
    w.verify(opts)
}

fn verify_one(
    path: &Path,
    wheel_name: Option<WheelName>,
    policy: PathPolicy,
    settings: &VerifySettings,
) -> Result<VerifyReport, InspectError> {
    let opts = VerifyOptions {
        digests: settings.digests,
        fail_fast: settings.fail_fast,
        progress: Progress::new(settings.progress),
    };
    match open_target(path, wheel_name, policy)? {
        Target::Wheel(mut w) => verify_backed(&mut w, &opts),
        Target::Unpacked(mut w) => verify_backed(&mut w, &opts),
    }
}

fn verify(
    inputs: &[PathBuf],
    source: &SourceArgs,
    settings: &VerifySettings,
    json: bool,
    loc: &FluentLoc,
) -> Result<u8> {
    let wheel_name = source.wheel_name()?;
    let policy = source.policy();

    let results: Vec<(String, Result<VerifyReport, InspectError>)> = inputs
        .par_iter()
        .map(|p| (p.display().to_string(), verify_one(p, wheel_name.clone(), policy, settings)))
        .collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut status = EXIT_OK;
    for (path, result) in results {
        let outcome = match result {
            Ok(report) => {
                if !report.is_ok() {
                    status = status.max(EXIT_DISCREPANCY);
                }
                Outcome { path, ok: report.is_ok(), report: Some(report), error: None }
            }
            Err(e) => {
                status = EXIT_ERROR;
                Outcome {
                    path,
                    ok: false,
                    report: None,
                    error: Some(ErrorOut { code: e.code(), message: loc.error(&e) }),
                }
            }
        };
        if json {
            serde_json::to_writer(&mut out, &outcome).context("write JSON report")?;
            writeln!(out)?;
            continue;
        }
        match (&outcome.report, &outcome.error) {
            (_, Some(err)) => eprintln!("{}: {}", outcome.path, err.message),
            (Some(report), None) if report.is_ok() => {
                writeln!(out, "{}", loc.msg("verified-with", &[("path", outcome.path.as_str())]))?;
            }
            (Some(report), None) => {
                writeln!(out, "{}", loc.msg("failed-with", &[("path", outcome.path.as_str())]))?;
                for d in &report.discrepancies {
                    writeln!(out, "  {}", loc.discrepancy(d))?;
                }
            }
            (None, None) => {}
        }
    }
    Ok(status)
}

fn print_manifest(manifest: &Manifest, csv: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if csv {
        manifest.write_csv(&mut out).context("write RECORD")?;
    } else {
        serde_json::to_writer_pretty(&mut out, manifest).context("write JSON")?;
        writeln!(out)?;
    }
    Ok(())
}

fn record(input: &Path, source: &SourceArgs, csv: bool) -> Result<()> {
    let name = input.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if input.is_dir() && is_dist_info_dir(name) {
        let mut d = DistInfoDir::from_path(input)?;
        return print_manifest(d.manifest()?, csv);
    }
    let target = open_target(input, source.wheel_name()?, source.policy())
        .with_context(|| format!("open {}", input.display()))?;
    match target {
        Target::Wheel(mut w) => print_manifest(w.manifest()?, csv),
        Target::Unpacked(mut w) => print_manifest(w.manifest()?, csv),
    }
}

fn list_tree<P: FileProvider>(
    w: &mut BackedDistInfo<P>,
    tree: &str,
    pattern: Option<&str>,
    list: bool,
) -> Result<()> {
    let trees = w.filetrees()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if list {
        for id in trees.keys()? {
            writeln!(out, "{id}")?;
        }
        return Ok(());
    }
    let id: TreeId = tree.parse().with_context(|| format!("--tree {tree}"))?;
    let Some(root) = trees.get(&id)? else {
        bail!("wheel has no {id} tree");
    };
    for f in root.walk_files() {
        if let Some(pat) = pattern {
            if !f.match_glob(pat)? {
                continue;
            }
        }
        writeln!(out, "{}", f.relative_path())?;
    }
    Ok(())
}

fn tree_cmd(input: &Path, source: &SourceArgs, tree: &str, pattern: Option<&str>, list: bool) -> Result<()> {
    let target = open_target(input, source.wheel_name()?, source.policy())
        .with_context(|| format!("open {}", input.display()))?;
    match target {
        Target::Wheel(mut w) => list_tree(&mut w, tree, pattern, list),
        Target::Unpacked(mut w) => list_tree(&mut w, tree, pattern, list),
    }
}
