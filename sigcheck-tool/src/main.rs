// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod search_path;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use der::Encode;
use search_path::SearchPath;
use sigcheck::{
    Architecture, CertificateRecord, Link, NameKind, RevocationMode,
    TrustPolicy, TrustReport,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(version, about = "Show Authenticode signing information of PE files")]
struct Cli {
    /// Log more: -v for debug, -vv for trace. `RUST_LOG` applies otherwise.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    action: Action,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum RevocationArg {
    None,
    EndCertificate,
    WholeChain,
}

impl From<RevocationArg> for RevocationMode {
    fn from(arg: RevocationArg) -> Self {
        match arg {
            RevocationArg::None => Self::None,
            RevocationArg::EndCertificate => Self::EndCertificate,
            RevocationArg::WholeChain => Self::WholeChain,
        }
    }
}

#[derive(Parser)]
struct CheckAction {
    /// Executables or DLLs. Bare names are looked up in the search path.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Print one JSON object per file.
    #[arg(long)]
    json: bool,

    /// JSON trust policy.
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Override the policy's revocation checking mode.
    #[arg(long, value_enum)]
    revocation: Option<RevocationArg>,

    /// Extra directory to search, after `PATH`.
    #[arg(long = "search-dir")]
    search_dirs: Vec<PathBuf>,
}

#[derive(Parser)]
struct GetCertAction {
    pe_path: PathBuf,

    /// Write the counter-signer certificate instead of the signer's.
    #[arg(long)]
    counter: bool,
}

#[derive(Subcommand)]
enum Action {
    /// Print the signing information of each file.
    Check(CheckAction),
    /// Write a DER certificate to stdout.
    GetCert(GetCertAction),
}

fn load_policy(action: &CheckAction) -> Result<TrustPolicy> {
    let mut policy = match &action.policy {
        Some(path) => {
            let text = fs_err::read_to_string(path)?;
            serde_json::from_str(&text).with_context(|| {
                format!("invalid trust policy {}", path.display())
            })?
        }
        None => TrustPolicy::default(),
    };
    if let Some(revocation) = action.revocation {
        policy.revocation = revocation.into();
    }
    Ok(policy)
}

fn link_text(link: Option<&Link>) -> &str {
    link.and_then(Link::as_str).unwrap_or("None")
}

fn render_certificate(
    out: &mut dyn Write,
    cert: Option<&CertificateRecord>,
) -> io::Result<()> {
    let name = |kind| cert.and_then(|c| c.display_name(kind));
    writeln!(
        out,
        "          Issuer name:      {}",
        name(NameKind::Issuer).as_deref().unwrap_or("none")
    )?;
    writeln!(
        out,
        "          Subject name:     {}",
        name(NameKind::Subject).as_deref().unwrap_or("none")
    )
}

fn render_report(
    out: &mut dyn Write,
    file: &Path,
    report: &TrustReport,
) -> io::Result<()> {
    let opus = &report.opus_info;
    writeln!(out)?;
    writeln!(out, "{}", file.display())?;
    writeln!(out, "        Signature:          {}", report.trust_verdict)?;
    writeln!(out, "        Signing date:       {}", report.signing_date_display())?;
    writeln!(
        out,
        "        Program name:       {}",
        opus.program_name.as_deref().unwrap_or("None")
    )?;
    writeln!(
        out,
        "        Publisher link:     {}",
        link_text(opus.publisher_link.as_ref())
    )?;
    writeln!(
        out,
        "        Information link:   {}",
        link_text(opus.more_info_link.as_ref())
    )?;
    writeln!(out, "        Signer certificate:")?;
    render_certificate(out, report.signer_certificate.as_ref())?;
    writeln!(out, "        Counter certificate:")?;
    render_certificate(out, report.counter_certificate.as_ref())?;
    match report.architecture {
        Architecture::Bit64 => writeln!(out, "        Machine type:       64-bit"),
        Architecture::Bit32 => writeln!(out, "        Machine type:       32-bit"),
        Architecture::Unknown => Ok(()),
    }
}

fn action_check(action: &CheckAction, out: &mut dyn Write) -> Result<()> {
    let policy = load_policy(action)?;
    let mut search_path = SearchPath::from_env(&action.search_dirs);

    let mut failures = 0_usize;
    for name in &action.files {
        let Some(file) = search_path.find(name) else {
            tracing::error!(file = %name.display(), "file not found");
            failures = failures.saturating_add(1);
            continue;
        };
        search_path.register(&file);

        let report = match sigcheck::inspect_with(&file, &policy) {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(file = %file.display(), %err, "cannot inspect");
                failures = failures.saturating_add(1);
                continue;
            }
        };

        if action.json {
            let value = serde_json::json!({
                "file": file.display().to_string(),
                "report": report,
            });
            writeln!(out, "{value}")?;
        } else {
            render_report(out, &file, &report)?;
        }
    }

    if failures > 0 {
        bail!("{failures} of {} files could not be inspected", action.files.len());
    }
    Ok(())
}

fn action_get_cert(action: &GetCertAction, out: &mut dyn Write) -> Result<()> {
    let report = sigcheck::inspect(&action.pe_path)?;
    let (record, what) = if action.counter {
        (report.counter_certificate, "counter-signer")
    } else {
        (report.signer_certificate, "signer")
    };
    let record = record.ok_or_else(|| anyhow!("no {what} certificate found"))?;
    out.write_all(&record.certificate().to_der()?)?;
    Ok(())
}

fn run_action(action: &Action, out: &mut dyn Write) -> Result<()> {
    match action {
        Action::Check(action) => action_check(action, out),
        Action::GetCert(action) => action_get_cert(action, out),
    }
}

fn init_tracing(verbose: u8) {
    let env_filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run_action(&cli.action, &mut io::stdout().lock())
}
