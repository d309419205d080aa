use std::path::PathBuf;

use anyhow::{Context, Result};
use cedarbridge_contracts::{
    CEDARBRIDGE_GENERATE_REPORT_SCHEMA_VERSION, CEDARBRIDGE_MODEL_SCHEMA_VERSION,
    DEFAULT_RUNTIME_PATH,
};
use cedarbridgec::generate::drifted_outputs;
use cedarbridgec::{generate_model, load_model, write_outputs, GenerateOptions};
use clap::Args;
use serde::Serialize;

use crate::util;

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Compiled model JSON (`cedarbridge.model@0.1.0`).
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Write outputs into --out-dir. Without it, only drift is reported.
    #[arg(long)]
    pub write: bool,

    /// Fail with exit code 1 if --out-dir is not up to date.
    #[arg(long)]
    pub check: bool,

    /// Print a machine-readable report on stdout.
    #[arg(long)]
    pub report_json: bool,

    /// Path generated code uses to reach the runtime crate.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_RUNTIME_PATH)]
    pub runtime_path: String,

    /// Omit diagnostic scope markers from generated codecs.
    #[arg(long)]
    pub no_scopes: bool,
}

#[derive(Debug, Serialize)]
struct GenerateReport {
    schema_version: &'static str,
    tool: ReportTool,
    input: ReportInput,
    outputs: Vec<ReportOutput>,
    drift: Vec<String>,
    wrote: bool,
}

#[derive(Debug, Serialize)]
struct ReportTool {
    name: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ReportInput {
    path: String,
    sha256_hex: String,
    schema_version: &'static str,
}

#[derive(Debug, Serialize)]
struct ReportOutput {
    path: String,
    sha256_hex: String,
    kind: &'static str,
    artifact: String,
}

pub fn cmd_generate(args: GenerateArgs) -> Result<std::process::ExitCode> {
    if args.write && args.check {
        anyhow::bail!("set at most one of --write or --check");
    }

    let input_path = util::resolve_existing_path_upwards(&args.input);
    let input_bytes =
        std::fs::read(&input_path).with_context(|| format!("read: {}", input_path.display()))?;
    let model = load_model(&input_bytes)
        .with_context(|| format!("load model: {}", input_path.display()))?;

    let options = GenerateOptions {
        runtime_path: args.runtime_path.clone(),
        emit_scopes: !args.no_scopes,
        ..GenerateOptions::default()
    };
    let outputs = generate_model(&model, &options).context("generate")?;
    let drifted: Vec<String> = drifted_outputs(&args.out_dir, &outputs)
        .iter()
        .map(|o| o.rel_path.display().to_string())
        .collect();

    if args.write && !drifted.is_empty() {
        write_outputs(&args.out_dir, &outputs)
            .with_context(|| format!("write: {}", args.out_dir.display()))?;
    }
    tracing::info!(
        outputs = outputs.len(),
        drifted = drifted.len(),
        wrote = args.write,
        "generate finished"
    );

    if args.report_json {
        let report = GenerateReport {
            schema_version: CEDARBRIDGE_GENERATE_REPORT_SCHEMA_VERSION,
            tool: ReportTool {
                name: "cedarbridge",
                version: env!("CARGO_PKG_VERSION"),
            },
            input: ReportInput {
                path: input_path.display().to_string(),
                sha256_hex: util::sha256_hex(&input_bytes),
                schema_version: CEDARBRIDGE_MODEL_SCHEMA_VERSION,
            },
            outputs: outputs
                .iter()
                .map(|o| ReportOutput {
                    path: o.rel_path.display().to_string(),
                    sha256_hex: util::sha256_hex(&o.bytes),
                    kind: o.kind.as_str(),
                    artifact: o.artifact.clone(),
                })
                .collect(),
            drift: drifted.clone(),
            wrote: args.write,
        };
        let mut bytes = serde_json::to_vec(&report)?;
        bytes.push(b'\n');
        std::io::Write::write_all(&mut std::io::stdout(), &bytes).context("write stdout")?;
    } else if !args.write {
        for p in &drifted {
            tracing::warn!(path = %p, "generated output drifted");
            eprintln!("cedarbridge generate drift: {p}");
        }
    }

    if !drifted.is_empty() && !args.write {
        return Ok(std::process::ExitCode::from(1));
    }
    Ok(std::process::ExitCode::SUCCESS)
}
