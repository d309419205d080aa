//! Generates the fixture model into `$OUT_DIR/generated.rs`.
//!
//! `cedarbridgec` writes one file per module. Each `pub mod name;` line is
//! replaced with the inline body of the file it names, so the whole tree
//! can be pulled in with one `include!`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use cedarbridgec::{generate_model, load_model, GenerateOptions};

fn main() -> Result<()> {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
    let model_path = manifest_dir.join("../../tests/cedarbridge/chat_model.json");
    println!("cargo:rerun-if-changed={}", model_path.display());

    let bytes = std::fs::read(&model_path)
        .with_context(|| format!("read {}", model_path.display()))?;
    let model = load_model(&bytes)?;
    let outputs = generate_model(&model, &GenerateOptions::default())?;

    let mut files = BTreeMap::new();
    for output in outputs {
        let key = output
            .rel_path
            .iter()
            .map(|c| c.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let text = String::from_utf8(output.bytes)
            .with_context(|| format!("{key} is not UTF-8"))?;
        files.insert(key, text);
    }

    let mut out = String::new();
    inline_module(&files, "mod.rs", "", "generated", &mut out)?;

    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    std::fs::write(out_dir.join("generated.rs"), out).context("write generated.rs")?;
    Ok(())
}

/// Appends `pub mod <name> { .. }` with the contents of `files[key]`.
/// Children of a `mod.rs` resolve relative to `dir`.
fn inline_module(
    files: &BTreeMap<String, String>,
    key: &str,
    dir: &str,
    name: &str,
    out: &mut String,
) -> Result<()> {
    let text = files
        .get(key)
        .ok_or_else(|| anyhow!("generated tree has no {key}"))?;
    out.push_str(&format!("pub mod {name} {{\n"));
    for line in text.lines() {
        let Some(child) = line
            .strip_prefix("pub mod ")
            .and_then(|rest| rest.strip_suffix(';'))
        else {
            out.push_str(line);
            out.push('\n');
            continue;
        };
        let stem = child.trim_start_matches("r#");
        let child_dir = join(dir, stem);
        let nested = join(&child_dir, "mod.rs");
        if files.contains_key(&nested) {
            inline_module(files, &nested, &child_dir, child, out)?;
        } else {
            inline_module(files, &join(dir, &format!("{stem}.rs")), dir, child, out)?;
        }
    }
    out.push_str("}\n");
    Ok(())
}

fn join(dir: &str, leaf: &str) -> String {
    if dir.is_empty() {
        leaf.to_string()
    } else {
        format!("{dir}/{leaf}")
    }
}
