//! Generation driver: model in, Rust source files out.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use cedarbridge_contracts::DEFAULT_RUNTIME_PATH;

use crate::model::{package_artifact_count, Model, Package};
use crate::names;
use crate::rust_emit;
use crate::rust_emit_protocols;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Path generated code uses to name the runtime crate.
    pub runtime_path: String,
    /// Emit codec factories, package registries and protocol factories.
    pub emit_registry: bool,
    /// Emit diagnostic `begin`/`end` scope calls.
    pub emit_scopes: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            runtime_path: DEFAULT_RUNTIME_PATH.to_string(),
            emit_registry: true,
            emit_scopes: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateErrorKind {
    /// A declaration shape the generator cannot handle; the model is invalid.
    ModelInvariantViolation,
    GenerationIo,
    /// The model document was rejected while loading or binding.
    Model,
}

#[derive(Debug, Clone)]
pub struct GenerateError {
    pub kind: GenerateErrorKind,
    /// Output path or declaration the failure belongs to.
    pub artifact: Option<String>,
    pub message: String,
}

impl GenerateError {
    pub fn new(kind: GenerateErrorKind, message: String) -> Self {
        Self {
            kind,
            artifact: None,
            message,
        }
    }

    pub fn invariant(message: String) -> Self {
        Self::new(GenerateErrorKind::ModelInvariantViolation, message)
    }

    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            GenerateErrorKind::ModelInvariantViolation => "model invariant violation",
            GenerateErrorKind::GenerationIo => "generation I/O failure",
            GenerateErrorKind::Model => "invalid model",
        };
        match &self.artifact {
            Some(a) => write!(f, "{kind}: {a}: {}", self.message),
            None => write!(f, "{kind}: {}", self.message),
        }
    }
}

impl std::error::Error for GenerateError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    RootModule,
    PackageModule,
    Type,
    ProtocolVersion,
}

impl OutputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputKind::RootModule => "root_module",
            OutputKind::PackageModule => "package_module",
            OutputKind::Type => "type",
            OutputKind::ProtocolVersion => "protocol_version",
        }
    }

    /// Whether outputs of this kind count as declared-unit artifacts.
    pub fn is_artifact(self) -> bool {
        matches!(self, OutputKind::Type | OutputKind::ProtocolVersion)
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedOutput {
    pub rel_path: PathBuf,
    pub kind: OutputKind,
    /// Qualified type name, `protocol vN`, or package name.
    pub artifact: String,
    pub bytes: Vec<u8>,
}

pub fn artifact_count(outputs: &[GeneratedOutput]) -> usize {
    outputs.iter().filter(|o| o.kind.is_artifact()).count()
}

/// Render every package of `model`, plus the root module. Nothing is
/// written to disk.
pub fn generate_model(
    model: &Model,
    options: &GenerateOptions,
) -> Result<Vec<GeneratedOutput>, GenerateError> {
    let mut outputs = Vec::new();
    for package in model.packages() {
        outputs.extend(generate_package(model, package, options)?);
    }
    outputs.push(GeneratedOutput {
        rel_path: PathBuf::from("mod.rs"),
        kind: OutputKind::RootModule,
        artifact: "root".to_string(),
        bytes: rust_emit::emit_root_module(model, options).into_bytes(),
    });
    Ok(outputs)
}

pub fn generate_package(
    model: &Model,
    package: &Package,
    options: &GenerateOptions,
) -> Result<Vec<GeneratedOutput>, GenerateError> {
    let dir = PathBuf::from(names::module_dir(&names::package_module(&package.name)));
    let mut outputs = Vec::new();

    for decl in package.generated_types() {
        let module = names::type_module(&decl.name.name);
        let source = rust_emit::emit_type_module(model, decl, options)
            .map_err(|e| e.with_artifact(decl.name.to_string()))?;
        let rel_path = dir.join(names::module_file(&module));
        tracing::debug!(
            artifact = %decl.name,
            path = %rel_path.display(),
            "rendered type"
        );
        outputs.push(GeneratedOutput {
            rel_path,
            kind: OutputKind::Type,
            artifact: decl.name.to_string(),
            bytes: source.into_bytes(),
        });
    }

    for protocol in &package.protocols {
        for version in &protocol.versions {
            let artifact = format!("{} v{}", protocol.name, version.version);
            let module = names::protocol_version_module(&protocol.name.name, version.version);
            let source =
                rust_emit_protocols::emit_protocol_version_module(model, protocol, version, options)
                    .map_err(|e| e.with_artifact(artifact.clone()))?;
            let rel_path = dir.join(names::module_file(&module));
            tracing::debug!(artifact = %artifact, path = %rel_path.display(), "rendered protocol version");
            outputs.push(GeneratedOutput {
                rel_path,
                kind: OutputKind::ProtocolVersion,
                artifact,
                bytes: source.into_bytes(),
            });
        }
    }

    let expected = package_artifact_count(package);
    let produced = artifact_count(&outputs);
    if produced != expected {
        return Err(GenerateError::invariant(format!(
            "package {:?} produced {produced} artifacts, expected {expected}",
            package.name
        ))
        .with_artifact(package.name.clone()));
    }

    outputs.push(GeneratedOutput {
        rel_path: dir.join("mod.rs"),
        kind: OutputKind::PackageModule,
        artifact: package.name.clone(),
        bytes: rust_emit::emit_package_module(model, package, options)?.into_bytes(),
    });
    tracing::info!(package = %package.name, artifacts = produced, "generated package");
    Ok(outputs)
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_path_next_to(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let pid = std::process::id();
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{file_name}.{pid}.{n}.tmp"))
}

fn io_error(rel_path: &Path, what: &str, err: &std::io::Error) -> GenerateError {
    GenerateError::new(GenerateErrorKind::GenerationIo, format!("{what}: {err}"))
        .with_artifact(rel_path.display().to_string())
}

/// Write `outputs` under `out_dir`, all or nothing: every file is first
/// written to a sibling temporary, and renames only start once all
/// temporaries exist. On failure the temporaries are removed and the error
/// names the output that failed.
pub fn write_outputs(out_dir: &Path, outputs: &[GeneratedOutput]) -> Result<(), GenerateError> {
    let mut staged: Vec<(PathBuf, PathBuf, &GeneratedOutput)> = Vec::with_capacity(outputs.len());
    let cleanup = |staged: &[(PathBuf, PathBuf, &GeneratedOutput)]| {
        for (tmp, _, _) in staged {
            let _ = std::fs::remove_file(tmp);
        }
    };

    for o in outputs {
        let path = out_dir.join(&o.rel_path);
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                cleanup(&staged);
                return Err(io_error(&o.rel_path, "create output dir", &e));
            }
        }
        let tmp = temp_path_next_to(&path);
        if let Err(e) = std::fs::write(&tmp, &o.bytes) {
            let _ = std::fs::remove_file(&tmp);
            cleanup(&staged);
            return Err(io_error(&o.rel_path, "write", &e));
        }
        staged.push((tmp, path, o));
    }

    for (idx, (tmp, path, o)) in staged.iter().enumerate() {
        if let Err(e) = std::fs::rename(tmp, path) {
            cleanup(&staged[idx..]);
            return Err(io_error(&o.rel_path, "rename", &e));
        }
        tracing::debug!(path = %o.rel_path.display(), bytes = o.bytes.len(), "wrote output");
    }
    Ok(())
}

/// Outputs whose bytes differ from what is on disk under `out_dir`.
pub fn drifted_outputs<'a>(out_dir: &Path, outputs: &'a [GeneratedOutput]) -> Vec<&'a GeneratedOutput> {
    outputs
        .iter()
        .filter(|o| match std::fs::read(out_dir.join(&o.rel_path)) {
            Ok(existing) => existing != o.bytes,
            Err(_) => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(rel: &str) -> GeneratedOutput {
        GeneratedOutput {
            rel_path: PathBuf::from(rel),
            kind: OutputKind::Type,
            artifact: rel.to_string(),
            bytes: rel.as_bytes().to_vec(),
        }
    }

    #[test]
    fn writes_all_outputs_and_reports_no_drift() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = vec![output("a/one.rs"), output("a/two.rs"), output("mod.rs")];
        assert_eq!(drifted_outputs(dir.path(), &outputs).len(), 3);
        write_outputs(dir.path(), &outputs).unwrap();
        assert!(drifted_outputs(dir.path(), &outputs).is_empty());
        assert_eq!(
            std::fs::read(dir.path().join("a/two.rs")).unwrap(),
            b"a/two.rs".to_vec()
        );
    }

    #[test]
    fn failing_output_aborts_everything_and_names_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is needed.
        std::fs::write(dir.path().join("blocked"), b"x").unwrap();
        let outputs = vec![output("a/one.rs"), output("blocked/two.rs")];
        let err = write_outputs(dir.path(), &outputs).unwrap_err();
        assert_eq!(err.kind, GenerateErrorKind::GenerationIo);
        assert_eq!(err.artifact.as_deref(), Some("blocked/two.rs"));
        assert!(!dir.path().join("a/one.rs").exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("a"))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty(), "temporaries removed");
    }

    #[test]
    fn error_display_names_kind_and_artifact() {
        let e = GenerateError::invariant("bad".to_string()).with_artifact("demo.Point");
        assert_eq!(e.to_string(), "model invariant violation: demo.Point: bad");
    }
}
