//! Shared, version-pinned identifiers.
//!
//! These constants are the single source of truth for schema/version strings
//! and well-known names that appear in machine-readable I/O and in generated code.

pub const CEDARBRIDGE_MODEL_SCHEMA_VERSION: &str = "cedarbridge.model@0.1.0";
pub const CEDARBRIDGE_GENERATE_REPORT_SCHEMA_VERSION: &str = "cedarbridge.generate.report@0.1.0";

/// Package that declares the built-in external types and the standard generic
/// containers (`Option`, `MapEntry`, `Map`).
pub const CORE_PACKAGE_NAME: &str = "cedarbridge.core";

/// Default path generated code uses to reach the runtime crate.
pub const DEFAULT_RUNTIME_PATH: &str = "::cedarbridge_runtime";

/// Header line written at the top of every generated file.
pub const GENERATED_FILE_HEADER: &str = "// @generated by cedarbridge; do not edit.";
