//! JSON model loader and binder.
//!
//! The document is the serialized compiled model:
//!
//! ```json
//! { "schema_version": "cedarbridge.model@0.1.0",
//!   "packages": [ { "name": "demo",
//!     "types": [ { "name": "Point", "kind": "record",
//!                  "fields": [ { "name": "a", "type": "IntegerUnsigned8" } ] } ],
//!     "protocols": [ { "name": "Echo",
//!                      "versions": [ { "version": 1, "messages": ["Point"] } ] } ] } ] }
//! ```
//!
//! Type expressions: `"Name"` names a type, `["t", "A"]` a type parameter of
//! the enclosing declaration, `["Head", arg, ...]` a generic application.
//! Unqualified names bind to the declaring package first, then to the core
//! package. Every rejection carries the JSON pointer of the offending node.

use std::collections::{BTreeMap, BTreeSet};

use cedarbridge_contracts::{CEDARBRIDGE_MODEL_SCHEMA_VERSION, CORE_PACKAGE_NAME};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::core_package::core_package;
use crate::externals::Builtin;
use crate::generate::{GenerateError, GenerateErrorKind};
use crate::model::{
    derive_protocol_id, Case, DeclarationKind, Field, Model, Package, Protocol, ProtocolVersion,
    QualifiedName, TypeDeclaration, TypeExpression, TypeParameter,
};
use crate::names;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelDoc {
    schema_version: String,
    packages: Vec<PackageDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageDoc {
    name: String,
    #[serde(default)]
    types: Vec<TypeDoc>,
    #[serde(default)]
    protocols: Vec<ProtocolDoc>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum KindDoc {
    Record,
    Variant,
    External,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TypeDoc {
    name: String,
    kind: KindDoc,
    #[serde(default)]
    type_params: Vec<String>,
    #[serde(default)]
    fields: Vec<FieldDoc>,
    #[serde(default)]
    cases: Vec<CaseDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldDoc {
    name: String,
    #[serde(rename = "type")]
    ty: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaseDoc {
    name: String,
    #[serde(default)]
    fields: Vec<FieldDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProtocolDoc {
    name: String,
    #[serde(default)]
    id: Option<String>,
    versions: Vec<VersionDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VersionDoc {
    version: u64,
    messages: Vec<String>,
}

fn err(ptr: &str, message: impl Into<String>) -> GenerateError {
    GenerateError::new(GenerateErrorKind::Model, message.into()).with_artifact(ptr)
}

/// Parse, validate and bind a model document. The core package is added
/// automatically and must not be declared.
pub fn load_model(bytes: &[u8]) -> Result<Model, GenerateError> {
    let doc: ModelDoc = serde_json::from_slice(bytes)
        .map_err(|e| GenerateError::new(GenerateErrorKind::Model, format!("parse model JSON: {e}")))?;
    if doc.schema_version != CEDARBRIDGE_MODEL_SCHEMA_VERSION {
        return Err(err(
            "/schema_version",
            format!(
                "expected {CEDARBRIDGE_MODEL_SCHEMA_VERSION:?}, got {:?}",
                doc.schema_version
            ),
        ));
    }

    let core = core_package();
    let arities = declared_arities(&doc, &core)?;

    let mut packages = Vec::with_capacity(doc.packages.len());
    for (pidx, p) in doc.packages.iter().enumerate() {
        let ptr = format!("/packages/{pidx}");
        let binder = Binder {
            package: &p.name,
            arities: &arities,
        };
        let mut package = Package::new(&p.name);
        for (tidx, t) in p.types.iter().enumerate() {
            package
                .types
                .push(binder.declaration(t, &format!("{ptr}/types/{tidx}"))?);
        }
        for (qidx, q) in p.protocols.iter().enumerate() {
            package
                .protocols
                .push(binder.protocol(q, &format!("{ptr}/protocols/{qidx}"))?);
        }
        packages.push(package);
    }

    check_recursion(&core, &packages)?;

    let model = Model::with_core(packages)?;
    tracing::debug!(
        packages = model.packages().len(),
        artifacts = model.expected_artifact_count(),
        "loaded model"
    );
    Ok(model)
}

// Keywords that cannot be written as raw identifiers.
const UNESCAPABLE: &[&str] = &["self", "Self", "super", "crate", "_"];

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !UNESCAPABLE.contains(&s)
}

fn check_type_name(ptr: &str, what: &str, name: &str) -> Result<(), GenerateError> {
    if !is_identifier(name) || !name.starts_with(|c: char| c.is_ascii_uppercase()) {
        return Err(err(
            ptr,
            format!("{what} name {name:?} must be an identifier starting with an uppercase letter"),
        ));
    }
    Ok(())
}

fn check_package_name(ptr: &str, name: &str) -> Result<(), GenerateError> {
    if name.split('.').any(|segment| !is_identifier(segment)) {
        return Err(err(
            ptr,
            format!("package name {name:?} must be dot-separated identifiers"),
        ));
    }
    if name == CORE_PACKAGE_NAME {
        return Err(err(
            ptr,
            format!("package {CORE_PACKAGE_NAME:?} is built in and cannot be declared"),
        ));
    }
    Ok(())
}

/// First pass: every declared type name with its arity, core included.
fn declared_arities(
    doc: &ModelDoc,
    core: &Package,
) -> Result<BTreeMap<QualifiedName, usize>, GenerateError> {
    let mut arities = BTreeMap::new();
    for decl in &core.types {
        arities.insert(decl.name.clone(), decl.arity());
    }
    let mut package_modules = BTreeMap::from([(names::package_module(CORE_PACKAGE_NAME), CORE_PACKAGE_NAME)]);
    for (pidx, p) in doc.packages.iter().enumerate() {
        let ptr = format!("/packages/{pidx}");
        check_package_name(&format!("{ptr}/name"), &p.name)?;
        if let Some(other) = package_modules.insert(names::package_module(&p.name), p.name.as_str()) {
            let message = if other == p.name {
                format!("duplicate package {:?}", p.name)
            } else {
                format!("package {:?} maps to the same module as {other:?}", p.name)
            };
            return Err(err(&format!("{ptr}/name"), message));
        }
        let mut modules = BTreeMap::new();
        for (tidx, t) in p.types.iter().enumerate() {
            let tptr = format!("{ptr}/types/{tidx}/name");
            check_type_name(&tptr, "type", &t.name)?;
            let q = QualifiedName::new(p.name.as_str(), t.name.as_str());
            if arities.insert(q, t.type_params.len()).is_some() {
                return Err(err(&tptr, format!("duplicate type {:?}", t.name)));
            }
            let module = names::type_module(&t.name);
            if matches!(module.as_str(), "r#mod" | "adapters") || module.starts_with("protocol_") {
                return Err(err(
                    &tptr,
                    format!("type {:?} collides with a generated module name", t.name),
                ));
            }
            if let Some(other) = modules.insert(module, t.name.as_str()) {
                return Err(err(
                    &tptr,
                    format!("type {:?} maps to the same module as {other:?}", t.name),
                ));
            }
        }
    }
    Ok(arities)
}

struct Binder<'a> {
    package: &'a str,
    arities: &'a BTreeMap<QualifiedName, usize>,
}

impl Binder<'_> {
    fn resolve_name(&self, ptr: &str, name: &str) -> Result<(QualifiedName, usize), GenerateError> {
        let candidates = if name.contains('.') {
            vec![QualifiedName::parse(name)
                .ok_or_else(|| err(ptr, format!("malformed qualified name {name:?}")))?]
        } else {
            vec![
                QualifiedName::new(self.package, name),
                QualifiedName::new(CORE_PACKAGE_NAME, name),
            ]
        };
        for q in candidates {
            if let Some(&arity) = self.arities.get(&q) {
                return Ok((q, arity));
            }
        }
        Err(err(ptr, format!("unknown type {name:?}")))
    }

    fn type_expression(
        &self,
        v: &Value,
        ptr: &str,
        params: &[TypeParameter],
    ) -> Result<TypeExpression, GenerateError> {
        match v {
            Value::String(s) => {
                let (q, arity) = self.resolve_name(ptr, s)?;
                if arity != 0 {
                    return Err(err(
                        ptr,
                        format!("{q} takes {arity} type arguments; use [\"{s}\", ...]"),
                    ));
                }
                Ok(TypeExpression::Named(q))
            }
            Value::Array(items) => {
                let head = items
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| err(ptr, "type expression head must be a string"))?;
                if head == "t" {
                    let name = match items.as_slice() {
                        [_, Value::String(name)] => name,
                        _ => return Err(err(ptr, "type parameter must be [\"t\", <name>]")),
                    };
                    if !params.iter().any(|p| p.name == *name) {
                        return Err(err(
                            &format!("{ptr}/1"),
                            format!("unknown type parameter {name:?}"),
                        ));
                    }
                    return Ok(TypeExpression::Parameter(name.clone()));
                }
                let (target, arity) = self.resolve_name(&format!("{ptr}/0"), head)?;
                let given = items.len() - 1;
                if given == 0 || given != arity {
                    return Err(err(
                        ptr,
                        format!("{target} takes {arity} type arguments, got {given}"),
                    ));
                }
                let mut arguments = Vec::with_capacity(given);
                for (idx, item) in items.iter().enumerate().skip(1) {
                    arguments.push(self.type_expression(item, &format!("{ptr}/{idx}"), params)?);
                }
                Ok(TypeExpression::Application { target, arguments })
            }
            _ => Err(err(ptr, "type expression must be a string or an array")),
        }
    }

    fn fields(
        &self,
        docs: &[FieldDoc],
        ptr: &str,
        params: &[TypeParameter],
    ) -> Result<Vec<Field>, GenerateError> {
        let mut seen = BTreeSet::new();
        let mut fields = Vec::with_capacity(docs.len());
        for (idx, f) in docs.iter().enumerate() {
            let fptr = format!("{ptr}/{idx}");
            let snake = names::snake_case(&f.name);
            if !is_identifier(&f.name) || UNESCAPABLE.contains(&snake.as_str()) || snake == "_marker" {
                return Err(err(&format!("{fptr}/name"), format!("bad field name {:?}", f.name)));
            }
            if !seen.insert(snake) {
                return Err(err(&format!("{fptr}/name"), format!("duplicate field {:?}", f.name)));
            }
            let ty = self.type_expression(&f.ty, &format!("{fptr}/type"), params)?;
            fields.push(Field::new(&f.name, ty));
        }
        Ok(fields)
    }

    fn declaration(&self, t: &TypeDoc, ptr: &str) -> Result<TypeDeclaration, GenerateError> {
        let name = QualifiedName::new(self.package, t.name.as_str());
        let mut params: Vec<TypeParameter> = Vec::with_capacity(t.type_params.len());
        for (idx, p) in t.type_params.iter().enumerate() {
            let pptr = format!("{ptr}/type_params/{idx}");
            check_type_name(&pptr, "type parameter", p)?;
            if params.iter().any(|q| q.name == *p) {
                return Err(err(&pptr, format!("duplicate type parameter {p:?}")));
            }
            params.push(TypeParameter { name: p.clone() });
        }
        let param_names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();

        match t.kind {
            KindDoc::Record => {
                if !t.cases.is_empty() {
                    return Err(err(&format!("{ptr}/cases"), "records have no cases"));
                }
                let fields = self.fields(&t.fields, &format!("{ptr}/fields"), &params)?;
                Ok(TypeDeclaration::record(name, &param_names, fields))
            }
            KindDoc::Variant => {
                if !t.fields.is_empty() {
                    return Err(err(&format!("{ptr}/fields"), "variant fields belong to cases"));
                }
                if t.cases.is_empty() {
                    return Err(err(&format!("{ptr}/cases"), "variant needs at least one case"));
                }
                let mut cases = Vec::with_capacity(t.cases.len());
                for (idx, c) in t.cases.iter().enumerate() {
                    let cptr = format!("{ptr}/cases/{idx}");
                    check_type_name(&format!("{cptr}/name"), "case", &c.name)?;
                    if cases.iter().any(|existing: &Case| existing.name == c.name) {
                        return Err(err(
                            &format!("{cptr}/name"),
                            format!("duplicate case {:?}", c.name),
                        ));
                    }
                    let case_struct = names::case_struct(&t.name, &c.name);
                    if self
                        .arities
                        .contains_key(&QualifiedName::new(self.package, case_struct.as_str()))
                    {
                        return Err(err(
                            &format!("{cptr}/name"),
                            format!("case struct {case_struct:?} collides with a declared type"),
                        ));
                    }
                    let fields = self.fields(&c.fields, &format!("{cptr}/fields"), &params)?;
                    cases.push(Case::new(&c.name, fields));
                }
                Ok(TypeDeclaration::variant(name, &param_names, cases))
            }
            KindDoc::External => {
                if !t.fields.is_empty() || !t.cases.is_empty() {
                    return Err(err(ptr, "external types declare no fields or cases"));
                }
                Ok(TypeDeclaration::external(name, &param_names))
            }
        }
    }

    fn protocol(&self, p: &ProtocolDoc, ptr: &str) -> Result<Protocol, GenerateError> {
        check_type_name(&format!("{ptr}/name"), "protocol", &p.name)?;
        let name = QualifiedName::new(self.package, p.name.as_str());
        let id = match &p.id {
            Some(s) => Uuid::parse_str(s)
                .map_err(|e| err(&format!("{ptr}/id"), format!("bad protocol id {s:?}: {e}")))?,
            None => derive_protocol_id(&name),
        };
        if p.versions.is_empty() {
            return Err(err(&format!("{ptr}/versions"), "protocol needs at least one version"));
        }
        let mut versions: Vec<ProtocolVersion> = Vec::with_capacity(p.versions.len());
        for (vidx, v) in p.versions.iter().enumerate() {
            let vptr = format!("{ptr}/versions/{vidx}");
            if versions.iter().any(|existing| existing.version == v.version) {
                return Err(err(
                    &format!("{vptr}/version"),
                    format!("duplicate version {}", v.version),
                ));
            }
            if v.messages.is_empty() {
                return Err(err(&format!("{vptr}/messages"), "version needs at least one message"));
            }
            let mut messages: Vec<QualifiedName> = Vec::with_capacity(v.messages.len());
            for (midx, m) in v.messages.iter().enumerate() {
                let mptr = format!("{vptr}/messages/{midx}");
                let (q, arity) = self.resolve_name(&mptr, m)?;
                if arity != 0 {
                    return Err(err(&mptr, format!("message {q} must not be generic")));
                }
                if q.package == CORE_PACKAGE_NAME {
                    return Err(err(&mptr, format!("message {q} must be a user declaration")));
                }
                // Enum variants are named by the simple type name.
                if messages.iter().any(|existing| existing.name == q.name) {
                    return Err(err(&mptr, format!("duplicate message {:?}", q.name)));
                }
                messages.push(q);
            }
            versions.push(ProtocolVersion {
                version: v.version,
                messages,
            });
        }
        Ok(Protocol { name, id, versions })
    }
}

/// Messages must be records or variants, and a type may only contain itself
/// through a `List`.
fn check_recursion(core: &Package, packages: &[Package]) -> Result<(), GenerateError> {
    let mut decls: BTreeMap<&QualifiedName, &TypeDeclaration> = BTreeMap::new();
    for decl in core.types.iter().chain(packages.iter().flat_map(|p| &p.types)) {
        decls.insert(&decl.name, decl);
    }

    for (pidx, p) in packages.iter().enumerate() {
        for (qidx, protocol) in p.protocols.iter().enumerate() {
            for (vidx, version) in protocol.versions.iter().enumerate() {
                for (midx, m) in version.messages.iter().enumerate() {
                    if decls.get(m).is_some_and(|d| d.is_external()) {
                        return Err(err(
                            &format!("/packages/{pidx}/protocols/{qidx}/versions/{vidx}/messages/{midx}"),
                            format!("message {m} must not be external"),
                        ));
                    }
                }
            }
        }
    }

    let by_value = held_by_value(&decls);
    let edges: BTreeMap<&QualifiedName, BTreeSet<QualifiedName>> = decls
        .iter()
        .map(|(name, decl)| {
            let mut out = BTreeSet::new();
            for f in declared_fields(decl) {
                value_refs(&f.ty, &by_value, &mut out);
            }
            (*name, out)
        })
        .collect();

    for (pidx, p) in packages.iter().enumerate() {
        for (tidx, decl) in p.types.iter().enumerate() {
            let mut stack: Vec<&QualifiedName> = edges[&decl.name].iter().collect();
            let mut visited = BTreeSet::new();
            while let Some(next) = stack.pop() {
                if *next == decl.name {
                    return Err(err(
                        &format!("/packages/{pidx}/types/{tidx}"),
                        format!("{} contains itself by value; recurse through List", decl.name),
                    ));
                }
                if visited.insert(next) {
                    if let Some(out) = edges.get(next) {
                        stack.extend(out.iter());
                    }
                }
            }
        }
    }
    Ok(())
}

fn declared_fields(decl: &TypeDeclaration) -> Vec<&Field> {
    match &decl.kind {
        DeclarationKind::Record { fields } => fields.iter().collect(),
        DeclarationKind::Variant { cases } => cases.iter().flat_map(|c| &c.fields).collect(),
        DeclarationKind::External => Vec::new(),
    }
}

fn is_list(name: &QualifiedName) -> bool {
    Builtin::from_name(name) == Some(Builtin::List)
}

/// For each declaration, which type parameters end up stored inline (not
/// behind a `List`). Computed as a fixpoint since generics nest.
fn held_by_value<'a>(
    decls: &BTreeMap<&'a QualifiedName, &'a TypeDeclaration>,
) -> BTreeMap<&'a QualifiedName, Vec<bool>> {
    let mut held: BTreeMap<&QualifiedName, Vec<bool>> = decls
        .iter()
        .map(|(name, decl)| {
            // Externals other than List store their arguments opaquely.
            let inline = decl.is_external() && !is_list(name);
            (*name, vec![inline; decl.arity()])
        })
        .collect();
    loop {
        let mut changed = false;
        for (name, decl) in decls {
            if decl.is_external() {
                continue;
            }
            for (idx, p) in decl.type_parameters.iter().enumerate() {
                if held[name][idx] {
                    continue;
                }
                let inline = declared_fields(decl)
                    .iter()
                    .any(|f| mentions_by_value(&f.ty, &p.name, &held));
                if inline {
                    if let Some(flags) = held.get_mut(name) {
                        flags[idx] = true;
                    }
                    changed = true;
                }
            }
        }
        if !changed {
            return held;
        }
    }
}

fn mentions_by_value(
    ty: &TypeExpression,
    parameter: &str,
    held: &BTreeMap<&QualifiedName, Vec<bool>>,
) -> bool {
    match ty {
        TypeExpression::Named(_) => false,
        TypeExpression::Parameter(p) => p == parameter,
        TypeExpression::Application { target, arguments } => {
            let Some(flags) = held.get(target) else {
                return false;
            };
            arguments
                .iter()
                .zip(flags)
                .any(|(a, &inline)| inline && mentions_by_value(a, parameter, held))
        }
    }
}

fn value_refs(
    ty: &TypeExpression,
    held: &BTreeMap<&QualifiedName, Vec<bool>>,
    out: &mut BTreeSet<QualifiedName>,
) {
    match ty {
        TypeExpression::Named(q) => {
            out.insert(q.clone());
        }
        TypeExpression::Parameter(_) => {}
        TypeExpression::Application { target, arguments } => {
            if is_list(target) {
                return;
            }
            out.insert(target.clone());
            if let Some(flags) = held.get(target) {
                for (a, &inline) in arguments.iter().zip(flags) {
                    if inline {
                        value_refs(a, held, out);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn load(doc: Value) -> Result<Model, GenerateError> {
        load_model(&serde_json::to_vec(&doc).unwrap())
    }

    fn with_types(types: Value) -> Value {
        json!({
            "schema_version": CEDARBRIDGE_MODEL_SCHEMA_VERSION,
            "packages": [ { "name": "demo", "types": types } ]
        })
    }

    #[test]
    fn binds_unqualified_names_to_package_then_core() {
        let model = load(with_types(json!([
            { "name": "String", "kind": "record", "fields": [] },
            { "name": "Holder", "kind": "record", "fields": [
                { "name": "own", "type": "String" },
                { "name": "core", "type": "cedarbridge.core.String" },
                { "name": "maybe", "type": ["Option", "IntegerSigned32"] }
            ] }
        ])))
        .unwrap();
        let holder = model.find_type(&QualifiedName::new("demo", "Holder")).unwrap();
        let DeclarationKind::Record { fields } = &holder.kind else {
            panic!("record expected");
        };
        assert_eq!(fields[0].ty, TypeExpression::named("demo", "String"));
        assert_eq!(fields[1].ty, TypeExpression::named("cedarbridge.core", "String"));
        assert_eq!(
            fields[2].ty,
            TypeExpression::application(
                QualifiedName::new("cedarbridge.core", "Option"),
                vec![TypeExpression::named("cedarbridge.core", "IntegerSigned32")]
            )
        );
    }

    #[test]
    fn rejections_carry_json_pointers() {
        let cases = [
            (
                json!([{ "name": "P", "kind": "record", "fields": [
                    { "name": "x", "type": "Nope" } ] }]),
                "/packages/0/types/0/fields/0/type",
                "unknown type",
            ),
            (
                json!([{ "name": "P", "kind": "record", "fields": [
                    { "name": "x", "type": ["t", "B"] } ] }]),
                "/packages/0/types/0/fields/0/type/1",
                "unknown type parameter",
            ),
            (
                json!([{ "name": "P", "kind": "record", "fields": [
                    { "name": "x", "type": "Option" } ] }]),
                "/packages/0/types/0/fields/0/type",
                "takes 1 type arguments",
            ),
            (
                json!([{ "name": "P", "kind": "record", "fields": [
                    { "name": "x", "type": ["Map", "String"] } ] }]),
                "/packages/0/types/0/fields/0/type",
                "got 1",
            ),
            (
                json!([{ "name": "P", "kind": "record", "fields": [
                    { "name": "fooBar", "type": "String" },
                    { "name": "foo_bar", "type": "String" } ] }]),
                "/packages/0/types/0/fields/1/name",
                "duplicate field",
            ),
            (
                json!([{ "name": "V", "kind": "variant", "cases": [] }]),
                "/packages/0/types/0/cases",
                "at least one case",
            ),
            (
                json!([{ "name": "lower", "kind": "record" }]),
                "/packages/0/types/0/name",
                "uppercase",
            ),
            (
                json!([{ "name": "T", "kind": "record", "fields": [
                    { "name": "next", "type": ["Option", "T"] } ] }]),
                "/packages/0/types/0",
                "contains itself",
            ),
        ];
        for (types, ptr, needle) in cases {
            let e = load(with_types(types)).unwrap_err();
            assert_eq!(e.kind, GenerateErrorKind::Model);
            assert_eq!(e.artifact.as_deref(), Some(ptr), "{e}");
            assert!(e.message.contains(needle), "{e}");
        }
    }

    #[test]
    fn recursion_through_list_is_allowed() {
        let model = load(with_types(json!([
            { "name": "Tree", "kind": "record", "fields": [
                { "name": "children", "type": ["List", "Tree"] },
                { "name": "index", "type": ["Map", "String", "Tree"] }
            ] }
        ])))
        .unwrap();
        assert!(model.find_type(&QualifiedName::new("demo", "Tree")).is_some());
    }

    #[test]
    fn protocol_ids_default_to_the_derived_value() {
        let model = load(json!({
            "schema_version": CEDARBRIDGE_MODEL_SCHEMA_VERSION,
            "packages": [ {
                "name": "demo",
                "types": [ { "name": "Ping", "kind": "record" } ],
                "protocols": [
                    { "name": "Echo", "versions": [ { "version": 1, "messages": ["Ping"] } ] },
                    { "name": "Fixed", "id": "00112233-4455-6677-8899-aabbccddeeff",
                      "versions": [ { "version": 3, "messages": ["Ping"] } ] }
                ]
            } ]
        }))
        .unwrap();
        let echo = model.find_protocol(&QualifiedName::new("demo", "Echo")).unwrap();
        assert_eq!(echo.id, derive_protocol_id(&echo.name));
        let fixed = model.find_protocol(&QualifiedName::new("demo", "Fixed")).unwrap();
        assert_eq!(fixed.id.as_u128(), 0x00112233_4455_6677_8899_aabbccddeeff);
    }

    #[test]
    fn protocol_rejections() {
        let proto = |protocols: Value| {
            json!({
                "schema_version": CEDARBRIDGE_MODEL_SCHEMA_VERSION,
                "packages": [ {
                    "name": "demo",
                    "types": [
                        { "name": "Ping", "kind": "record" },
                        { "name": "Box", "kind": "record", "type_params": ["A"] },
                        { "name": "Raw", "kind": "external" }
                    ],
                    "protocols": protocols
                } ]
            })
        };
        let cases = [
            (json!([{ "name": "E", "versions": [] }]), "at least one version"),
            (
                json!([{ "name": "E", "versions": [{ "version": 1, "messages": [] }] }]),
                "at least one message",
            ),
            (
                json!([{ "name": "E", "versions": [{ "version": 1, "messages": ["Box"] }] }]),
                "must not be generic",
            ),
            (
                json!([{ "name": "E", "versions": [{ "version": 1, "messages": ["Raw"] }] }]),
                "must not be external",
            ),
            (
                json!([{ "name": "E", "versions": [
                    { "version": 1, "messages": ["Ping"] },
                    { "version": 1, "messages": ["Ping"] } ] }]),
                "duplicate version",
            ),
            (
                json!([{ "name": "E", "versions": [
                    { "version": 1, "messages": ["Ping", "demo.Ping"] } ] }]),
                "duplicate message",
            ),
        ];
        for (protocols, needle) in cases {
            let e = load(proto(protocols)).unwrap_err();
            assert!(e.message.contains(needle), "{needle}: {e}");
        }
    }

    #[test]
    fn document_level_rejections() {
        let e = load(json!({ "schema_version": "other", "packages": [] })).unwrap_err();
        assert_eq!(e.artifact.as_deref(), Some("/schema_version"));

        let e = load(json!({
            "schema_version": CEDARBRIDGE_MODEL_SCHEMA_VERSION,
            "packages": [ { "name": "cedarbridge.core" } ]
        }))
        .unwrap_err();
        assert!(e.message.contains("built in"), "{e}");

        let e = load(json!({
            "schema_version": CEDARBRIDGE_MODEL_SCHEMA_VERSION,
            "packages": [],
            "extra": true
        }))
        .unwrap_err();
        assert!(e.message.contains("unknown field"), "{e}");
    }
}
