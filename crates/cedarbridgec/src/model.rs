//! The compiled schema model.
//!
//! Built once (by [`crate::model_json`] or by hand in tests), then read-only
//! for the rest of code generation. [`Model::new`] indexes declarations and
//! precomputes every capability a generated type has to implement, so the
//! emitters never search the model for protocol or variant membership.

use std::collections::BTreeMap;
use std::fmt;

use sha2::Digest as _;
use uuid::Uuid;

use crate::generate::{GenerateError, GenerateErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName {
    pub package: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    /// Split `pkg.sub.Name` at the last dot.
    pub fn parse(qualified: &str) -> Option<Self> {
        let (package, name) = qualified.rsplit_once('.')?;
        if package.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(package, name))
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.package, self.name)
    }
}

/// A field or type-argument type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpression {
    /// Concrete or external type with no type arguments.
    Named(QualifiedName),
    /// Type parameter of the enclosing declaration.
    Parameter(String),
    /// Generic instantiation, e.g. `Option<List<A>>`.
    Application {
        target: QualifiedName,
        arguments: Vec<TypeExpression>,
    },
}

impl TypeExpression {
    pub fn named(package: &str, name: &str) -> Self {
        TypeExpression::Named(QualifiedName::new(package, name))
    }

    pub fn parameter(name: &str) -> Self {
        TypeExpression::Parameter(name.to_string())
    }

    pub fn application(target: QualifiedName, arguments: Vec<TypeExpression>) -> Self {
        TypeExpression::Application { target, arguments }
    }

    pub fn mentions_parameter(&self, parameter: &str) -> bool {
        match self {
            TypeExpression::Named(_) => false,
            TypeExpression::Parameter(p) => p == parameter,
            TypeExpression::Application { arguments, .. } => {
                arguments.iter().any(|a| a.mentions_parameter(parameter))
            }
        }
    }
}

impl fmt::Display for TypeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpression::Named(q) => write!(f, "{q}"),
            TypeExpression::Parameter(p) => write!(f, "{p}"),
            TypeExpression::Application { target, arguments } => {
                write!(f, "{target}<")?;
                for (idx, a) in arguments.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(">")
            }
        }
    }
}

/// Type parameter; every parameter carries the single "is serializable"
/// bound, so only the name is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParameter {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: TypeExpression,
}

impl Field {
    pub fn new(name: &str, ty: TypeExpression) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// One case of a variant. Its wire tag is its position in the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub name: String,
    pub fields: Vec<Field>,
    pub capabilities: Vec<Capability>,
}

impl Case {
    pub fn new(name: &str, fields: Vec<Field>) -> Self {
        Self {
            name: name.to_string(),
            fields,
            capabilities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationKind {
    Record { fields: Vec<Field> },
    Variant { cases: Vec<Case> },
    /// Opaque; served by a hand-written adapter.
    External,
}

/// An interface a generated type implements, fixed at model construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capability {
    /// Case `index` of `variant`.
    VariantCase { variant: QualifiedName, index: u32 },
    /// Message of some version of `protocol`.
    ProtocolMessage { protocol: QualifiedName },
    /// Message of exactly this version of `protocol`.
    ProtocolVersionMessage { protocol: QualifiedName, version: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDeclaration {
    pub name: QualifiedName,
    pub type_parameters: Vec<TypeParameter>,
    pub kind: DeclarationKind,
    pub capabilities: Vec<Capability>,
}

impl TypeDeclaration {
    fn with_kind(name: QualifiedName, type_parameters: &[&str], kind: DeclarationKind) -> Self {
        Self {
            name,
            type_parameters: type_parameters
                .iter()
                .map(|p| TypeParameter {
                    name: p.to_string(),
                })
                .collect(),
            kind,
            capabilities: Vec::new(),
        }
    }

    pub fn record(name: QualifiedName, type_parameters: &[&str], fields: Vec<Field>) -> Self {
        Self::with_kind(name, type_parameters, DeclarationKind::Record { fields })
    }

    pub fn variant(name: QualifiedName, type_parameters: &[&str], cases: Vec<Case>) -> Self {
        Self::with_kind(name, type_parameters, DeclarationKind::Variant { cases })
    }

    pub fn external(name: QualifiedName, type_parameters: &[&str]) -> Self {
        Self::with_kind(name, type_parameters, DeclarationKind::External)
    }

    pub fn is_external(&self) -> bool {
        matches!(self.kind, DeclarationKind::External)
    }

    pub fn arity(&self) -> usize {
        self.type_parameters.len()
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.type_parameters.iter().any(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub version: u64,
    pub messages: Vec<QualifiedName>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    pub name: QualifiedName,
    pub id: Uuid,
    pub versions: Vec<ProtocolVersion>,
}

/// Default protocol id: the first 16 bytes of SHA-256 over `pkg.Protocol`.
pub fn derive_protocol_id(name: &QualifiedName) -> Uuid {
    let digest = sha2::Sha256::digest(name.to_string().as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub types: Vec<TypeDeclaration>,
    pub protocols: Vec<Protocol>,
}

impl Package {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            types: Vec::new(),
            protocols: Vec::new(),
        }
    }

    pub fn find_type(&self, name: &str) -> Option<&TypeDeclaration> {
        self.types.iter().find(|t| t.name.name == name)
    }

    pub fn generated_types(&self) -> impl Iterator<Item = &TypeDeclaration> {
        self.types.iter().filter(|t| !t.is_external())
    }
}

/// Immutable package tree consumed by the generator.
#[derive(Debug, Clone)]
pub struct Model {
    packages: Vec<Package>,
    types: BTreeMap<QualifiedName, (usize, usize)>,
}

fn model_error(message: String) -> GenerateError {
    GenerateError::new(GenerateErrorKind::Model, message)
}

impl Model {
    /// Index `packages` and compute capabilities. Capability lists already
    /// present on the input are replaced.
    pub fn new(mut packages: Vec<Package>) -> Result<Self, GenerateError> {
        let mut types = BTreeMap::new();
        let mut package_names = BTreeMap::new();
        for (pidx, package) in packages.iter_mut().enumerate() {
            if package_names.insert(package.name.clone(), pidx).is_some() {
                return Err(model_error(format!(
                    "duplicate package: {:?}",
                    package.name
                )));
            }
            for (tidx, decl) in package.types.iter_mut().enumerate() {
                if decl.name.package != package.name {
                    return Err(model_error(format!(
                        "type {} declared in package {:?}",
                        decl.name, package.name
                    )));
                }
                if types.insert(decl.name.clone(), (pidx, tidx)).is_some() {
                    return Err(model_error(format!("duplicate type: {}", decl.name)));
                }
                decl.capabilities.clear();
                if let DeclarationKind::Variant { cases } = &mut decl.kind {
                    for (index, case) in cases.iter_mut().enumerate() {
                        case.capabilities = vec![Capability::VariantCase {
                            variant: decl.name.clone(),
                            index: index as u32,
                        }];
                    }
                }
            }
        }

        let mut memberships: Vec<(QualifiedName, Capability)> = Vec::new();
        for package in &packages {
            for protocol in &package.protocols {
                for version in &protocol.versions {
                    for message in &version.messages {
                        if !types.contains_key(message) {
                            return Err(model_error(format!(
                                "protocol {} version {}: unknown message type {message}",
                                protocol.name, version.version
                            )));
                        }
                        memberships.push((
                            message.clone(),
                            Capability::ProtocolMessage {
                                protocol: protocol.name.clone(),
                            },
                        ));
                        memberships.push((
                            message.clone(),
                            Capability::ProtocolVersionMessage {
                                protocol: protocol.name.clone(),
                                version: version.version,
                            },
                        ));
                    }
                }
            }
        }
        for (message, capability) in memberships {
            let Some(&(pidx, tidx)) = types.get(&message) else {
                continue;
            };
            let caps = &mut packages[pidx].types[tidx].capabilities;
            if !caps.contains(&capability) {
                caps.push(capability);
            }
        }

        Ok(Self { packages, types })
    }

    /// [`Model::new`] with the core package prepended.
    pub fn with_core(packages: Vec<Package>) -> Result<Self, GenerateError> {
        let mut all = Vec::with_capacity(packages.len() + 1);
        all.push(crate::core_package::core_package());
        all.extend(packages);
        Self::new(all)
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }

    pub fn find_type(&self, name: &QualifiedName) -> Option<&TypeDeclaration> {
        let &(pidx, tidx) = self.types.get(name)?;
        Some(&self.packages[pidx].types[tidx])
    }

    pub fn find_protocol(&self, name: &QualifiedName) -> Option<&Protocol> {
        self.package(&name.package)?
            .protocols
            .iter()
            .find(|p| p.name == *name)
    }

    /// Artifacts a full generation must produce: one per non-external type
    /// plus one per protocol version.
    pub fn expected_artifact_count(&self) -> usize {
        self.packages.iter().map(package_artifact_count).sum()
    }
}

pub fn package_artifact_count(package: &Package) -> usize {
    let types = package.generated_types().count();
    let versions: usize = package.protocols.iter().map(|p| p.versions.len()).sum();
    types + versions
}
