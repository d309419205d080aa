//! Rust source for type modules, package modules and the root module.
//!
//! Every generated file lives one directory below the output root, so
//! cross references are spelled `super::super::<package>::<module>::<Type>`
//! regardless of which package refers to which.

use cedarbridge_contracts::GENERATED_FILE_HEADER;

use crate::externals::Builtin;
use crate::generate::{GenerateError, GenerateOptions};
use crate::method_ref::{Direction, LambdaRef, MethodRef, ResolvedFields};
use crate::model::{
    Capability, Case, DeclarationKind, Field, Model, Package, QualifiedName, TypeDeclaration,
    TypeExpression, TypeParameter,
};
use crate::names::{self, ident, FreshNames};

/// Line-oriented writer with four-space indentation.
#[derive(Debug, Default)]
pub(crate) struct SourceWriter {
    out: String,
    indent: usize,
}

impl SourceWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn line(&mut self, s: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(s);
        self.out.push('\n');
    }

    pub(crate) fn blank(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    /// Write `head` followed by ` {` and indent.
    pub(crate) fn open(&mut self, head: &str) {
        if head.is_empty() {
            self.line("{");
        } else {
            self.line(&format!("{head} {{"));
        }
        self.indent += 1;
    }

    pub(crate) fn close(&mut self, suffix: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(&format!("}}{suffix}"));
    }

    pub(crate) fn indented(&mut self) {
        self.indent += 1;
    }

    pub(crate) fn dedented(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub(crate) fn header(&mut self, doc: &str) {
        self.line(GENERATED_FILE_HEADER);
        self.line(&format!("//! {doc}"));
        self.line("#![allow(clippy::all, unused_variables)]");
        self.blank();
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}

/// Maps model references to Rust paths for code living one level below the
/// output root.
pub(crate) struct RustTypes<'a> {
    model: &'a Model,
    runtime: &'a str,
}

impl<'a> RustTypes<'a> {
    pub(crate) fn new(model: &'a Model, options: &'a GenerateOptions) -> Self {
        Self {
            model,
            runtime: options.runtime_path.as_str(),
        }
    }

    /// Runtime item path, e.g. `rt("SerializeContext")`.
    pub(crate) fn rt(&self, item: &str) -> String {
        format!("{}::{item}", self.runtime)
    }

    pub(crate) fn decl(&self, name: &QualifiedName) -> Result<&'a TypeDeclaration, GenerateError> {
        self.model
            .find_type(name)
            .ok_or_else(|| GenerateError::invariant(format!("unresolved type reference: {name}")))
    }

    pub(crate) fn package_path(&self, package: &str) -> String {
        format!("super::super::{}", names::package_module(package))
    }

    pub(crate) fn module_path(&self, name: &QualifiedName) -> String {
        format!(
            "{}::{}",
            self.package_path(&name.package),
            names::type_module(&name.name)
        )
    }

    pub(crate) fn declared_type(&self, name: &QualifiedName) -> String {
        format!("{}::{}", self.module_path(name), ident(&name.name))
    }

    pub(crate) fn rust_type(&self, ty: &TypeExpression) -> Result<String, GenerateError> {
        match ty {
            TypeExpression::Parameter(p) => Ok(ident(p)),
            TypeExpression::Named(q) => self.applied(q, &[]),
            TypeExpression::Application { target, arguments } => {
                if arguments.is_empty() {
                    return Err(GenerateError::invariant(format!(
                        "application of {target} has no type arguments"
                    )));
                }
                let args = arguments
                    .iter()
                    .map(|a| self.rust_type(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.applied(target, &args)
            }
        }
    }

    fn applied(&self, name: &QualifiedName, args: &[String]) -> Result<String, GenerateError> {
        let decl = self.decl(name)?;
        if decl.arity() != args.len() {
            return Err(GenerateError::invariant(format!(
                "{name} takes {} type arguments, got {}",
                decl.arity(),
                args.len()
            )));
        }
        if decl.is_external() {
            if let Some(b) = Builtin::from_name(name) {
                return Ok(b.rust_type(self.runtime, args));
            }
            let base = format!(
                "{}::adapters::{}",
                self.package_path(&name.package),
                ident(&name.name)
            );
            return Ok(with_args(base, args));
        }
        Ok(with_args(self.declared_type(name), args))
    }

    pub(crate) fn codec_fn(
        &self,
        name: &QualifiedName,
        direction: Direction,
    ) -> Result<String, GenerateError> {
        let decl = self.decl(name)?;
        if decl.is_external() {
            if let Some(b) = Builtin::from_name(name) {
                return Ok(match direction {
                    Direction::Serialize => b.serialize_fn(self.runtime),
                    Direction::Deserialize => b.deserialize_fn(self.runtime),
                });
            }
            return Ok(format!(
                "{}::adapters::{}_{}",
                self.package_path(&name.package),
                verb(direction),
                names::snake_case(&name.name)
            ));
        }
        Ok(format!("{}::{}", self.module_path(name), verb(direction)))
    }

    fn param_fn(parameter: &str, direction: Direction) -> String {
        match direction {
            Direction::Serialize => names::serialize_param(parameter),
            Direction::Deserialize => names::deserialize_param(parameter),
        }
    }

    /// Expression passing `r` as a codec argument.
    fn arg_expr(&self, r: &MethodRef, direction: Direction) -> Result<String, GenerateError> {
        Ok(match r {
            MethodRef::Parameter(p) => Self::param_fn(p, direction),
            MethodRef::Named(q) => format!("&{}", self.codec_fn(q, direction)?),
            MethodRef::Lambda(l) => format!("&{}", l.lambda_name),
        })
    }

    /// Callable expression for `r`.
    fn callee(&self, r: &MethodRef, direction: Direction) -> Result<String, GenerateError> {
        Ok(match r {
            MethodRef::Parameter(p) => Self::param_fn(p, direction),
            MethodRef::Named(q) => self.codec_fn(q, direction)?,
            MethodRef::Lambda(l) => l.lambda_name.clone(),
        })
    }

    pub(crate) fn emit_lambdas(
        &self,
        w: &mut SourceWriter,
        lambdas: &[&LambdaRef],
    ) -> Result<(), GenerateError> {
        for l in lambdas {
            let direction = l.fn_type.direction();
            let app = self.rust_type(&l.app_type)?;
            let target = self.codec_fn(&l.target, direction)?;
            let mut args = String::new();
            for a in &l.arg_refs {
                args.push_str(", ");
                args.push_str(&self.arg_expr(a, direction)?);
            }
            let ctx = &l.context_param_name;
            match direction {
                Direction::Serialize => {
                    let value = &l.value_param_name;
                    w.line(&format!(
                        "let {} = |{ctx}: &mut dyn {}, {value}: &{app}| -> {}<()> {{",
                        l.lambda_name,
                        self.rt("SerializeContext"),
                        self.rt("Result"),
                    ));
                    w.indented();
                    w.line(&format!("{target}({ctx}, {value}{args})"));
                }
                Direction::Deserialize => {
                    w.line(&format!(
                        "let {} = |{ctx}: &mut dyn {}| -> {}<{app}> {{",
                        l.lambda_name,
                        self.rt("DeserializeContext"),
                        self.rt("Result"),
                    ));
                    w.indented();
                    w.line(&format!("{target}({ctx}{args})"));
                }
            }
            w.close(";");
        }
        Ok(())
    }
}

fn verb(direction: Direction) -> &'static str {
    match direction {
        Direction::Serialize => "serialize",
        Direction::Deserialize => "deserialize",
    }
}

fn with_args(base: String, args: &[String]) -> String {
    if args.is_empty() {
        base
    } else {
        format!("{base}<{}>", args.join(", "))
    }
}

pub(crate) fn generics(params: &[TypeParameter]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let names: Vec<String> = params.iter().map(|p| ident(&p.name)).collect();
    format!("<{}>", names.join(", "))
}

fn field_ident(f: &Field) -> String {
    ident(&names::snake_case(&f.name))
}

fn field_local(f: &Field) -> String {
    format!("field_{}", names::snake_case(&f.name))
}

fn check_parameters(decl: &TypeDeclaration, ty: &TypeExpression) -> Result<(), GenerateError> {
    match ty {
        TypeExpression::Named(_) => Ok(()),
        TypeExpression::Parameter(p) => {
            if decl.has_parameter(p) {
                Ok(())
            } else {
                Err(GenerateError::invariant(format!(
                    "{}: type parameter {p:?} is not declared",
                    decl.name
                )))
            }
        }
        TypeExpression::Application { arguments, .. } => arguments
            .iter()
            .try_for_each(|a| check_parameters(decl, a)),
    }
}

struct Scopes(bool);

impl Scopes {
    fn begin(&self, w: &mut SourceWriter, label: &str) {
        if self.0 {
            w.line(&format!("ctx.begin({label:?});"));
        }
    }

    fn end(&self, w: &mut SourceWriter, label: &str) {
        if self.0 {
            w.line(&format!("ctx.end({label:?});"));
        }
    }
}

/// Record-shaped struct: a record, or one case of a variant.
struct StructShape<'d> {
    doc: String,
    name: String,
    params: &'d [TypeParameter],
    fields: &'d [Field],
}

fn emit_struct(
    w: &mut SourceWriter,
    types: &RustTypes<'_>,
    shape: &StructShape<'_>,
) -> Result<(), GenerateError> {
    let g = generics(shape.params);
    let mut field_types = Vec::with_capacity(shape.fields.len());
    for f in shape.fields {
        field_types.push(types.rust_type(&f.ty)?);
    }
    let unused: Vec<String> = shape
        .params
        .iter()
        .filter(|p| !shape.fields.iter().any(|f| f.ty.mentions_parameter(&p.name)))
        .map(|p| ident(&p.name))
        .collect();
    let marker = match unused.len() {
        0 => None,
        1 => Some(format!("::core::marker::PhantomData<fn() -> {}>", unused[0])),
        _ => Some(format!(
            "::core::marker::PhantomData<fn() -> ({})>",
            unused.join(", ")
        )),
    };

    w.line(&format!("/// {}", shape.doc));
    w.line("#[derive(Debug, Clone, PartialEq, Eq, Hash)]");
    if shape.fields.is_empty() && marker.is_none() {
        w.line(&format!("pub struct {}{g} {{}}", shape.name));
    } else {
        w.open(&format!("pub struct {}{g}", shape.name));
        for (f, ty) in shape.fields.iter().zip(&field_types) {
            w.line(&format!("{}: {ty},", field_ident(f)));
        }
        if let Some(m) = &marker {
            w.line(&format!("_marker: {m},"));
        }
        w.close("");
    }
    w.blank();

    w.open(&format!("impl{g} {}{g}", shape.name));
    let params: Vec<String> = shape
        .fields
        .iter()
        .zip(&field_types)
        .map(|(f, ty)| format!("{}: {ty}", field_ident(f)))
        .collect();
    w.open(&format!("pub fn new({}) -> Self", params.join(", ")));
    let mut inits: Vec<String> = shape.fields.iter().map(field_ident).collect();
    if marker.is_some() {
        inits.push("_marker: ::core::marker::PhantomData".to_string());
    }
    if inits.is_empty() {
        w.line("Self {}");
    } else {
        w.line(&format!("Self {{ {} }}", inits.join(", ")));
    }
    w.close("");
    for (f, ty) in shape.fields.iter().zip(&field_types) {
        w.blank();
        let name = field_ident(f);
        w.open(&format!("pub fn {name}(&self) -> &{ty}"));
        w.line(&format!("&self.{name}"));
        w.close("");
    }
    w.close("");
    Ok(())
}

/// Opening lines of `serialize`, up to and including the opening brace.
fn open_serialize(
    w: &mut SourceWriter,
    types: &RustTypes<'_>,
    params: &[TypeParameter],
    value_type: &str,
) {
    w.line(&format!("pub fn serialize{}(", generics(params)));
    w.indented();
    w.line(&format!("ctx: &mut dyn {},", types.rt("SerializeContext")));
    w.line(&format!("value: &{value_type},"));
    for p in params {
        w.line(&format!(
            "{}: &{}<'_, {}>,",
            names::serialize_param(&p.name),
            types.rt("SerializeFn"),
            ident(&p.name)
        ));
    }
    w.dedented();
    w.open(&format!(") -> {}<()>", types.rt("Result")));
}

fn open_deserialize(
    w: &mut SourceWriter,
    types: &RustTypes<'_>,
    params: &[TypeParameter],
    value_type: &str,
) {
    w.line(&format!("pub fn deserialize{}(", generics(params)));
    w.indented();
    w.line(&format!("ctx: &mut dyn {},", types.rt("DeserializeContext")));
    for p in params {
        w.line(&format!(
            "{}: &{}<'_, {}>,",
            names::deserialize_param(&p.name),
            types.rt("DeserializeFn"),
            ident(&p.name)
        ));
    }
    w.dedented();
    w.open(&format!(") -> {}<{value_type}>", types.rt("Result")));
}

/// Writes of `fields` read from `source` (`value` or a case binding).
fn emit_field_writes(
    w: &mut SourceWriter,
    types: &RustTypes<'_>,
    scopes: &Scopes,
    fields: &[Field],
    refs: &[MethodRef],
    source: &str,
) -> Result<(), GenerateError> {
    for (f, r) in fields.iter().zip(refs) {
        scopes.begin(w, &f.name);
        w.line(&format!(
            "{}(ctx, &{source}.{})?;",
            types.callee(r, Direction::Serialize)?,
            field_ident(f)
        ));
        scopes.end(w, &f.name);
    }
    Ok(())
}

fn emit_field_reads(
    w: &mut SourceWriter,
    types: &RustTypes<'_>,
    scopes: &Scopes,
    fields: &[Field],
    refs: &[MethodRef],
) -> Result<(), GenerateError> {
    for (f, r) in fields.iter().zip(refs) {
        scopes.begin(w, &f.name);
        w.line(&format!(
            "let {} = {}(ctx)?;",
            field_local(f),
            types.callee(r, Direction::Deserialize)?
        ));
        scopes.end(w, &f.name);
    }
    Ok(())
}

fn constructor_args(fields: &[Field]) -> String {
    fields.iter().map(field_local).collect::<Vec<_>>().join(", ")
}

fn emit_record(
    w: &mut SourceWriter,
    types: &RustTypes<'_>,
    scopes: &Scopes,
    decl: &TypeDeclaration,
    fields: &[Field],
) -> Result<(), GenerateError> {
    let name = ident(&decl.name.name);
    let self_type = format!("{name}{}", generics(&decl.type_parameters));
    emit_struct(
        w,
        types,
        &StructShape {
            doc: format!("Record `{}`.", decl.name),
            name: name.clone(),
            params: &decl.type_parameters,
            fields,
        },
    )?;
    w.blank();

    let resolved = ResolvedFields::resolve(
        fields.iter().map(|f| &f.ty),
        Direction::Serialize,
        &mut FreshNames::new(),
    );
    open_serialize(w, types, &decl.type_parameters, &self_type);
    types.emit_lambdas(w, &resolved.lambdas())?;
    scopes.begin(w, &decl.name.name);
    emit_field_writes(w, types, scopes, fields, &resolved.refs, "value")?;
    scopes.end(w, &decl.name.name);
    w.line("Ok(())");
    w.close("");
    w.blank();

    let resolved = ResolvedFields::resolve(
        fields.iter().map(|f| &f.ty),
        Direction::Deserialize,
        &mut FreshNames::new(),
    );
    open_deserialize(w, types, &decl.type_parameters, &self_type);
    types.emit_lambdas(w, &resolved.lambdas())?;
    scopes.begin(w, &decl.name.name);
    emit_field_reads(w, types, scopes, fields, &resolved.refs)?;
    scopes.end(w, &decl.name.name);
    w.line(&format!("Ok({name}::new({}))", constructor_args(fields)));
    w.close("");
    Ok(())
}

fn case_index(decl: &TypeDeclaration, case: &Case, position: usize) -> Result<u32, GenerateError> {
    let index = case.capabilities.iter().find_map(|c| match c {
        Capability::VariantCase { variant, index } if *variant == decl.name => Some(*index),
        _ => None,
    });
    match index {
        Some(i) if i as usize == position => Ok(i),
        Some(i) => Err(GenerateError::invariant(format!(
            "{}.{}: tag {i} does not match declaration index {position}",
            decl.name, case.name
        ))),
        None => Err(GenerateError::invariant(format!(
            "{}.{}: case is missing its variant capability",
            decl.name, case.name
        ))),
    }
}

fn emit_variant(
    w: &mut SourceWriter,
    types: &RustTypes<'_>,
    scopes: &Scopes,
    decl: &TypeDeclaration,
    cases: &[Case],
) -> Result<(), GenerateError> {
    if cases.is_empty() {
        return Err(GenerateError::invariant(format!(
            "{}: variant has no cases",
            decl.name
        )));
    }
    let name = ident(&decl.name.name);
    let g = generics(&decl.type_parameters);
    let self_type = format!("{name}{g}");
    let mut tags = Vec::with_capacity(cases.len());
    for (position, case) in cases.iter().enumerate() {
        tags.push(case_index(decl, case, position)?);
    }

    for (case, tag) in cases.iter().zip(&tags) {
        let case_name = names::case_struct(&decl.name.name, &case.name);
        emit_struct(
            w,
            types,
            &StructShape {
                doc: format!("Case `{}` of `{}` (tag {tag}).", case.name, decl.name),
                name: case_name.clone(),
                params: &decl.type_parameters,
                fields: &case.fields,
            },
        )?;
        w.blank();
        w.open(&format!(
            "impl{g} {} for {case_name}{g}",
            types.rt("VariantCase")
        ));
        w.line(&format!("type Variant = {self_type};"));
        w.line(&format!("const VARIANT_INDEX: u32 = {tag};"));
        w.close("");
        w.blank();
        w.open(&format!(
            "impl{g} ::core::convert::From<{case_name}{g}> for {self_type}"
        ));
        w.open(&format!("fn from(case: {case_name}{g}) -> Self"));
        w.line(&format!("{name}::{}(case)", ident(&case.name)));
        w.close("");
        w.close("");
        w.blank();
    }

    w.line(&format!("/// Variant `{}`.", decl.name));
    w.line("#[derive(Debug, Clone, PartialEq, Eq, Hash)]");
    w.open(&format!("pub enum {self_type}"));
    for case in cases {
        w.line(&format!(
            "{}({}{g}),",
            ident(&case.name),
            names::case_struct(&decl.name.name, &case.name)
        ));
    }
    w.close("");
    w.blank();
    w.open(&format!("impl{g} {self_type}"));
    w.line("/// Wire tag of the held case.");
    w.open("pub fn variant_index(&self) -> u32");
    w.open("match self");
    for (case, tag) in cases.iter().zip(&tags) {
        w.line(&format!("{name}::{}(_) => {tag},", ident(&case.name)));
    }
    w.close("");
    w.close("");
    w.close("");
    w.blank();

    // One generation unit per method: every case shares the name source.
    let mut names_ser = FreshNames::new();
    let resolved: Vec<ResolvedFields> = cases
        .iter()
        .map(|c| {
            ResolvedFields::resolve(
                c.fields.iter().map(|f| &f.ty),
                Direction::Serialize,
                &mut names_ser,
            )
        })
        .collect();
    open_serialize(w, types, &decl.type_parameters, &self_type);
    let lambdas: Vec<&LambdaRef> = resolved.iter().flat_map(|r| r.lambdas()).collect();
    types.emit_lambdas(w, &lambdas)?;
    scopes.begin(w, &decl.name.name);
    w.open("match value");
    for ((case, tag), r) in cases.iter().zip(&tags).zip(&resolved) {
        w.open(&format!("{name}::{}(case) =>", ident(&case.name)));
        w.line(&format!("ctx.write_variant_index({tag})?;"));
        scopes.begin(w, &case.name);
        emit_field_writes(w, types, scopes, &case.fields, &r.refs, "case")?;
        scopes.end(w, &case.name);
        w.close("");
    }
    w.close("");
    scopes.end(w, &decl.name.name);
    w.line("Ok(())");
    w.close("");
    w.blank();

    let mut names_de = FreshNames::new();
    let resolved: Vec<ResolvedFields> = cases
        .iter()
        .map(|c| {
            ResolvedFields::resolve(
                c.fields.iter().map(|f| &f.ty),
                Direction::Deserialize,
                &mut names_de,
            )
        })
        .collect();
    open_deserialize(w, types, &decl.type_parameters, &self_type);
    let lambdas: Vec<&LambdaRef> = resolved.iter().flat_map(|r| r.lambdas()).collect();
    types.emit_lambdas(w, &lambdas)?;
    scopes.begin(w, &decl.name.name);
    w.line("let index = ctx.read_variant_index()?;");
    w.open("let value = match index");
    for ((case, tag), r) in cases.iter().zip(&tags).zip(&resolved) {
        w.open(&format!("{tag} =>"));
        scopes.begin(w, &case.name);
        emit_field_reads(w, types, scopes, &case.fields, &r.refs)?;
        scopes.end(w, &case.name);
        w.line(&format!(
            "{name}::{}({}::new({}))",
            ident(&case.name),
            names::case_struct(&decl.name.name, &case.name),
            constructor_args(&case.fields)
        ));
        w.close("");
    }
    w.open("_ =>");
    w.open(&format!(
        "return Err({}",
        types.rt("WireError::UnrecognizedVariantIndex")
    ));
    w.line(&format!("type_name: {:?}.to_string(),", decl.name.to_string()));
    w.line("index,");
    w.line(&format!("cases: {},", cases.len()));
    w.close(");");
    w.close("");
    w.close(";");
    scopes.end(w, &decl.name.name);
    w.line("Ok(value)");
    w.close("");
    Ok(())
}

fn emit_capabilities(
    w: &mut SourceWriter,
    types: &RustTypes<'_>,
    decl: &TypeDeclaration,
) -> Result<(), GenerateError> {
    let g = generics(&decl.type_parameters);
    let self_type = format!("{}{g}", ident(&decl.name.name));
    for cap in &decl.capabilities {
        let path = match cap {
            Capability::ProtocolMessage { protocol } => format!(
                "{}::{}",
                types.package_path(&protocol.package),
                names::protocol_marker_trait(&protocol.name)
            ),
            Capability::ProtocolVersionMessage { protocol, version } => format!(
                "{}::{}::{}",
                types.package_path(&protocol.package),
                names::protocol_version_module(&protocol.name, *version),
                names::protocol_version_trait(&protocol.name, *version)
            ),
            Capability::VariantCase { .. } => {
                return Err(GenerateError::invariant(format!(
                    "{}: variant-case capability on a declaration",
                    decl.name
                )))
            }
        };
        w.line(&format!("impl{g} {path} for {self_type} {{}}"));
    }
    if !decl.capabilities.is_empty() {
        w.blank();
    }
    Ok(())
}

fn emit_factory(w: &mut SourceWriter, types: &RustTypes<'_>, decl: &TypeDeclaration) {
    let name = ident(&decl.name.name);
    let qualified = decl.name.to_string();
    let kind = match decl.kind {
        DeclarationKind::Variant { .. } => "Variant",
        _ => "Record",
    };
    let generic = !decl.type_parameters.is_empty();
    if !generic {
        w.open(&format!(
            "fn serialize_erased(ctx: &mut dyn {}, value: &dyn ::core::any::Any) -> {}<()>",
            types.rt("SerializeContext"),
            types.rt("Result")
        ));
        w.open(&format!("match value.downcast_ref::<{name}>()"));
        w.line("::core::option::Option::Some(value) => serialize(ctx, value),");
        w.open(&format!(
            "::core::option::Option::None => Err({}",
            types.rt("WireError::TypeMismatch")
        ));
        w.line(&format!("expected: {qualified:?}.to_string(),"));
        w.close("),");
        w.close("");
        w.close("");
        w.blank();
        w.open(&format!(
            "fn deserialize_erased(ctx: &mut dyn {}) -> {}<::std::boxed::Box<dyn ::core::any::Any>>",
            types.rt("DeserializeContext"),
            types.rt("Result")
        ));
        w.line("Ok(::std::boxed::Box::new(deserialize(ctx)?))");
        w.close("");
        w.blank();
    }
    let params: Vec<String> = decl
        .type_parameters
        .iter()
        .map(|p| format!("{:?}", p.name))
        .collect();
    w.line(&format!("/// Codec factory for `{qualified}`."));
    w.line(&format!(
        "pub const FACTORY: {} = {}(",
        types.rt("CodecFactory"),
        types.rt("CodecFactory::new")
    ));
    w.indented();
    w.line(&format!("{qualified:?},"));
    w.line(&format!("{},", types.rt(&format!("TypeKind::{kind}"))));
    w.line(&format!("&[{}],", params.join(", ")));
    if generic {
        w.line("::core::option::Option::None,");
    } else {
        w.open(&format!(
            "::core::option::Option::Some({}",
            types.rt("ErasedCodec")
        ));
        w.line("serialize: serialize_erased,");
        w.line("deserialize: deserialize_erased,");
        w.close("),");
    }
    w.dedented();
    w.line(");");
}

/// Module for one non-external declaration: data shape, codec pair,
/// capability impls and (optionally) its codec factory.
pub fn emit_type_module(
    model: &Model,
    decl: &TypeDeclaration,
    options: &GenerateOptions,
) -> Result<String, GenerateError> {
    let types = RustTypes::new(model, options);
    let scopes = Scopes(options.emit_scopes);
    let mut w = SourceWriter::new();

    match &decl.kind {
        DeclarationKind::Record { fields } => {
            for f in fields {
                check_parameters(decl, &f.ty)?;
            }
            w.header(&format!("Record `{}`.", decl.name));
            emit_record(&mut w, &types, &scopes, decl, fields)?;
        }
        DeclarationKind::Variant { cases } => {
            for f in cases.iter().flat_map(|c| &c.fields) {
                check_parameters(decl, &f.ty)?;
            }
            w.header(&format!("Variant `{}`.", decl.name));
            emit_variant(&mut w, &types, &scopes, decl, cases)?;
        }
        DeclarationKind::External => {
            return Err(GenerateError::invariant(format!(
                "{}: external declarations have no generated module",
                decl.name
            )));
        }
    }
    w.blank();
    emit_capabilities(&mut w, &types, decl)?;
    if options.emit_registry {
        emit_factory(&mut w, &types, decl);
    }
    Ok(w.finish())
}

fn type_exports(decl: &TypeDeclaration) -> Vec<String> {
    let mut out = vec![ident(&decl.name.name)];
    if let DeclarationKind::Variant { cases } = &decl.kind {
        for c in cases {
            out.push(names::case_struct(&decl.name.name, &c.name));
        }
    }
    out
}

/// Package module: submodules, re-exports, protocol markers and ids, and
/// the package registries.
pub fn emit_package_module(
    model: &Model,
    package: &Package,
    options: &GenerateOptions,
) -> Result<String, GenerateError> {
    let types = RustTypes::new(model, options);
    let mut w = SourceWriter::new();
    w.header(&format!("Package `{}`.", package.name));

    let has_adapters = package.types.iter().any(|t| {
        t.is_external() && Builtin::from_name(&t.name).is_none()
    });
    if has_adapters {
        w.line("/// Hand-written codecs for this package's external types.");
        w.line("pub mod adapters;");
    }
    for decl in package.generated_types() {
        w.line(&format!("pub mod {};", names::type_module(&decl.name.name)));
    }
    for protocol in &package.protocols {
        for version in &protocol.versions {
            w.line(&format!(
                "pub mod {};",
                names::protocol_version_module(&protocol.name.name, version.version)
            ));
        }
    }
    w.blank();

    for decl in package.generated_types() {
        let exports = type_exports(decl);
        let module = names::type_module(&decl.name.name);
        if exports.len() == 1 {
            w.line(&format!("pub use {module}::{};", exports[0]));
        } else {
            w.line(&format!("pub use {module}::{{{}}};", exports.join(", ")));
        }
    }
    for protocol in &package.protocols {
        for version in &protocol.versions {
            w.line(&format!(
                "pub use {}::{{{}, {}}};",
                names::protocol_version_module(&protocol.name.name, version.version),
                names::protocol_version_enum(&protocol.name.name, version.version),
                names::protocol_version_trait(&protocol.name.name, version.version),
            ));
        }
    }
    w.blank();

    for protocol in &package.protocols {
        w.line(&format!(
            "/// Implemented by the messages of every version of `{}`.",
            protocol.name
        ));
        w.line(&format!(
            "pub trait {} {{}}",
            names::protocol_marker_trait(&protocol.name.name)
        ));
        w.blank();
        w.line(&format!("/// Protocol id of `{}` ({}).", protocol.name, protocol.id));
        w.line(&format!(
            "pub const {}: {} = {}(0x{:032x});",
            names::protocol_id_const(&protocol.name.name),
            types.rt("uuid::Uuid"),
            types.rt("uuid::Uuid::from_u128"),
            protocol.id.as_u128()
        ));
        w.blank();
    }

    if options.emit_registry {
        let factories: Vec<String> = package
            .generated_types()
            .map(|d| format!("{}::FACTORY", names::type_module(&d.name.name)))
            .collect();
        w.line("/// Codec factories of every generated type in this package.");
        w.line(&format!(
            "pub static REGISTRY: {} = {}({:?}, &[{}]);",
            types.rt("CodecRegistry"),
            types.rt("CodecRegistry::new"),
            package.name,
            factories.join(", ")
        ));
        w.blank();
        let versions: Vec<String> = package
            .protocols
            .iter()
            .flat_map(|p| {
                p.versions.iter().map(|v| {
                    format!(
                        "{}::FACTORY",
                        names::protocol_version_module(&p.name.name, v.version)
                    )
                })
            })
            .collect();
        w.line("/// Dispatcher factories of every protocol version in this package.");
        w.line(&format!(
            "pub const PROTOCOL_FACTORIES: &[{}] = &[{}];",
            types.rt("ProtocolFactory"),
            versions.join(", ")
        ));
    }
    Ok(w.finish())
}

pub fn emit_root_module(model: &Model, options: &GenerateOptions) -> String {
    let runtime = options.runtime_path.as_str();
    let mut w = SourceWriter::new();
    w.header("Generated Cedarbridge packages.");
    for p in model.packages() {
        w.line(&format!("pub mod {};", names::package_module(&p.name)));
    }
    if options.emit_registry {
        w.blank();
        let registries: Vec<String> = model
            .packages()
            .iter()
            .map(|p| format!("&{}::REGISTRY", names::package_module(&p.name)))
            .collect();
        w.line("/// Pass to `CodecRegistries::new` for lookup by qualified name.");
        w.line(&format!(
            "pub static CODEC_REGISTRIES: &[&{runtime}::CodecRegistry] = &[{}];",
            registries.join(", ")
        ));
        w.blank();
        let protocols: Vec<String> = model
            .packages()
            .iter()
            .map(|p| format!("{}::PROTOCOL_FACTORIES", names::package_module(&p.name)))
            .collect();
        w.line("/// Pass to `ProtocolRegistry::new` for lookup by protocol id and version.");
        w.line(&format!(
            "pub static PROTOCOL_FACTORIES: &[&[{runtime}::ProtocolFactory]] = &[{}];",
            protocols.join(", ")
        ));
    }
    w.finish()
}
