//! Serializer reference resolution.
//!
//! For a field type, [`resolve`] describes how generated code obtains its
//! serializer or deserializer:
//!
//! - a type parameter uses the codec passed in by the caller,
//! - a named type calls its generated (or adapter) codec directly,
//! - a generic instantiation needs a synthesized closure that calls the
//!   target's generic codec with codecs for each type argument.
//!
//! Closures can call other closures, so [`declaration_order`] flattens a
//! reference tree into an order where every closure comes after the ones it
//! calls.

use crate::model::{QualifiedName, TypeExpression};
use crate::names::FreshNames;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Serialize,
    Deserialize,
}

/// Interface a synthesized closure implements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionType {
    Serializer(TypeExpression),
    Deserializer(TypeExpression),
}

impl FunctionType {
    pub fn direction(&self) -> Direction {
        match self {
            FunctionType::Serializer(_) => Direction::Serialize,
            FunctionType::Deserializer(_) => Direction::Deserialize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaRef {
    pub app_type: TypeExpression,
    pub fn_type: FunctionType,
    pub lambda_name: String,
    pub context_param_name: String,
    pub value_param_name: String,
    pub target: QualifiedName,
    pub arg_refs: Vec<MethodRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodRef {
    /// Codec bound in scope for a type parameter.
    Parameter(String),
    /// Statically generated codec of a named type.
    Named(QualifiedName),
    Lambda(LambdaRef),
}

pub fn resolve(ty: &TypeExpression, direction: Direction, names: &mut FreshNames) -> MethodRef {
    match ty {
        TypeExpression::Parameter(p) => MethodRef::Parameter(p.clone()),
        TypeExpression::Named(q) => MethodRef::Named(q.clone()),
        TypeExpression::Application { target, arguments } => {
            let lambda_name = names.fresh("lambda");
            let context_param_name = names.fresh("ctx");
            let value_param_name = names.fresh("value");
            let arg_refs = arguments
                .iter()
                .map(|a| resolve(a, direction, names))
                .collect();
            let fn_type = match direction {
                Direction::Serialize => FunctionType::Serializer(ty.clone()),
                Direction::Deserialize => FunctionType::Deserializer(ty.clone()),
            };
            MethodRef::Lambda(LambdaRef {
                app_type: ty.clone(),
                fn_type,
                lambda_name,
                context_param_name,
                value_param_name,
                target: target.clone(),
                arg_refs,
            })
        }
    }
}

/// Lambdas reachable from `root`, dependencies first.
pub fn declaration_order(root: &MethodRef) -> Vec<&LambdaRef> {
    let mut stack: Vec<&LambdaRef> = Vec::new();
    push_lambdas(root, &mut stack);
    let mut out = Vec::with_capacity(stack.len());
    while let Some(l) = stack.pop() {
        out.push(l);
    }
    out
}

fn push_lambdas<'a>(r: &'a MethodRef, stack: &mut Vec<&'a LambdaRef>) {
    if let MethodRef::Lambda(l) = r {
        stack.push(l);
        for a in &l.arg_refs {
            push_lambdas(a, stack);
        }
    }
}

/// Field references of one generation unit, resolved with a shared name
/// source, plus every lambda they need in emission order.
#[derive(Debug, Clone)]
pub struct ResolvedFields {
    pub refs: Vec<MethodRef>,
}

impl ResolvedFields {
    pub fn resolve<'a>(
        types: impl IntoIterator<Item = &'a TypeExpression>,
        direction: Direction,
        names: &mut FreshNames,
    ) -> Self {
        Self {
            refs: types
                .into_iter()
                .map(|t| resolve(t, direction, names))
                .collect(),
        }
    }

    pub fn lambdas(&self) -> Vec<&LambdaRef> {
        self.refs.iter().flat_map(declaration_order).collect()
    }
}
