//! The `cedarbridge.core` package every model implicitly depends on.

use cedarbridge_contracts::CORE_PACKAGE_NAME;

use crate::externals::Builtin;
use crate::model::{Case, Field, Package, QualifiedName, TypeDeclaration, TypeExpression};

fn core(name: &str) -> QualifiedName {
    QualifiedName::new(CORE_PACKAGE_NAME, name)
}

pub fn core_package() -> Package {
    let mut package = Package::new(CORE_PACKAGE_NAME);
    for b in Builtin::ALL {
        package
            .types
            .push(TypeDeclaration::external(core(b.core_name()), b.type_parameters()));
    }

    package.types.push(TypeDeclaration::variant(
        core("Option"),
        &["A"],
        vec![
            Case::new("None", Vec::new()),
            Case::new("Some", vec![Field::new("value", TypeExpression::parameter("A"))]),
        ],
    ));
    package.types.push(TypeDeclaration::record(
        core("MapEntry"),
        &["K", "V"],
        vec![
            Field::new("key", TypeExpression::parameter("K")),
            Field::new("value", TypeExpression::parameter("V")),
        ],
    ));
    package.types.push(TypeDeclaration::record(
        core("Map"),
        &["K", "V"],
        vec![Field::new(
            "entries",
            TypeExpression::application(
                core("List"),
                vec![TypeExpression::application(
                    core("MapEntry"),
                    vec![TypeExpression::parameter("K"), TypeExpression::parameter("V")],
                )],
            ),
        )],
    ));
    package
}
