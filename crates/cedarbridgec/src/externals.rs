//! External types of the core package and the runtime adapters serving them.

use cedarbridge_contracts::CORE_PACKAGE_NAME;

use crate::model::QualifiedName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F16,
    F32,
    F64,
    String,
    ByteArray,
    Uuid,
    List,
}

impl Builtin {
    pub const ALL: [Builtin; 15] = [
        Builtin::U8,
        Builtin::U16,
        Builtin::U32,
        Builtin::U64,
        Builtin::I8,
        Builtin::I16,
        Builtin::I32,
        Builtin::I64,
        Builtin::F16,
        Builtin::F32,
        Builtin::F64,
        Builtin::String,
        Builtin::ByteArray,
        Builtin::Uuid,
        Builtin::List,
    ];

    /// Declared name in the core package.
    pub fn core_name(self) -> &'static str {
        match self {
            Builtin::U8 => "IntegerUnsigned8",
            Builtin::U16 => "IntegerUnsigned16",
            Builtin::U32 => "IntegerUnsigned32",
            Builtin::U64 => "IntegerUnsigned64",
            Builtin::I8 => "IntegerSigned8",
            Builtin::I16 => "IntegerSigned16",
            Builtin::I32 => "IntegerSigned32",
            Builtin::I64 => "IntegerSigned64",
            Builtin::F16 => "Float16",
            Builtin::F32 => "Float32",
            Builtin::F64 => "Float64",
            Builtin::String => "String",
            Builtin::ByteArray => "ByteArray",
            Builtin::Uuid => "UUID",
            Builtin::List => "List",
        }
    }

    pub fn type_parameters(self) -> &'static [&'static str] {
        match self {
            Builtin::List => &["A"],
            _ => &[],
        }
    }

    pub fn from_name(name: &QualifiedName) -> Option<Self> {
        if name.package != CORE_PACKAGE_NAME {
            return None;
        }
        Self::ALL.into_iter().find(|b| b.core_name() == name.name)
    }

    fn adapter_suffix(self) -> &'static str {
        match self {
            Builtin::U8 => "u8",
            Builtin::U16 => "u16",
            Builtin::U32 => "u32",
            Builtin::U64 => "u64",
            Builtin::I8 => "i8",
            Builtin::I16 => "i16",
            Builtin::I32 => "i32",
            Builtin::I64 => "i64",
            Builtin::F16 => "f16",
            Builtin::F32 => "f32",
            Builtin::F64 => "f64",
            Builtin::String => "string",
            Builtin::ByteArray => "byte_array",
            Builtin::Uuid => "uuid",
            Builtin::List => "list",
        }
    }

    /// Rust type for this external, given rendered type arguments.
    pub fn rust_type(self, runtime: &str, arguments: &[String]) -> String {
        match self {
            Builtin::U8 | Builtin::U16 | Builtin::U32 | Builtin::U64 => {
                self.adapter_suffix().to_string()
            }
            Builtin::I8 | Builtin::I16 | Builtin::I32 | Builtin::I64 => {
                self.adapter_suffix().to_string()
            }
            Builtin::F16 => format!("{runtime}::Float16"),
            Builtin::F32 => format!("{runtime}::Float32"),
            Builtin::F64 => format!("{runtime}::Float64"),
            Builtin::String => "::std::string::String".to_string(),
            Builtin::ByteArray => format!("{runtime}::bytes::Bytes"),
            Builtin::Uuid => format!("{runtime}::uuid::Uuid"),
            Builtin::List => format!("::std::vec::Vec<{}>", arguments.join(", ")),
        }
    }

    pub fn serialize_fn(self, runtime: &str) -> String {
        format!("{runtime}::builtins::serialize_{}", self.adapter_suffix())
    }

    pub fn deserialize_fn(self, runtime: &str) -> String {
        format!("{runtime}::builtins::deserialize_{}", self.adapter_suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_round_trips_through_its_core_name() {
        for b in Builtin::ALL {
            let name = QualifiedName::new(CORE_PACKAGE_NAME, b.core_name());
            assert_eq!(Builtin::from_name(&name), Some(b));
        }
        assert_eq!(
            Builtin::from_name(&QualifiedName::new("demo", "String")),
            None
        );
    }

    #[test]
    fn list_renders_as_vec() {
        let rt = "::cedarbridge_runtime";
        assert_eq!(
            Builtin::List.rust_type(rt, &["u8".to_string()]),
            "::std::vec::Vec<u8>"
        );
        assert_eq!(
            Builtin::List.serialize_fn(rt),
            "::cedarbridge_runtime::builtins::serialize_list"
        );
    }
}
