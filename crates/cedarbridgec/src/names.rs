//! Identifier helpers for generated Rust.

/// Fresh-name source for one generation unit. Each emitted codec function
/// owns its own instance.
#[derive(Debug, Default)]
pub struct FreshNames {
    next: u32,
}

impl FreshNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self, prefix: &str) -> String {
        let n = self.next;
        self.next += 1;
        format!("{prefix}_{n}")
    }
}

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub",
    "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true", "try",
    "type", "typeof", "union", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

/// Raw-identifier escape for keywords (`type` -> `r#type`).
pub fn ident(s: &str) -> String {
    if is_keyword(s) {
        format!("r#{s}")
    } else {
        s.to_string()
    }
}

/// `MapEntry` -> `map_entry`, `HTTPServer` -> `http_server`, `UUID` -> `uuid`.
pub fn snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (idx, &c) in chars.iter().enumerate() {
        if c == '-' || c == '.' || c == ' ' {
            if !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev = idx.checked_sub(1).map(|i| chars[i]);
            let next = chars.get(idx + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn shouty_snake_case(s: &str) -> String {
    snake_case(s).to_uppercase()
}

/// `demo.chat` -> `demo_chat`.
pub fn package_module(package: &str) -> String {
    ident(&snake_case(package))
}

/// Module (and file stem) holding one generated type.
pub fn type_module(type_name: &str) -> String {
    ident(&snake_case(type_name))
}

/// File name for a module identifier; raw identifiers drop the `r#`.
pub fn module_file(module: &str) -> String {
    format!("{}.rs", module.trim_start_matches("r#"))
}

pub fn module_dir(module: &str) -> String {
    module.trim_start_matches("r#").to_string()
}

/// Struct generated for one variant case: `Option` + `Some` -> `OptionSome`.
pub fn case_struct(variant: &str, case: &str) -> String {
    format!("{variant}{case}")
}

pub fn protocol_version_module(protocol: &str, version: u64) -> String {
    format!("protocol_{}_v{version}", snake_case(protocol))
}

/// Closed message enum of one protocol version: `Echo` v1 -> `EchoV1`.
pub fn protocol_version_enum(protocol: &str, version: u64) -> String {
    format!("{protocol}V{version}")
}

pub fn protocol_marker_trait(protocol: &str) -> String {
    format!("{protocol}Message")
}

pub fn protocol_version_trait(protocol: &str, version: u64) -> String {
    format!("{protocol}V{version}Message")
}

pub fn protocol_id_const(protocol: &str) -> String {
    format!("{}_PROTOCOL_ID", shouty_snake_case(protocol))
}

pub fn serialize_param(parameter: &str) -> String {
    format!("serialize_{}", snake_case(parameter))
}

pub fn deserialize_param(parameter: &str) -> String {
    format!("deserialize_{}", snake_case(parameter))
}
