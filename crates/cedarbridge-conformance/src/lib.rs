//! The fixture model (`tests/cedarbridge/chat_model.json`) run through
//! `cedarbridgec` at build time and compiled against `cedarbridge-runtime`.
//!
//! Everything lives under [`generated`], laid out exactly like a
//! `cedarbridge generate --write` tree.
#![forbid(unsafe_code)]

include!(concat!(env!("OUT_DIR"), "/generated.rs"));
