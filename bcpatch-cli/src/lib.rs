//! Command handlers for the `bcpatch` binary.

pub mod commands;
