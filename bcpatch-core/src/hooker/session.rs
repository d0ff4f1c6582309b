//! Per-run hook state.
//!
//! Everything the hook engine remembers between calls lives in a
//! [`PatchSession`]. The orchestrator creates one per run and drops it at the
//! end, so nothing leaks from one run into the next.

use std::collections::{BTreeMap, HashMap};

use crate::extension::ExtensionIdAllocator;
use crate::image::BytecodeImage;

/// Prefix of every name generated by the hook engine.
///
/// Units carrying it are skipped by the redirect pass.
pub const SYNTHETIC_PREFIX: &str = "__hook_";

/// Whether `name` was generated by the hook engine.
pub fn is_synthetic(name: &str) -> bool {
    name.starts_with(SYNTHETIC_PREFIX)
}

/// State shared by every hook applied during one run.
#[derive(Debug, Default)]
pub struct PatchSession {
    pub hooks: HookRegistry,
    pub redirects: RedirectTable,
    pub names: SyntheticNames,
    pub ids: ExtensionIdAllocator,
}

impl PatchSession {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Preserved bodies of every hooked code unit.
///
/// Each entry is a chain of preserved unit names, oldest first. The first
/// entry holds the true original body, the last one the body replaced by the
/// most recent hook.
#[derive(Debug, Default)]
pub struct HookRegistry {
    chains: HashMap<String, Vec<String>>,
}

impl HookRegistry {
    pub(crate) fn record(&mut self, name: &str, preserved: String) {
        self.chains.entry(name.to_string()).or_default().push(preserved);
    }

    pub fn is_hooked(&self, name: &str) -> bool {
        self.chains.contains_key(name)
    }

    /// Unit holding the true original body of `name`.
    pub fn original(&self, name: &str) -> Option<&str> {
        self.chains.get(name)?.first().map(String::as_str)
    }

    /// Unit holding the body replaced by the latest hook of `name`.
    pub fn latest(&self, name: &str) -> Option<&str> {
        self.chains.get(name)?.last().map(String::as_str)
    }

    /// Number of hooks applied to `name`.
    pub fn depth(&self, name: &str) -> usize {
        self.chains.get(name).map_or(0, Vec::len)
    }

    /// Preserved units of `name`, oldest first.
    pub fn chain(&self, name: &str) -> &[String] {
        self.chains.get(name).map_or(&[], Vec::as_slice)
    }
}

/// Replacement recorded by a hard hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Unit that call sites should reach instead
    pub replacement: String,
    /// Arity of the calls to rewrite
    pub argc: u16,
}

/// Call-site redirections waiting for the finalization pass.
///
/// Ordered by function name so the pass is deterministic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RedirectTable {
    entries: BTreeMap<String, Redirect>,
}

impl RedirectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a redirect, returning the one it replaces.
    pub fn insert(&mut self, function: impl Into<String>, redirect: Redirect) -> Option<Redirect> {
        self.entries.insert(function.into(), redirect)
    }

    pub fn get(&self, function: &str) -> Option<&Redirect> {
        self.entries.get(function)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Redirect)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move every pending redirect out, leaving the table empty.
    pub fn take(&mut self) -> RedirectTable {
        std::mem::take(self)
    }
}

/// Generator of deterministic names for cloned and generated units.
///
/// Names look like `__hook_<base>_<role>_<n>`; the counter is shared by all
/// roles and skips any name the image already uses.
#[derive(Debug, Default)]
pub struct SyntheticNames {
    counter: u32,
}

impl SyntheticNames {
    pub fn next(&mut self, image: &BytecodeImage, base: &str, role: &str) -> String {
        loop {
            self.counter += 1;
            let name = format!("{}{}_{}_{}", SYNTHETIC_PREFIX, base, role, self.counter);
            if !image.contains_name(&name) {
                return name;
            }
        }
    }
}
