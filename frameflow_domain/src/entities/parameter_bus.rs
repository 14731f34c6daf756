// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Parameter Bus
//!
//! Process-wide map of named scalar values flowing between steps. A name is
//! introduced (bound to `Null`) the first time any step declares it; step
//! returns overwrite values; downstream steps read them during parameter
//! resolution. `Null` means "not yet produced" and never satisfies a
//! required parameter.
//!
//! The bus is cleared only by an explicit reset. Across chunk passes it
//! survives solely through the chunk coordinator's snapshot, which restores
//! the pre-chunking state at the start of every pass after the first.

use crate::value_objects::ParamValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Named scalar store populated by step returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterBus {
    values: IndexMap<String, ParamValue>,
}

impl ParameterBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Introduces a name, binding it to `Null` unless already present.
    pub fn introduce(&mut self, name: impl Into<String>) {
        self.values.entry(name.into()).or_insert(ParamValue::Null);
    }

    /// Sets a value, overwriting any previous binding.
    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    /// Gets a value by name. Absent and `Null` are distinct: absent means
    /// the name was never declared by any step.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Gets a value by name, treating `Null` as absent.
    ///
    /// This is the read the resolution precedence chain uses: a `Null`
    /// binding must fall through to the next source.
    pub fn get_non_null(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    /// True when `name` has been introduced
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Declared names in introduction order.
    pub fn names(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    /// Iterates bindings in introduction order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of introduced names
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no names have been introduced
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Clears every binding. The explicit pipeline reset path.
    pub fn reset(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_introduce_is_idempotent() {
        let mut bus = ParameterBus::new();
        bus.introduce("x");
        bus.set("x", json!(42));
        bus.introduce("x");
        assert_eq!(bus.get("x"), Some(&json!(42)));
    }

    #[test]
    fn test_null_means_not_yet_produced() {
        let mut bus = ParameterBus::new();
        bus.introduce("x");
        assert_eq!(bus.get("x"), Some(&ParamValue::Null));
        assert!(bus.get_non_null("x").is_none());

        bus.set("x", json!(1));
        assert_eq!(bus.get_non_null("x"), Some(&json!(1)));
    }

    #[test]
    fn test_names_in_introduction_order() {
        let mut bus = ParameterBus::new();
        bus.introduce("z");
        bus.introduce("a");
        bus.introduce("m");
        assert_eq!(bus.names(), vec!["z", "a", "m"]);
    }

    #[test]
    fn test_reset_clears_all() {
        let mut bus = ParameterBus::new();
        bus.set("x", json!(1));
        bus.reset();
        assert!(bus.is_empty());
        assert!(!bus.contains("x"));
    }
}
