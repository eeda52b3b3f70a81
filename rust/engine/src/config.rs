// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine configuration loaded from environment variables.

use bimkit_core::{DuplicateGlobalIdPolicy, GraphOptions, ParseOptions};
use bimkit_geometry::RouterOptions;
use bimkit_spatial::DEFAULT_NODE_CAPACITY;
use std::str::FromStr;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Maximum list nesting inside one instance.
    pub max_nesting_depth: usize,
    /// Children per R-tree node.
    pub rtree_node_capacity: usize,
    /// Extract element geometry on the rayon pool.
    pub parallel_geometry: bool,
    /// Policy for elements sharing a GlobalId.
    pub duplicate_global_ids: DuplicateGlobalIdPolicy,
    /// Segments used to approximate circles.
    pub circle_segments: usize,
    /// Tolerate a missing OwnerHistory instead of failing the load.
    pub lenient_owner_history: bool,
    /// Default filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones.
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_nesting_depth: 32,
            rtree_node_capacity: DEFAULT_NODE_CAPACITY,
            parallel_geometry: true,
            duplicate_global_ids: DuplicateGlobalIdPolicy::KeepBoth,
            circle_segments: 24,
            lenient_owner_history: false,
            log_level: "info".into(),
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn read<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
            match lookup(key) {
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    tracing::warn!(key, value = %raw, "ignoring invalid configuration value");
                    default
                }),
                None => default,
            }
        }

        let defaults = Self::default();
        Self {
            max_nesting_depth: read(&lookup, "BIMKIT_MAX_NESTING_DEPTH", defaults.max_nesting_depth),
            rtree_node_capacity: read(&lookup, "BIMKIT_RTREE_NODE_CAPACITY", defaults.rtree_node_capacity),
            parallel_geometry: read(&lookup, "BIMKIT_PARALLEL_GEOMETRY", defaults.parallel_geometry),
            duplicate_global_ids: read(&lookup, "BIMKIT_DUPLICATE_GLOBAL_IDS", defaults.duplicate_global_ids),
            circle_segments: read(&lookup, "BIMKIT_CIRCLE_SEGMENTS", defaults.circle_segments),
            lenient_owner_history: read(&lookup, "BIMKIT_LENIENT_OWNER_HISTORY", defaults.lenient_owner_history),
            log_level: lookup("BIMKIT_LOG_LEVEL")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.log_level),
            log_json: read(&lookup, "BIMKIT_LOG_JSON", defaults.log_json),
        }
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_depth: self.max_nesting_depth,
            ..ParseOptions::default()
        }
    }

    pub fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            duplicate_global_ids: self.duplicate_global_ids,
            lenient_owner_history: self.lenient_owner_history,
        }
    }

    pub fn router_options(&self) -> RouterOptions {
        RouterOptions {
            circle_segments: self.circle_segments.max(3),
            parallel: self.parallel_geometry,
            ..RouterOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config, Config::default());
        assert_eq!(config.rtree_node_capacity, 8);
        assert_eq!(config.parse_options().max_depth, 32);
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = Config::from_lookup(lookup(&[
            ("BIMKIT_RTREE_NODE_CAPACITY", "16"),
            ("BIMKIT_PARALLEL_GEOMETRY", "false"),
            ("BIMKIT_DUPLICATE_GLOBAL_IDS", "keep-first"),
            ("BIMKIT_CIRCLE_SEGMENTS", "many"),
            ("BIMKIT_LOG_JSON", "true"),
            ("BIMKIT_LENIENT_OWNER_HISTORY", "true"),
        ]));
        assert_eq!(config.rtree_node_capacity, 16);
        assert!(!config.router_options().parallel);
        assert_eq!(config.graph_options().duplicate_global_ids, DuplicateGlobalIdPolicy::KeepFirst);
        assert_eq!(config.circle_segments, 24);
        assert!(config.log_json);
        assert!(config.graph_options().lenient_owner_history);
        assert!(!Config::default().graph_options().lenient_owner_history);
    }
}
