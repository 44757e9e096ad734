/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Engine configuration.
//!
//! The module keeps one global, read-mostly [`SearchConfig`]. Pipelines take
//! a snapshot at construction time and never re-read it mid-flight, except
//! for the timeout policy which is resolved at policy decision points.

use std::str::FromStr;
use std::sync::OnceLock;

use parking_lot::RwLock;
use strum::{Display, EnumString};

/// What to do when a query hits its deadline.
#[derive(Clone, Copy, Debug, Default, Display, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum TimeoutPolicy {
    /// Return the results accumulated so far.
    Return,
    /// Fail the whole query; the caller sees no results.
    Fail,
    /// Defer to the global configuration at pipeline construction.
    #[default]
    Default,
}

impl TimeoutPolicy {
    /// Resolve the `Default` placeholder against a configuration snapshot.
    /// The resolved policy is never `Default`.
    pub fn resolve(self, config: &SearchConfig) -> Self {
        match self {
            Self::Default => config.timeout_policy.resolve_against_baseline(),
            other => other,
        }
    }

    fn resolve_against_baseline(self) -> Self {
        match self {
            // a config that itself says "default" means the built-in baseline
            Self::Default => Self::Return,
            other => other,
        }
    }

    /// Parse a policy from user input. Returns `None` for unknown values
    /// ("default" is not accepted from users, only `return` and `fail`).
    pub fn parse(s: &str) -> Option<Self> {
        match Self::from_str(&s.to_ascii_lowercase()) {
            Ok(Self::Default) | Err(_) => None,
            Ok(policy) => Some(policy),
        }
    }
}

/// Global configuration options consumed by the query pipeline.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Run pipelines on the worker pool. Disabled under safe mode, in which
    /// case queries run on the caller thread. Immutable after start.
    pub concurrent_mode: bool,
    /// The maximal amount of time a single query can take before timing
    /// out, in milliseconds. 0 means unlimited.
    pub query_timeout_ms: u64,
    pub timeout_policy: TimeoutPolicy,
    /// Hard cap on the sorter's top-K.
    pub max_search_results: usize,
    /// Above this requested result count the sorter stops maintaining a
    /// bounded heap and grows dynamically instead.
    pub max_results_to_unsorted_mode: usize,
    /// Worker pool bound.
    pub search_pool_size: usize,
    /// Disables the pooled-record reuse in the sorter.
    pub no_mem_pool: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            concurrent_mode: true,
            query_timeout_ms: 500,
            timeout_policy: TimeoutPolicy::Return,
            max_search_results: 1_000_000,
            max_results_to_unsorted_mode: 1_000,
            search_pool_size: 20,
            no_mem_pool: false,
        }
    }
}

fn global_store() -> &'static RwLock<SearchConfig> {
    static GLOBAL: OnceLock<RwLock<SearchConfig>> = OnceLock::new();
    GLOBAL.get_or_init(|| RwLock::new(SearchConfig::default()))
}

impl SearchConfig {
    /// Snapshot of the global configuration.
    pub fn global() -> Self {
        global_store().read().clone()
    }

    /// Replace the global configuration. Meant for startup and tests.
    pub fn set_global(config: Self) {
        *global_store().write() = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("return", Some(TimeoutPolicy::Return))]
    #[case("RETURN", Some(TimeoutPolicy::Return))]
    #[case("fail", Some(TimeoutPolicy::Fail))]
    #[case("default", None)]
    #[case("bogus", None)]
    fn parse_policy(#[case] input: &str, #[case] expected: Option<TimeoutPolicy>) {
        assert_eq!(TimeoutPolicy::parse(input), expected);
    }

    #[test]
    fn policy_display_round_trips() {
        assert_eq!(TimeoutPolicy::Return.to_string(), "return");
        assert_eq!(TimeoutPolicy::Fail.to_string(), "fail");
        assert_eq!(
            TimeoutPolicy::parse(&TimeoutPolicy::Fail.to_string()),
            Some(TimeoutPolicy::Fail)
        );
    }

    #[test]
    fn default_resolves_against_config() {
        let mut config = SearchConfig::default();
        config.timeout_policy = TimeoutPolicy::Fail;
        assert_eq!(
            TimeoutPolicy::Default.resolve(&config),
            TimeoutPolicy::Fail
        );
        assert_eq!(TimeoutPolicy::Fail.resolve(&config), TimeoutPolicy::Fail);

        // a config left at "default" falls back to the baseline
        config.timeout_policy = TimeoutPolicy::Default;
        assert_eq!(
            TimeoutPolicy::Default.resolve(&config),
            TimeoutPolicy::Return
        );
    }
}
