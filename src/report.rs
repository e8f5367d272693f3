//! Run comparison and failure reporting.
//!
//! A [`ScaledRun`] snapshots the queries one execution produced at one input
//! scale. The [`Reporter`] turns an ordered sequence of runs into the
//! failure message a test framework prints: matched counts per scale, an
//! optional per-table usage diff between the first two runs, and (in
//! verbose mode) the raw query lists.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::config::Config;

/// Marker separating a query from its source-location annotation block.
pub const TRACE_MARKER: &str = "\n    ↳ ";

/// Bucket for payloads the extraction rule cannot parse.
const UNCLASSIFIED: &str = "unclassified";

/// Recognizes the leading operation verb and target table of a query.
fn table_regex() -> &'static Regex {
    static TABLE_REGEX: OnceLock<Regex> = OnceLock::new();
    TABLE_REGEX.get_or_init(|| {
        Regex::new(
            r#"(?isx)^\s*(?:
                (select)\b.*?\bfrom |
                (insert)\s+into |
                (update) |
                (delete)\s+from
            )\s+["'`\[]?([\w.]+)"#,
        )
        .expect("failed to compile table extraction regex")
    })
}

/// The queries one execution produced at one declared input scale.
#[derive(Debug, Clone)]
pub struct ScaledRun {
    /// Declared size of the input driving this run.
    pub scale: usize,
    /// Accepted payloads per collector key.
    pub data: BTreeMap<String, Vec<String>>,
}

impl ScaledRun {
    /// Create a run snapshot.
    pub fn new(scale: usize, data: BTreeMap<String, Vec<String>>) -> Self {
        Self { scale, data }
    }

    /// Convenience for the common single-collector case.
    pub fn single(scale: usize, key: impl Into<String>, queries: Vec<String>) -> Self {
        let mut data = BTreeMap::new();
        data.insert(key.into(), queries);
        Self { scale, data }
    }

    /// All queries of this run, key order then emission order.
    fn all_queries(&self) -> impl Iterator<Item = &str> {
        self.data.values().flatten().map(String::as_str)
    }
}

/// What the failed assertion expected of the two runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// The query count must not change with scale.
    ConstantQueries,
    /// The query count must not exceed a limit.
    LimitedQueries,
}

impl std::fmt::Display for Expectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConstantQueries => write!(f, "expected to make the same number of queries"),
            Self::LimitedQueries => write!(f, "expected to make no more queries"),
        }
    }
}

/// Renders comparison results into diagnostic text.
#[derive(Debug, Clone)]
pub struct Reporter {
    config: Arc<Config>,
}

impl Reporter {
    /// Create a reporter over the shared configuration.
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Build the failure message for an ordered sequence of runs.
    ///
    /// The table-usage block compares exactly two runs and is only appended
    /// when `show_table_stats` is set and two runs were given; the count
    /// lines and the verbose query listing render for any number of runs.
    pub fn build_failure_message(&self, expectation: Expectation, runs: &[ScaledRun]) -> String {
        let mut lines = vec![format!("{expectation}, but got:")];

        for run in runs {
            for (key, queries) in &run.data {
                lines.push(format!(
                    "  {} queries for N={} ({})",
                    queries.len(),
                    run.scale,
                    key
                ));
            }
        }

        if self.config.show_table_stats {
            if let [before, after] = runs {
                let stats = self.table_usage_stats(before, after);
                if !stats.is_empty() {
                    lines.push(String::new());
                    lines.extend(stats);
                }
            }
        }

        if self.config.verbose {
            for run in runs {
                for (key, queries) in &run.data {
                    lines.push(format!("\nQueries for N={} ({})", run.scale, key));
                    for query in queries {
                        lines.push(format!("  {}", self.truncate_query(query)));
                    }
                }
            }
        }

        lines.join("\n")
    }

    /// Per-table usage diff between two runs.
    ///
    /// Every classification key of `before` whose count differs in `after`
    /// yields a `<key>: <before> != <after>` line; a key absent from `after`
    /// counts as 0. Keys present only in `after` are never inspected; the
    /// comparison is one-sided, from the baseline run forward.
    pub fn table_usage_stats(&self, before: &ScaledRun, after: &ScaledRun) -> Vec<String> {
        let before_stats = table_usage(before);
        let after_stats = table_usage(after);

        let mut lines = Vec::new();
        for (key, before_count) in &before_stats {
            let after_count = after_stats.get(key).copied().unwrap_or(0);
            if *before_count != after_count {
                lines.push(format!("{key}: {before_count} != {after_count}"));
            }
        }

        if !lines.is_empty() {
            lines.insert(
                0,
                "Unmatched query numbers by tables (before and after):".to_string(),
            );
        }
        lines
    }

    /// Shorten a query for display, keeping any trace annotation intact.
    ///
    /// A no-op unless `truncate_query_size` is configured. Only the core
    /// statement is truncated, to `size - 3` characters plus an ellipsis,
    /// or to a bare `"..."` when the limit is below 4.
    pub fn truncate_query(&self, payload: &str) -> String {
        let Some(size) = self.config.truncate_query_size else {
            return payload.to_string();
        };

        let (core, trace) = match payload.split_once(TRACE_MARKER) {
            Some((core, trace)) => (core, Some(trace)),
            None => (payload, None),
        };

        let truncated = truncate_statement(core, size);
        match trace {
            Some(trace) => format!("{truncated}{TRACE_MARKER}{trace}"),
            None => truncated,
        }
    }
}

fn truncate_statement(statement: &str, size: usize) -> String {
    if statement.chars().count() <= size {
        return statement.to_string();
    }
    if size < 4 {
        return "...".to_string();
    }
    let head: String = statement.chars().take(size - 3).collect();
    format!("{head}...")
}

/// Group one run's queries into `"table (operation)" -> count`.
fn table_usage(run: &ScaledRun) -> BTreeMap<String, usize> {
    let mut stats = BTreeMap::new();
    for query in run.all_queries() {
        *stats.entry(classify(query)).or_insert(0) += 1;
    }
    stats
}

/// Classification key for one query payload.
///
/// Unparseable payloads bucket under [`UNCLASSIFIED`] rather than erroring;
/// the reporter runs inside a failure path and must not fail itself.
fn classify(query: &str) -> String {
    // Only the statement itself participates; trace annotations are display
    // metadata.
    let statement = query.split(TRACE_MARKER).next().unwrap_or(query);

    match table_regex().captures(statement) {
        Some(captures) => {
            let verb = [1, 2, 3, 4]
                .into_iter()
                .find_map(|i| captures.get(i))
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_else(|| UNCLASSIFIED.to_string());
            let table = captures.get(5).map_or(UNCLASSIFIED, |m| m.as_str());
            format!("{table} ({verb})")
        }
        None => UNCLASSIFIED.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter(config: Config) -> Reporter {
        Reporter::new(Arc::new(config))
    }

    fn run(scale: usize, queries: &[&str]) -> ScaledRun {
        ScaledRun::single(scale, "db", queries.iter().map(|q| q.to_string()).collect())
    }

    #[test]
    fn test_classify_select() {
        assert_eq!(
            classify("SELECT * FROM items WHERE id = 1"),
            "items (select)"
        );
    }

    #[test]
    fn test_classify_quoted_and_lowercase() {
        assert_eq!(classify("select id from \"users\""), "users (select)");
        assert_eq!(classify("SELECT 1 FROM `orders` LIMIT 1"), "orders (select)");
    }

    #[test]
    fn test_classify_insert_update_delete() {
        assert_eq!(
            classify("INSERT INTO items (name) VALUES ('x')"),
            "items (insert)"
        );
        assert_eq!(classify("UPDATE items SET name = 'x'"), "items (update)");
        assert_eq!(classify("DELETE FROM items WHERE id = 1"), "items (delete)");
    }

    #[test]
    fn test_classify_multiline_select() {
        assert_eq!(
            classify("SELECT id, name\nFROM items\nWHERE id = 1"),
            "items (select)"
        );
    }

    #[test]
    fn test_classify_unparseable_payload() {
        assert_eq!(classify("BEGIN TRANSACTION"), "unclassified");
        assert_eq!(classify("EXPLAIN ANALYZE things"), "unclassified");
    }

    #[test]
    fn test_classify_ignores_trace_annotation() {
        let annotated = format!("SELECT * FROM items{TRACE_MARKER}app/models/item.rs:10");
        assert_eq!(classify(&annotated), "items (select)");
    }

    #[test]
    fn test_table_usage_stats_reports_growth() {
        let r = reporter(Config::default());
        let before = run(1, &["SELECT * FROM items WHERE id = 1"]);
        let after = run(
            2,
            &[
                "SELECT * FROM items WHERE id = 1",
                "SELECT * FROM items WHERE id = 2",
            ],
        );

        let stats = r.table_usage_stats(&before, &after);
        assert_eq!(
            stats,
            vec![
                "Unmatched query numbers by tables (before and after):",
                "items (select): 1 != 2",
            ]
        );
    }

    #[test]
    fn test_table_usage_stats_equal_counts_are_silent() {
        let r = reporter(Config::default());
        let before = run(1, &["SELECT * FROM items"]);
        let after = run(2, &["SELECT * FROM items"]);

        assert!(r.table_usage_stats(&before, &after).is_empty());
    }

    #[test]
    fn test_table_usage_stats_absent_after_key_counts_as_zero() {
        let r = reporter(Config::default());
        let before = run(1, &["SELECT * FROM items"]);
        let after = run(2, &["SELECT * FROM users"]);

        let stats = r.table_usage_stats(&before, &after);
        assert!(stats.contains(&"items (select): 1 != 0".to_string()));
    }

    #[test]
    fn test_table_usage_stats_ignores_keys_only_in_after() {
        let r = reporter(Config::default());
        let before = run(1, &[]);
        let after = run(2, &["SELECT * FROM users"]);

        assert!(r.table_usage_stats(&before, &after).is_empty());
    }

    #[test]
    fn test_table_usage_stats_diffs_unclassified_bucket() {
        let r = reporter(Config::default());
        let before = run(1, &["BEGIN"]);
        let after = run(2, &["BEGIN", "BEGIN"]);

        let stats = r.table_usage_stats(&before, &after);
        assert!(stats.contains(&"unclassified: 1 != 2".to_string()));
    }

    #[test]
    fn test_failure_message_header_and_counts() {
        let r = reporter(Config::new().with_show_table_stats(false));
        let before = run(1, &["SELECT * FROM items"]);
        let after = run(2, &["SELECT * FROM items", "SELECT * FROM items"]);

        let message =
            r.build_failure_message(Expectation::ConstantQueries, &[before, after]);
        assert_eq!(
            message,
            "expected to make the same number of queries, but got:\n\
             \x20 1 queries for N=1 (db)\n\
             \x20 2 queries for N=2 (db)"
        );
    }

    #[test]
    fn test_failure_message_limited_queries_header() {
        let r = reporter(Config::new().with_show_table_stats(false));
        let message = r.build_failure_message(Expectation::LimitedQueries, &[run(1, &[])]);
        assert!(message.starts_with("expected to make no more queries, but got:"));
    }

    #[test]
    fn test_failure_message_includes_table_stats() {
        let r = reporter(Config::default());
        let before = run(1, &["SELECT * FROM items WHERE id = 1"]);
        let after = run(
            2,
            &[
                "SELECT * FROM items WHERE id = 1",
                "SELECT * FROM items WHERE id = 2",
            ],
        );

        let message =
            r.build_failure_message(Expectation::ConstantQueries, &[before, after]);
        assert!(message.contains("Unmatched query numbers by tables (before and after):"));
        assert!(message.contains("items (select): 1 != 2"));
    }

    #[test]
    fn test_failure_message_verbose_lists_truncated_queries() {
        let config = Config::new()
            .with_verbose(true)
            .with_show_table_stats(false)
            .with_truncate_query_size(10);
        let r = reporter(config);
        let before = run(1, &["SELECT * FROM items"]);

        let message = r.build_failure_message(Expectation::ConstantQueries, &[before]);
        assert!(message.contains("Queries for N=1 (db)"));
        assert!(message.contains("  SELECT ..."));
    }

    #[test]
    fn test_truncate_query_disabled_by_default() {
        let r = reporter(Config::default());
        assert_eq!(r.truncate_query("SELECT * FROM items"), "SELECT * FROM items");
    }

    #[test]
    fn test_truncate_query_to_size() {
        let r = reporter(Config::new().with_truncate_query_size(10));
        assert_eq!(r.truncate_query("SELECT * FROM items"), "SELECT ...");
    }

    #[test]
    fn test_truncate_query_tiny_size_is_bare_ellipsis() {
        let r = reporter(Config::new().with_truncate_query_size(2));
        assert_eq!(r.truncate_query("SELECT * FROM items"), "...");
    }

    #[test]
    fn test_truncate_query_within_limit_unchanged() {
        let r = reporter(Config::new().with_truncate_query_size(50));
        assert_eq!(r.truncate_query("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_truncate_query_preserves_trace_block() {
        let r = reporter(Config::new().with_truncate_query_size(10));
        let annotated = format!("SELECT * FROM items{TRACE_MARKER}app/models/item.rs:10");
        assert_eq!(
            r.truncate_query(&annotated),
            format!("SELECT ...{TRACE_MARKER}app/models/item.rs:10")
        );
    }

    #[test]
    fn test_truncate_query_is_character_based() {
        let r = reporter(Config::new().with_truncate_query_size(6));
        // 7 characters, multi-byte arrows; take 3 chars + ellipsis.
        assert_eq!(r.truncate_query("→→→→→→→"), "→→→...");
    }

    #[test]
    fn test_failure_message_multiple_collector_keys() {
        let r = reporter(Config::new().with_show_table_stats(false));
        let mut data = BTreeMap::new();
        data.insert("db".to_string(), vec!["SELECT 1".to_string()]);
        data.insert("redis".to_string(), vec!["GET k".to_string()]);
        let only = ScaledRun::new(1, data);

        let message = r.build_failure_message(Expectation::ConstantQueries, &[only]);
        assert!(message.contains("1 queries for N=1 (db)"));
        assert!(message.contains("1 queries for N=1 (redis)"));
    }
}
