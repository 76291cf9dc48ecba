//! Search and autocomplete command handlers.
//!
//! The index is built in-process from a snapshot file for each invocation.

use super::{exit_codes, load_snapshot_file, OutputTarget};
use crate::config::SearchConfig;
use crate::model::EntryField;
use crate::search::{SearchEngine, SearchFilters, SearchOptions};
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

/// Search invocation.
#[derive(Debug, Clone)]
pub struct SearchCommand {
    pub snapshot: PathBuf,
    pub matrix_id: i64,
    pub query: String,
    pub case_sensitive: bool,
    pub whole_words: bool,
    pub fuzzy: bool,
    /// Use typo-tolerant search and report suggestions
    pub suggest: bool,
    pub max_distance: Option<usize>,
    pub required_fields: Vec<EntryField>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
struct Hit<'a> {
    id: i64,
    score: f64,
    rule_name: Option<&'a str>,
    matched_terms: &'a [String],
    highlights: &'a [String],
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// Run a search, exiting with 1 when nothing matched.
pub fn run_search(command: &SearchCommand, config: SearchConfig, output_file: Option<PathBuf>) -> Result<i32> {
    let document = load_snapshot_file(&command.snapshot)?;
    let engine = SearchEngine::new(config);

    runtime()?.block_on(async {
        engine
            .build_index(command.matrix_id, &document.snapshot.entries, None)
            .await;

        let (results, suggestions) = if command.suggest {
            let fuzzy = engine
                .fuzzy_search(command.matrix_id, &command.query, command.max_distance)
                .await?;
            (fuzzy.results, fuzzy.suggestions)
        } else {
            let mut options = SearchOptions::default()
                .case_sensitive(command.case_sensitive)
                .whole_words(command.whole_words)
                .fuzzy(command.fuzzy)
                .filters(SearchFilters {
                    matrix_id: Some(command.matrix_id),
                    required_fields: command.required_fields.clone(),
                    ..SearchFilters::default()
                });
            if let Some(limit) = command.limit {
                options = options.max_results(limit);
            }
            (engine.search(&command.query, &options).await?, Vec::new())
        };

        let hits: Vec<Hit<'_>> = results
            .iter()
            .take(command.limit.unwrap_or(usize::MAX))
            .map(|r| Hit {
                id: r.id,
                score: r.score,
                rule_name: r.document.fields.get(&EntryField::RuleName).map(String::as_str),
                matched_terms: &r.matched_terms,
                highlights: &r.highlights,
            })
            .collect();
        let output = serde_json::json!({
            "query": command.query,
            "total": hits.len(),
            "results": hits,
            "suggestions": suggestions,
        });
        OutputTarget::from_option(output_file).write(&serde_json::to_string_pretty(&output)?)?;

        Ok::<_, anyhow::Error>(if hits.is_empty() {
            exit_codes::NO_MATCHES
        } else {
            exit_codes::SUCCESS
        })
    })
}

/// Print completions for a prefix, one per line.
pub fn run_autocomplete(
    snapshot: &std::path::Path,
    matrix_id: i64,
    prefix: &str,
    limit: Option<usize>,
    config: SearchConfig,
) -> Result<i32> {
    let document = load_snapshot_file(snapshot)?;
    let engine = SearchEngine::new(config);

    let terms = runtime()?.block_on(async {
        engine
            .build_index(matrix_id, &document.snapshot.entries, None)
            .await;
        engine.autocomplete(matrix_id, prefix, limit).await
    });
    if !terms.is_empty() {
        OutputTarget::Stdout.write(&terms.join("\n"))?;
    }
    Ok(exit_codes::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(dir: &std::path::Path, query: &str) -> SearchCommand {
        let snapshot = dir.join("snapshot.json");
        std::fs::write(
            &snapshot,
            r#"[{"id": 1, "rule_name": "Backup <server>"}, {"id": 2, "rule_name": "Web"}]"#,
        )
        .unwrap();
        SearchCommand {
            snapshot,
            matrix_id: 1,
            query: query.to_string(),
            case_sensitive: false,
            whole_words: false,
            fuzzy: false,
            suggest: false,
            max_distance: None,
            required_fields: Vec::new(),
            limit: None,
        }
    }

    #[test]
    fn test_search_writes_hits() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("hits.json");
        let code = run_search(&command(dir.path(), "backup"), SearchConfig::default(), Some(out.clone())).unwrap();
        assert_eq!(code, exit_codes::SUCCESS);

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["results"][0]["id"], 1);
        assert!(json["results"][0]["highlights"][0]
            .as_str()
            .unwrap()
            .contains("&lt;server&gt;"));
    }

    #[test]
    fn test_no_hits_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("hits.json");
        let code = run_search(&command(dir.path(), "printer"), SearchConfig::default(), Some(out)).unwrap();
        assert_eq!(code, exit_codes::NO_MATCHES);
    }

    #[test]
    fn test_malformed_query_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_search(&command(dir.path(), "  "), SearchConfig::default(), None).is_err());
    }
}
