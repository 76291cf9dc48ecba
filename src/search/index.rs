//! Inverted index over matrix entries.

use super::tokenize::index_terms;
use crate::model::{EntryField, MatrixEntry};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Text-bearing fields that are indexed
pub const INDEXED_FIELDS: [EntryField; 11] = [
    EntryField::RuleName,
    EntryField::Comment,
    EntryField::SrcName,
    EntryField::DstName,
    EntryField::Device,
    EntryField::Requester,
    EntryField::Action,
    EntryField::SrcZone,
    EntryField::DstZone,
    EntryField::ProtocolGroup,
    EntryField::RuleStatus,
];

/// Scoring weight of a field: rule name heaviest, then comment, names,
/// device, requester and action, with a low default for the rest.
#[must_use]
pub const fn field_weight(field: EntryField) -> f64 {
    match field {
        EntryField::RuleName => 3.0,
        EntryField::Comment => 2.0,
        EntryField::SrcName | EntryField::DstName => 1.5,
        EntryField::Device => 1.2,
        EntryField::Requester | EntryField::Action => 1.0,
        _ => 0.5,
    }
}

/// One indexed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: i64,
    pub matrix_id: i64,
    pub version: Option<u32>,
    /// Populated indexed fields, original case
    pub fields: BTreeMap<EntryField, String>,
    /// Lowercased concatenation of `fields`
    pub searchable_text: String,
    /// Scoring prior from populated fields
    pub weight: f64,
    pub last_modified: DateTime<Utc>,
}

impl IndexedDocument {
    fn from_entry(
        entry: &MatrixEntry,
        matrix_id: i64,
        version: Option<u32>,
        built_at: DateTime<Utc>,
    ) -> Self {
        let fields: BTreeMap<EntryField, String> = INDEXED_FIELDS
            .iter()
            .filter_map(|field| {
                entry
                    .get(*field)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| (*field, v.to_string()))
            })
            .collect();

        let searchable_text = fields
            .values()
            .map(|v| v.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let weight = fields.keys().map(|f| field_weight(*f)).sum();

        Self {
            id: entry.id,
            matrix_id,
            version,
            fields,
            searchable_text,
            weight,
            last_modified: entry.updated_at.or(entry.created_at).unwrap_or(built_at),
        }
    }

    /// All field values joined, original case.
    #[must_use]
    pub fn original_text(&self) -> String {
        self.fields.values().map(String::as_str).collect::<Vec<_>>().join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub total_documents: usize,
    pub total_terms: usize,
    pub last_updated: DateTime<Utc>,
    pub version: Option<u32>,
    /// Approximate size in bytes, for reporting only
    pub index_size: usize,
}

/// Inverted index for one `(matrix, version)` key. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndex {
    /// Term to posting list, in term order so serialized indexes are stable.
    pub terms: BTreeMap<String, BTreeSet<i64>>,
    pub documents: BTreeMap<i64, IndexedDocument>,
    pub metadata: IndexMetadata,
}

impl SearchIndex {
    /// Build an index from scratch.
    #[must_use]
    pub fn build(matrix_id: i64, entries: &[MatrixEntry], version: Option<u32>) -> Self {
        let built_at = Utc::now();
        let documents: Vec<IndexedDocument> = entries
            .par_iter()
            .map(|entry| IndexedDocument::from_entry(entry, matrix_id, version, built_at))
            .collect();

        let mut terms: BTreeMap<String, BTreeSet<i64>> = BTreeMap::new();
        for doc in &documents {
            for term in index_terms(&doc.searchable_text) {
                terms.entry(term).or_default().insert(doc.id);
            }
        }

        let documents: BTreeMap<i64, IndexedDocument> =
            documents.into_iter().map(|doc| (doc.id, doc)).collect();
        let index_size = estimate_size(&terms, &documents);

        Self {
            metadata: IndexMetadata {
                total_documents: documents.len(),
                total_terms: terms.len(),
                last_updated: built_at,
                version,
                index_size,
            },
            terms,
            documents,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Posting list for an exact term.
    #[must_use]
    pub fn postings(&self, term: &str) -> Option<&BTreeSet<i64>> {
        self.terms.get(term)
    }

    /// Union of posting lists of every term containing `fragment`.
    #[must_use]
    pub fn substring_postings(&self, fragment: &str) -> BTreeSet<i64> {
        self.terms
            .iter()
            .filter(|(term, _)| term.contains(fragment))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }
}

fn estimate_size(terms: &BTreeMap<String, BTreeSet<i64>>, documents: &BTreeMap<i64, IndexedDocument>) -> usize {
    let term_bytes: usize = terms
        .iter()
        .map(|(term, ids)| term.len() + ids.len() * std::mem::size_of::<i64>())
        .sum();
    let doc_bytes: usize = documents
        .values()
        .map(|doc| {
            doc.searchable_text.len()
                + doc.fields.values().map(String::len).sum::<usize>()
                + std::mem::size_of::<IndexedDocument>()
        })
        .sum();
    term_bytes + doc_bytes
}
