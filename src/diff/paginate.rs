//! Pagination, filtering and sorting over a computed diff.
//!
//! Processing order matters: filter, then sort, then slice. The
//! `summary.filtered` counts cover the filtered set before slicing while
//! `summary.original` is the diff's own summary.

use super::{ChangeType, DiffEntry, DiffMetadata, DiffSummary, MatrixDiff};
use crate::config::PaginationConfig;
use clap::ValueEnum;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tokio_util::sync::CancellationToken;

/// Sort key for diff entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Id,
    Type,
    Changes,
    Impact,
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Per-entry impact bucket used for filtering.
///
/// Independent of [`super::RiskLevel`], which rates a whole diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    /// Bucket an entry: more than 5 changes or any action change is high,
    /// 3 to 5 changes is medium, anything else low.
    #[must_use]
    pub fn of(entry: &DiffEntry) -> Self {
        let changes = entry.changes.len();
        if changes > 5 || entry.has_action_change() {
            Self::High
        } else if changes >= 3 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Optional filters applied before sorting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffFilters {
    /// Keep only these change types
    #[serde(default)]
    pub types: Option<Vec<ChangeType>>,
    /// Case-insensitive containment over names, comment, device and changes
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub impact_level: Option<ImpactLevel>,
}

impl DiffFilters {
    /// Whether an entry passes every configured filter.
    #[must_use]
    pub fn matches(&self, entry: &DiffEntry) -> bool {
        if let Some(types) = &self.types {
            if !types.contains(&entry.change_type) {
                return false;
            }
        }
        if let Some(level) = self.impact_level {
            if ImpactLevel::of(entry) != level {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => matches_search(entry, &term.to_lowercase()),
            _ => true,
        }
    }
}

fn matches_search(entry: &DiffEntry, term: &str) -> bool {
    let e = &entry.entry;
    [
        e.rule_name.as_deref(),
        e.src_name.as_deref(),
        e.dst_name.as_deref(),
        e.comment.as_deref(),
        e.device.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|value| value.to_lowercase().contains(term))
        || entry.changes_text().to_lowercase().contains(term)
}

/// Pagination request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationOptions {
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub filters: DiffFilters,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 50,
            sort_by: SortBy::Id,
            sort_order: SortOrder::Asc,
            filters: DiffFilters::default(),
        }
    }
}

impl PaginationOptions {
    #[must_use]
    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn sort(mut self, sort_by: SortBy, sort_order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self
    }

    #[must_use]
    pub fn filters(mut self, filters: DiffFilters) -> Self {
        self.filters = filters;
        self
    }
}

/// Page position information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub current_page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Summary of the original diff and of the filtered set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatedSummary {
    pub original: DiffSummary,
    pub filtered: DiffSummary,
}

/// One page of a diff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedDiff {
    pub entries: Vec<DiffEntry>,
    pub pagination: PaginationInfo,
    pub summary: PaginatedSummary,
    pub metadata: DiffMetadata,
}

/// Rendering cost estimate for a diff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub entry_count: usize,
    pub average_changes_per_entry: f64,
    /// Estimated render time in milliseconds
    pub estimated_render_time: f64,
    pub estimated_memory_bytes: usize,
    pub should_paginate: bool,
    pub recommended_page_size: usize,
}

/// Paginates diffs without recomputing them.
#[derive(Debug, Clone)]
pub struct DiffPaginator {
    config: PaginationConfig,
}

impl DiffPaginator {
    const RENDER_MS_PER_ENTRY: f64 = 0.8;
    const RENDER_MS_PER_CHANGE: f64 = 0.4;
    const BYTES_PER_ENTRY: usize = 1024;
    const BYTES_PER_CHANGE: usize = 160;
    const PAGINATE_ABOVE_ENTRIES: usize = 100;
    const PAGINATE_ABOVE_RENDER_MS: f64 = 1000.0;

    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PaginationConfig::default())
    }

    #[must_use]
    pub const fn with_config(config: PaginationConfig) -> Self {
        Self { config }
    }

    /// Return one page of the filtered and sorted diff entries.
    ///
    /// An out-of-range page yields empty `entries`, never an error.
    #[must_use]
    pub fn paginate(&self, diff: &MatrixDiff, options: &PaginationOptions) -> PaginatedDiff {
        let page_size = self.clamp_page_size(options.page_size);
        let prepared = prepare(diff, options);
        build_page(diff, &prepared, options.page.max(1), page_size)
    }

    /// Stream every page of the filtered and sorted entries.
    ///
    /// Control is handed back to the scheduler between pages. The stream ends
    /// early once `cancel` is cancelled; dropping it stops iteration as well.
    pub fn stream_pages<'a>(
        &self,
        diff: &'a MatrixDiff,
        options: &PaginationOptions,
        cancel: CancellationToken,
    ) -> impl Stream<Item = PaginatedDiff> + 'a {
        let page_size = self.clamp_page_size(options.page_size);
        let prepared = prepare(diff, options);
        let total_pages = total_pages(prepared.len(), page_size);

        stream::unfold((1usize, prepared), move |(page, prepared)| {
            let cancel = cancel.clone();
            async move {
                if page > 1 {
                    tokio::task::yield_now().await;
                }
                if page > total_pages || cancel.is_cancelled() {
                    return None;
                }
                let result = build_page(diff, &prepared, page, page_size);
                Some((result, (page + 1, prepared)))
            }
        })
    }

    /// Estimate render cost and memory footprint of showing a diff at once.
    #[must_use]
    pub fn performance_metrics(&self, diff: &MatrixDiff) -> PerformanceMetrics {
        let entry_count = diff.entries.len();
        let total_changes: usize = diff.entries.iter().map(|e| e.changes.len()).sum();
        let average_changes_per_entry = if entry_count == 0 {
            0.0
        } else {
            total_changes as f64 / entry_count as f64
        };

        let estimated_render_time = entry_count as f64
            * (Self::RENDER_MS_PER_ENTRY + average_changes_per_entry * Self::RENDER_MS_PER_CHANGE);
        let estimated_memory_bytes =
            entry_count * Self::BYTES_PER_ENTRY + total_changes * Self::BYTES_PER_CHANGE;
        let should_paginate = entry_count > Self::PAGINATE_ABOVE_ENTRIES
            || estimated_render_time > Self::PAGINATE_ABOVE_RENDER_MS;

        let recommended_page_size = if average_changes_per_entry > 10.0 {
            20
        } else if average_changes_per_entry > 5.0 {
            30
        } else {
            self.config.default_page_size
        };

        PerformanceMetrics {
            entry_count,
            average_changes_per_entry,
            estimated_render_time,
            estimated_memory_bytes,
            should_paginate,
            recommended_page_size: self.clamp_page_size(recommended_page_size),
        }
    }

    fn clamp_page_size(&self, page_size: usize) -> usize {
        page_size.clamp(1, self.config.max_page_size.max(1))
    }
}

impl Default for DiffPaginator {
    fn default() -> Self {
        Self::new()
    }
}

/// Derived per-entry impact score used for `SortBy::Impact`.
#[must_use]
pub fn impact_score(entry: &DiffEntry) -> u32 {
    let base = match entry.change_type {
        ChangeType::Removed => 10,
        ChangeType::Modified => 5,
        ChangeType::Added => 3,
        ChangeType::Unchanged => 1,
    };
    let action_bonus = if entry.flips_allow_to_deny() {
        20
    } else if entry.has_action_change() {
        10
    } else {
        0
    };
    base + 2 * entry.changes.len() as u32 + action_bonus
}

const fn type_rank(change_type: ChangeType) -> u8 {
    match change_type {
        ChangeType::Removed => 0,
        ChangeType::Modified => 1,
        ChangeType::Added => 2,
        ChangeType::Unchanged => 3,
    }
}

fn compare(a: &DiffEntry, b: &DiffEntry, sort_by: SortBy) -> Ordering {
    match sort_by {
        SortBy::Id => a.id().cmp(&b.id()),
        SortBy::Type => type_rank(a.change_type).cmp(&type_rank(b.change_type)),
        SortBy::Changes => a.changes.len().cmp(&b.changes.len()),
        SortBy::Impact => impact_score(a).cmp(&impact_score(b)),
    }
}

/// Filter, then stably sort. Ties keep diff order in both directions.
fn prepare<'a>(diff: &'a MatrixDiff, options: &PaginationOptions) -> Vec<&'a DiffEntry> {
    let mut entries: Vec<&DiffEntry> = diff
        .entries
        .iter()
        .filter(|e| options.filters.matches(e))
        .collect();
    match options.sort_order {
        SortOrder::Asc => entries.sort_by(|a, b| compare(a, b, options.sort_by)),
        SortOrder::Desc => entries.sort_by(|a, b| compare(b, a, options.sort_by)),
    }
    entries
}

fn total_pages(total_items: usize, page_size: usize) -> usize {
    total_items.div_ceil(page_size)
}

fn build_page(
    diff: &MatrixDiff,
    prepared: &[&DiffEntry],
    page: usize,
    page_size: usize,
) -> PaginatedDiff {
    let total_items = prepared.len();
    let total_pages = total_pages(total_items, page_size);
    let start = (page - 1).saturating_mul(page_size);
    let entries = if start >= total_items {
        Vec::new()
    } else {
        let end = (start + page_size).min(total_items);
        prepared[start..end].iter().map(|e| (*e).clone()).collect()
    };

    PaginatedDiff {
        entries,
        pagination: PaginationInfo {
            current_page: page,
            page_size,
            total_items,
            total_pages,
            has_next_page: page < total_pages,
            has_previous_page: page > 1,
        },
        summary: PaginatedSummary {
            original: diff.summary,
            filtered: DiffSummary::from_entries(prepared.iter().copied()),
        },
        metadata: diff.metadata.clone(),
    }
}
