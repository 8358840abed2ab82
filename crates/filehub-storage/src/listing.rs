//! Filter, sort and paginate logic shared by both backends.
//!
//! Backends feed every entry of an owner through a [`PageCollector`], which
//! keeps only the first `offset + limit` entries of the requested order and
//! counts all matches. Nothing beyond the requested window is held in memory.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use filehub_core::models::{ListQuery, SortDirection, SortField, SortSpec};

use crate::keys;

/// Name, size and timestamp of one stored file, before its content type is known.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Name returned to clients
    pub filename: String,
    /// `{token}_{original}` without any owner prefix
    pub stored_name: String,
    pub token: String,
    pub original_name: String,
    pub size: u64,
    pub created: DateTime<Utc>,
}

impl Candidate {
    /// Build from the name clients use and the bare `{token}_{original}` name.
    pub fn new(filename: String, bare_name: &str, size: u64, created: DateTime<Utc>) -> Self {
        let (token, original) = keys::split_stored_name(bare_name);
        Candidate {
            token: token.to_string(),
            original_name: original.to_string(),
            stored_name: bare_name.to_string(),
            filename,
            size,
            created,
        }
    }
}

/// Case-insensitive substring match on the original or stored name.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    needle: Option<String>,
}

impl SearchFilter {
    pub fn new(search: Option<&str>) -> Self {
        let needle = search
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase);
        SearchFilter { needle }
    }

    pub fn matches(&self, candidate: &Candidate) -> bool {
        match &self.needle {
            None => true,
            Some(needle) => {
                candidate.original_name.to_lowercase().contains(needle)
                    || candidate.stored_name.to_lowercase().contains(needle)
            }
        }
    }
}

/// Total order for a listing. Ties fall back to the file name so that pages
/// never overlap.
pub fn compare(sort: SortSpec, a: &Candidate, b: &Candidate) -> Ordering {
    let primary = match sort.field {
        SortField::Filename => a
            .original_name
            .to_lowercase()
            .cmp(&b.original_name.to_lowercase()),
        SortField::Size => a.size.cmp(&b.size),
        SortField::CreationTime => a.created.cmp(&b.created),
    };
    let primary = match sort.direction {
        SortDirection::Asc => primary,
        SortDirection::Desc => primary.reverse(),
    };
    primary.then_with(|| a.filename.cmp(&b.filename))
}

/// Bounded top-k collector for one page.
#[derive(Debug)]
pub struct PageCollector {
    sort: SortSpec,
    filter: SearchFilter,
    offset: usize,
    /// `None` keeps everything
    keep: Option<usize>,
    window: Vec<Candidate>,
    total: u64,
}

impl PageCollector {
    pub fn new(query: &ListQuery) -> Self {
        let offset = query.offset();
        PageCollector {
            sort: query.sort,
            filter: SearchFilter::new(query.search_term()),
            offset,
            keep: query.limit().map(|limit| offset.saturating_add(limit)),
            window: Vec::new(),
            total: 0,
        }
    }

    pub fn offer(&mut self, candidate: Candidate) {
        if !self.filter.matches(&candidate) {
            return;
        }
        self.total += 1;

        let sort = self.sort;
        let position = self
            .window
            .partition_point(|kept| compare(sort, kept, &candidate) != Ordering::Greater);
        if let Some(keep) = self.keep {
            if position >= keep {
                return;
            }
            self.window.insert(position, candidate);
            self.window.truncate(keep);
        } else {
            self.window.insert(position, candidate);
        }
    }

    /// The requested page and the number of matching entries.
    pub fn finish(self) -> (Vec<Candidate>, u64) {
        let page = self.window.into_iter().skip(self.offset).collect();
        (page, self.total)
    }
}
