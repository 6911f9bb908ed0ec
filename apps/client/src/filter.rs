//! Job facet filter: company, tag and recency facets over the active job list.
//!
//! Values combine with OR inside a facet and AND across facets. An empty facet
//! means "no restriction", never "exclude everything". The filter never changes
//! the underlying job list, only which jobs are visible.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::{FacetCount, Job};

// ────────────────────────────────────────────────────────────────────────────
// Selection state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetSelection {
    companies: HashSet<String>,
    tags: HashSet<String>,
    recent_day: bool,
    recent_week: bool,
}

impl FacetSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the company if absent, removes it if present. Returns whether it is now selected.
    pub fn toggle_company(&mut self, company: &str) -> bool {
        toggle(&mut self.companies, company)
    }

    pub fn toggle_tag(&mut self, tag: &str) -> bool {
        toggle(&mut self.tags, tag)
    }

    pub fn toggle_recent_day(&mut self) -> bool {
        self.recent_day = !self.recent_day;
        self.recent_day
    }

    pub fn toggle_recent_week(&mut self) -> bool {
        self.recent_week = !self.recent_week;
        self.recent_week
    }

    pub fn is_company_selected(&self, company: &str) -> bool {
        self.companies.contains(company)
    }

    pub fn is_tag_selected(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn recent_day(&self) -> bool {
        self.recent_day
    }

    pub fn recent_week(&self) -> bool {
        self.recent_week
    }

    pub fn is_unrestricted(&self) -> bool {
        self.companies.is_empty() && self.tags.is_empty() && !self.recent_day && !self.recent_week
    }

    /// The visibility predicate for a single job.
    pub fn matches(&self, job: &Job) -> bool {
        let company_ok = self.companies.is_empty()
            || self.companies.contains(&job.company_name)
            || self.companies.contains(&job.affiliate_company_name);
        let tags_ok = self.tags.is_empty() || job.tags.iter().any(|t| self.tags.contains(t));
        let day_ok = !self.recent_day || job.uploaded_in_a_day;
        let week_ok = !self.recent_week || job.uploaded_in_a_week;

        company_ok && tags_ok && day_ok && week_ok
    }
}

fn toggle(set: &mut HashSet<String>, value: &str) -> bool {
    if set.remove(value) {
        false
    } else {
        set.insert(value.to_string());
        true
    }
}

/// Order-preserving subset of `jobs` that passes `selection`.
pub fn filter_jobs<'a>(jobs: &'a [Job], selection: &FacetSelection) -> Vec<&'a Job> {
    jobs.iter().filter(|job| selection.matches(job)).collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Recency badges
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyBadge {
    Day,
    Week,
}

/// Badges to render next to a job. A same-day job hides its week badge unless the
/// week filter is active, so the active filter always shows on every visible job.
pub fn recency_badges(job: &Job, selection: &FacetSelection) -> Vec<RecencyBadge> {
    let mut badges = Vec::with_capacity(2);
    if job.uploaded_in_a_day {
        badges.push(RecencyBadge::Day);
    }
    if job.uploaded_in_a_week && (!job.uploaded_in_a_day || selection.recent_week()) {
        badges.push(RecencyBadge::Week);
    }
    badges
}

// ────────────────────────────────────────────────────────────────────────────
// Job board
// ────────────────────────────────────────────────────────────────────────────

/// The résumé-independent job list with its facet selection and the currently
/// expanded detail panel.
#[derive(Debug, Clone, Default)]
pub struct JobBoard {
    jobs: Vec<Job>,
    selection: FacetSelection,
    expanded: Option<String>,
    tag_counts: Vec<FacetCount>,
    company_counts: Vec<FacetCount>,
}

impl JobBoard {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self {
            jobs,
            ..Self::default()
        }
    }

    pub fn with_facet_counts(
        mut self,
        tag_counts: Vec<FacetCount>,
        company_counts: Vec<FacetCount>,
    ) -> Self {
        self.tag_counts = tag_counts;
        self.company_counts = company_counts;
        self
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn selection(&self) -> &FacetSelection {
        &self.selection
    }

    pub fn tag_counts(&self) -> &[FacetCount] {
        &self.tag_counts
    }

    pub fn company_counts(&self) -> &[FacetCount] {
        &self.company_counts
    }

    pub fn visible(&self) -> Vec<&Job> {
        filter_jobs(&self.jobs, &self.selection)
    }

    // Every facet transition closes the expanded panel.

    pub fn toggle_company(&mut self, company: &str) -> bool {
        self.expanded = None;
        self.selection.toggle_company(company)
    }

    pub fn toggle_tag(&mut self, tag: &str) -> bool {
        self.expanded = None;
        self.selection.toggle_tag(tag)
    }

    pub fn toggle_recent_day(&mut self) -> bool {
        self.expanded = None;
        self.selection.toggle_recent_day()
    }

    pub fn toggle_recent_week(&mut self) -> bool {
        self.expanded = None;
        self.selection.toggle_recent_week()
    }

    /// Opens the job's detail panel, or closes it if it is the one already open.
    pub fn toggle_panel(&mut self, job_id: &str) {
        if self.expanded.as_deref() == Some(job_id) {
            self.expanded = None;
        } else {
            self.expanded = Some(job_id.to_string());
        }
    }

    pub fn expanded(&self) -> Option<&str> {
        self.expanded.as_deref()
    }
}
