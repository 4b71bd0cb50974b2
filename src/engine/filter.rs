//! Admission filter chain.
//!
//! Filters whose condition matches the raw settings are collected once per
//! submission in registration order. Their rewrites run in sequence before
//! a request exists; their observers run once the request handle is known.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::engine::EngineError;
use crate::scheduler::{RequestHandle, RequestSettings};

/// Predicate over incoming settings.
pub type FilterPredicate = Arc<dyn Fn(&RequestSettings) -> bool + Send + Sync>;

/// Pre-admission rewrite.
pub type PreFilter = Arc<dyn Fn(RequestSettings) -> RequestSettings + Send + Sync>;

/// Post-admission observer.
pub type PostFilter = Arc<dyn Fn(&RequestHandle) + Send + Sync>;

/// When a filter applies.
#[derive(Clone)]
pub enum Condition {
    Always,
    When(FilterPredicate),
}

impl Condition {
    pub fn when(f: impl Fn(&RequestSettings) -> bool + Send + Sync + 'static) -> Self {
        Self::When(Arc::new(f))
    }

    fn matches(&self, settings: &RequestSettings) -> bool {
        match self {
            Self::Always => true,
            Self::When(predicate) => predicate(settings),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::When(_) => f.write_str("When(..)"),
        }
    }
}

static NEXT_FILTER_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct Filter {
    id: u64,
    condition: Condition,
    pre: Option<PreFilter>,
    post: Option<PostFilter>,
    enabled: AtomicBool,
}

impl Filter {
    pub(crate) fn new(
        condition: Condition,
        pre: Option<PreFilter>,
        post: Option<PostFilter>,
    ) -> Result<Self, EngineError> {
        if pre.is_none() && post.is_none() {
            return Err(EngineError::InvalidFilter(
                "at least one of pre-filter or post-filter is required".to_string(),
            ));
        }
        Ok(Self {
            id: NEXT_FILTER_ID.fetch_add(1, Ordering::Relaxed),
            condition,
            pre,
            post,
            enabled: AtomicBool::new(true),
        })
    }

    fn is_active_for(&self, settings: &RequestSettings) -> bool {
        self.enabled.load(Ordering::Acquire) && self.condition.matches(settings)
    }

    pub(crate) fn rewrite(&self, settings: RequestSettings) -> RequestSettings {
        match &self.pre {
            Some(pre) => pre(settings),
            None => settings,
        }
    }

    pub(crate) fn observe(&self, request: &RequestHandle) {
        if let Some(post) = &self.post {
            post(request);
        }
    }
}

/// Registered filters in registration order.
#[derive(Default)]
pub(crate) struct FilterChain {
    filters: RwLock<Vec<Arc<Filter>>>,
}

impl FilterChain {
    pub(crate) fn register(self: &Arc<Self>, filter: Filter) -> FilterHandle {
        let filter = Arc::new(filter);
        self.filters.write().push(Arc::clone(&filter));
        tracing::debug!(filter_id = filter.id, "filter registered");
        FilterHandle { filter, chain: Arc::downgrade(self) }
    }

    /// Filters that apply to these settings. Conditions run without the
    /// chain lock held.
    pub(crate) fn active_for(&self, settings: &RequestSettings) -> Vec<Arc<Filter>> {
        let snapshot = self.filters.read().clone();
        snapshot.into_iter().filter(|f| f.is_active_for(settings)).collect()
    }

    fn remove(&self, id: u64) -> bool {
        let mut filters = self.filters.write();
        let before = filters.len();
        filters.retain(|f| f.id != id);
        filters.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.filters.read().len()
    }
}

/// Control surface of a registered filter.
#[derive(Clone)]
pub struct FilterHandle {
    filter: Arc<Filter>,
    chain: Weak<FilterChain>,
}

impl FilterHandle {
    pub fn enable(&self) -> &Self {
        self.filter.enabled.store(true, Ordering::Release);
        self
    }

    pub fn disable(&self) -> &Self {
        self.filter.enabled.store(false, Ordering::Release);
        self
    }

    pub fn toggle(&self) -> &Self {
        self.filter.enabled.fetch_xor(true, Ordering::AcqRel);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.filter.enabled.load(Ordering::Acquire)
    }

    /// Unregister the filter. Requests already admitted are unaffected.
    /// Returns false if it was already removed.
    pub fn remove(&self) -> bool {
        match self.chain.upgrade() {
            Some(chain) => chain.remove(self.filter.id),
            None => false,
        }
    }
}

impl fmt::Debug for FilterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterHandle")
            .field("id", &self.filter.id)
            .field("condition", &self.filter.condition)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
