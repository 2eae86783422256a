//! View-local collection state: snapshot, loading flag and liveness token.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    RwLock,
};
use tracing::{debug, info, warn};

use crate::client::PageSource;
use crate::fetch::{fetch_live, FetchOptions, FetchReport, LivenessToken};
use crate::model::{Collection, Record};

#[derive(Debug)]
pub struct CollectionView {
    collection: Collection,
    records: RwLock<Vec<Record>>,
    last_report: RwLock<Option<FetchReport>>,
    loading: AtomicBool,
    in_flight: AtomicBool,
    token: LivenessToken,
    fallback: Option<Vec<Record>>,
}

/// Clears the in-flight flag when a load finishes or is dropped mid-await.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CollectionView {
    /// Mount an empty view. It reports loading until its first load
    /// publishes.
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            records: RwLock::new(Vec::new()),
            last_report: RwLock::new(None),
            loading: AtomicBool::new(true),
            in_flight: AtomicBool::new(false),
            token: LivenessToken::new(),
            fallback: None,
        }
    }

    /// Records published instead of an empty fetch result.
    pub fn with_fallback(mut self, fallback: Vec<Record>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn is_mounted(&self) -> bool {
        self.token.is_live()
    }

    pub fn token(&self) -> LivenessToken {
        self.token.clone()
    }

    /// Tear the view down; a fetch still running will not publish.
    pub fn unmount(&self) {
        self.token.cancel();
    }

    pub fn snapshot(&self) -> Vec<Record> {
        self.records.read().expect("view records poisoned").clone()
    }

    /// Run `f` against the current snapshot without cloning it.
    pub fn with_records<R>(&self, f: impl FnOnce(&[Record]) -> R) -> R {
        let guard = self.records.read().expect("view records poisoned");
        f(&guard)
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("view records poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_report(&self) -> Option<FetchReport> {
        self.last_report
            .read()
            .expect("view report poisoned")
            .clone()
    }

    /// Fetch the whole collection and replace the snapshot if the view is
    /// still mounted. Returns whether anything was published.
    ///
    /// At most one load runs per view; a call made while another is in
    /// flight returns false without issuing requests.
    pub async fn load<S>(&self, source: &S, opts: &FetchOptions) -> bool
    where
        S: PageSource + ?Sized,
    {
        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            debug!(target: "view", collection = %self.collection, "load already running; skipped");
            return false;
        };
        self.loading.store(true, Ordering::SeqCst);

        let Some(outcome) = fetch_live(source, self.collection, opts, &self.token).await else {
            debug!(target: "view", collection = %self.collection, "view unmounted; result discarded");
            return false;
        };

        let mut records = outcome.records;
        if records.is_empty() {
            if let Some(fb) = &self.fallback {
                warn!(
                    target: "view",
                    collection = %self.collection,
                    fallback = fb.len(),
                    "no records from api; using built-in fallback"
                );
                records = fb.clone();
            }
        }

        let count = records.len();
        *self.records.write().expect("view records poisoned") = records;
        *self.last_report.write().expect("view report poisoned") = Some(outcome.report);
        self.loading.store(false, Ordering::SeqCst);

        info!(target: "view", collection = %self.collection, count, "snapshot published");
        true
    }
}
