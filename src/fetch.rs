// src/fetch.rs
//! Paged collection fetcher.
//!
//! Requests fixed-size pages one after another and concatenates them until a
//! short, empty or malformed page ends the collection. A failed request stops
//! the loop and keeps whatever was accumulated; nothing is retried.

use metrics::counter;
use rand::Rng;
use serde_json::Value;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, info, warn};

use crate::client::{PageBody, PageRequest, PageSource};
use crate::metrics::{
    ensure_metrics_described, FETCH_ERRORS_TOTAL, PAGES_FETCHED_TOTAL, RECORDS_FETCHED_TOTAL,
    RECORDS_SKIPPED_TOTAL, SYNTHETIC_SCORES_TOTAL,
};
use crate::model::{Collection, Record, ScoreOrigin};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const PLACEHOLDER_SCORE_MIN: u8 = 65;
pub const PLACEHOLDER_SCORE_MAX: u8 = 98;
pub const DEFAULT_MATCH_REASON: &str = "Alta compatibilidad con tu perfil lógico-matemático.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub page_size: usize,
    /// Forwarded on every page request.
    pub filters: Vec<(String, String)>,
    /// Fill absent scores with a placeholder in
    /// `PLACEHOLDER_SCORE_MIN..=PLACEHOLDER_SCORE_MAX`.
    pub synthesize_scores: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            filters: Vec::new(),
            synthesize_scores: true,
        }
    }
}

impl FetchOptions {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Diagnostics for one run of the loop. Never surfaced as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub requests: u32,
    pub pages: u32,
    pub records: usize,
    /// Elements dropped because they had no usable `id` or `nombre`.
    pub skipped: usize,
    /// The loop stopped on a failed request.
    pub aborted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub records: Vec<Record>,
    pub report: FetchReport,
}

/// Cancellation flag owned by a view. Cancelling does not stop in-flight
/// requests; it only keeps a finished fetch from being published.
#[derive(Debug, Clone, Default)]
pub struct LivenessToken {
    cancelled: Arc<AtomicBool>,
}

impl LivenessToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_live(&self) -> bool {
        !self.is_cancelled()
    }
}

/// One page after decoding. `len` is the raw element count and drives the
/// short-page check, so skipped records never end the collection early.
#[derive(Debug, Default)]
struct DecodedPage {
    records: Vec<Record>,
    len: usize,
    skipped: usize,
}

/// A page is usable when it is a non-empty array. Each element is decoded on
/// its own; elements without a usable `id` or `nombre` are skipped.
fn decode_page(body: PageBody) -> Option<DecodedPage> {
    let Value::Array(items) = body else {
        return None;
    };
    if items.is_empty() {
        return None;
    }
    let mut page = DecodedPage {
        len: items.len(),
        ..DecodedPage::default()
    };
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Record>(item) {
            Ok(r) => page.records.push(r),
            Err(e) => {
                debug!(target: "fetch", index, error = %e, "skipping malformed record");
                page.skipped += 1;
            }
        }
    }
    Some(page)
}

/// Fill in display data for one record. Returns true when a placeholder
/// score was generated.
///
/// A score above zero is always kept. The default rationale is only added
/// when the record ends up with a score.
pub fn enrich_record<R: Rng + ?Sized>(record: &mut Record, synthesize: bool, rng: &mut R) -> bool {
    let mut synthesized = false;
    match record.match_score {
        Some(s) if s > 0.0 => record.score_origin = ScoreOrigin::Server,
        _ if synthesize => {
            let s = rng.random_range(PLACEHOLDER_SCORE_MIN..=PLACEHOLDER_SCORE_MAX);
            record.match_score = Some(f64::from(s));
            record.score_origin = ScoreOrigin::Synthetic;
            synthesized = true;
        }
        _ => {
            record.match_score = None;
            record.score_origin = ScoreOrigin::Unknown;
        }
    }

    let has_reason = record
        .match_reason
        .as_deref()
        .is_some_and(|r| !r.trim().is_empty());
    if record.match_score.is_some() && !has_reason {
        record.match_reason = Some(DEFAULT_MATCH_REASON.to_string());
    }
    synthesized
}

/// Enrich a whole page; returns the number of placeholder scores generated.
pub fn enrich_page(records: &mut [Record], synthesize: bool) -> usize {
    let mut rng = rand::rng();
    let mut synthesized = 0;
    for r in records.iter_mut() {
        if enrich_record(r, synthesize, &mut rng) {
            synthesized += 1;
        }
    }
    synthesized
}

/// Fetch the whole collection, page by page, in request order.
pub async fn fetch_collection<S>(
    source: &S,
    collection: Collection,
    opts: &FetchOptions,
) -> FetchOutcome
where
    S: PageSource + ?Sized,
{
    ensure_metrics_described();

    let limit = opts.page_size.max(1);
    let mut page: u32 = 1;
    let mut out = FetchOutcome::default();

    loop {
        let req = PageRequest::new(collection, page, limit).with_filters(opts.filters.clone());
        out.report.requests += 1;

        let body = match source.fetch_page(&req).await {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    target: "fetch",
                    error = ?e,
                    %collection,
                    page,
                    source = source.name(),
                    "page request failed; keeping partial collection"
                );
                counter!(FETCH_ERRORS_TOTAL).increment(1);
                out.report.aborted = true;
                break;
            }
        };

        let Some(DecodedPage {
            mut records,
            len,
            skipped,
        }) = decode_page(body)
        else {
            debug!(target: "fetch", %collection, page, "empty or malformed page; end of collection");
            break;
        };

        let kept = records.len();
        let synthetic = enrich_page(&mut records, opts.synthesize_scores);
        out.records.extend(records);
        out.report.pages += 1;
        out.report.skipped += skipped;

        counter!(PAGES_FETCHED_TOTAL).increment(1);
        counter!(RECORDS_FETCHED_TOTAL).increment(kept as u64);
        counter!(RECORDS_SKIPPED_TOTAL).increment(skipped as u64);
        counter!(SYNTHETIC_SCORES_TOTAL).increment(synthetic as u64);
        debug!(target: "fetch", %collection, page, len, kept, skipped, synthetic, "page processed");

        if len < limit {
            break;
        }
        page += 1;
    }

    out.report.records = out.records.len();
    info!(
        target: "fetch",
        %collection,
        requests = out.report.requests,
        records = out.report.records,
        skipped = out.report.skipped,
        aborted = out.report.aborted,
        "collection fetch finished"
    );
    out
}

/// Same as [`fetch_collection`], but yields nothing when the token was
/// cancelled while the loop ran.
pub async fn fetch_live<S>(
    source: &S,
    collection: Collection,
    opts: &FetchOptions,
    token: &LivenessToken,
) -> Option<FetchOutcome>
where
    S: PageSource + ?Sized,
{
    let outcome = fetch_collection(source, collection, opts).await;
    if token.is_cancelled() {
        debug!(target: "fetch", %collection, "token cancelled; dropping result");
        return None;
    }
    Some(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordId;
    use rand::{rngs::StdRng, SeedableRng};
    use serde_json::json;

    fn rec(score: Option<f64>) -> Record {
        let mut r = Record::new(RecordId::Int(1), "x");
        r.match_score = score;
        r
    }

    #[test]
    fn server_score_is_never_replaced() {
        let mut rng = StdRng::seed_from_u64(7);
        for s in [0.5, 12.0, 61.0, 100.0] {
            let mut r = rec(Some(s));
            assert!(!enrich_record(&mut r, true, &mut rng));
            assert_eq!(r.match_score, Some(s));
            assert_eq!(r.score_origin, ScoreOrigin::Server);
        }
    }

    #[test]
    fn placeholder_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for score in [None, Some(0.0), Some(-3.0), Some(f64::NAN)] {
            for _ in 0..200 {
                let mut r = rec(score);
                assert!(enrich_record(&mut r, true, &mut rng));
                let s = r.match_score.unwrap();
                assert!((65.0..=98.0).contains(&s), "score {s} out of range");
                assert_eq!(s.fract(), 0.0);
                assert_eq!(r.score_origin, ScoreOrigin::Synthetic);
            }
        }
    }

    #[test]
    fn default_reason_only_fills_blanks() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut r = rec(Some(80.0));
        r.match_reason = Some("  ".into());
        enrich_record(&mut r, true, &mut rng);
        assert_eq!(r.match_reason.as_deref(), Some(DEFAULT_MATCH_REASON));

        let mut kept = rec(Some(80.0));
        kept.match_reason = Some("Te gusta la biología".into());
        enrich_record(&mut kept, true, &mut rng);
        assert_eq!(kept.match_reason.as_deref(), Some("Te gusta la biología"));
    }

    #[test]
    fn synthesis_disabled_leaves_unknown() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut r = rec(Some(0.0));
        assert!(!enrich_record(&mut r, false, &mut rng));
        assert_eq!(r.match_score, None);
        assert_eq!(r.match_reason, None);
        assert_eq!(r.score_origin, ScoreOrigin::Unknown);
    }

    #[test]
    fn decode_rejects_non_arrays_and_empty_pages() {
        assert!(decode_page(Value::Null).is_none());
        assert!(decode_page(json!({"items": []})).is_none());
        assert!(decode_page(json!([])).is_none());
        let page = decode_page(json!([{"id": 1, "nombre": "a"}])).unwrap();
        assert_eq!((page.records.len(), page.len, page.skipped), (1, 1, 0));
    }

    #[test]
    fn decode_skips_only_the_bad_element() {
        let page = decode_page(json!([
            {"id": 1, "nombre": "a", "salarioPromedio": 1500},
            {"nombre": "no id"},
            {"id": 3, "nombre": "c", "universidades": [null]}
        ]))
        .unwrap();
        assert_eq!(page.len, 3);
        assert_eq!(page.skipped, 1);
        let ids: Vec<_> = page.records.iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn token_starts_live_and_clones_share_state() {
        let t = LivenessToken::new();
        let t2 = t.clone();
        assert!(t.is_live());
        t2.cancel();
        assert!(t.is_cancelled());
    }
}
