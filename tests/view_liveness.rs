// tests/view_liveness.rs
//
// A view torn down while its fetch is running must not publish the result,
// and overlapping loads on one view collapse into a single fetch loop.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

use unidream_catalog::client::{PageBody, PageRequest, PageSource};
use unidream_catalog::fetch::{fetch_live, LivenessToken};
use unidream_catalog::view::CollectionView;
use unidream_catalog::{Collection, FetchOptions};

/// Serves full pages and cancels the token after `cancel_after` requests.
struct CancellingSource {
    token: LivenessToken,
    cancel_after: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl PageSource for CancellingSource {
    async fn fetch_page(&self, req: &PageRequest) -> Result<PageBody> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= self.cancel_after {
            self.token.cancel();
        }
        if n >= 3 {
            return Ok(json!([]));
        }
        let items: Vec<_> = (0..req.limit)
            .map(|i| json!({ "id": format!("{}-{i}", req.page), "nombre": "x" }))
            .collect();
        Ok(json!(items))
    }

    fn name(&self) -> &'static str {
        "cancelling"
    }
}

#[tokio::test]
async fn cancel_during_loop_discards_result_but_io_completes() {
    let token = LivenessToken::new();
    let src = CancellingSource {
        token: token.clone(),
        cancel_after: 1,
        calls: AtomicUsize::new(0),
    };
    let out = fetch_live(&src, Collection::Careers, &FetchOptions::default(), &token).await;
    assert!(out.is_none());
    // the loop is not interrupted; it runs to its natural end
    assert_eq!(src.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn view_unmounted_mid_fetch_keeps_previous_snapshot() {
    let view = CollectionView::new(Collection::Careers);

    let first = CancellingSource {
        token: LivenessToken::new(),
        cancel_after: usize::MAX,
        calls: AtomicUsize::new(0),
    };
    assert!(view.load(&first, &FetchOptions::default()).await);
    let before = view.len();
    assert_eq!(before, 40);

    let second = CancellingSource {
        token: view.token(),
        cancel_after: 2,
        calls: AtomicUsize::new(0),
    };
    assert!(!view.load(&second, &FetchOptions::default()).await);
    assert_eq!(view.len(), before);
    assert!(!view.is_mounted());
}

#[tokio::test]
async fn live_token_publishes() {
    let token = LivenessToken::new();
    let src = CancellingSource {
        token: LivenessToken::new(),
        cancel_after: usize::MAX,
        calls: AtomicUsize::new(0),
    };
    let out = fetch_live(&src, Collection::Careers, &FetchOptions::default(), &token)
        .await
        .expect("published");
    assert_eq!(out.records.len(), 40);
}

/// One short page, served only after the gate opens.
struct GatedSource {
    gate: Notify,
    calls: AtomicUsize,
}

#[async_trait]
impl PageSource for GatedSource {
    async fn fetch_page(&self, _req: &PageRequest) -> Result<PageBody> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(json!([{ "id": 1, "nombre": "Medicina" }]))
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

#[tokio::test]
async fn overlapping_loads_run_a_single_loop() {
    let view = CollectionView::new(Collection::Careers);
    let src = GatedSource {
        gate: Notify::new(),
        calls: AtomicUsize::new(0),
    };
    let opts = FetchOptions::default();

    let (first, second, ()) = tokio::join!(view.load(&src, &opts), view.load(&src, &opts), async {
        tokio::task::yield_now().await;
        // the overlapping call has returned; the first loop still owns the flag
        assert!(view.is_loading());
        src.gate.notify_one();
    });

    assert!(first);
    assert!(!second);
    assert_eq!(src.calls.load(Ordering::SeqCst), 1);
    assert!(!view.is_loading());
    assert_eq!(view.len(), 1);

    // once finished, a new load may run again
    src.gate.notify_one();
    assert!(view.load(&src, &opts).await);
    assert_eq!(src.calls.load(Ordering::SeqCst), 2);
}
