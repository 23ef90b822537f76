//! End-to-end convergence: page agents, a control surface mutating the
//! store, and commands riding on top.
//!
//! Every test wires the real in-memory seams together the way the
//! simulation binary does. The property under test throughout: each page
//! ends up at the state the store implies, with or without command
//! delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep, timeout};

use pageshade::agent::run_page_agent;
use pageshade::command::Command;
use pageshade::document::MemoryDocument;
use pageshade::domain::Domain;
use pageshade::engine::RenderEngine;
use pageshade::settings::{Settings, SettingsPatch};
use pageshade::store::{ChangeSet, ConfigStore, MemoryStore, StoreError, StoreKey, StoreRecord};
use pageshade::surface::ControlSurface;
use pageshade::tabs::{CommandChannel, MemoryTabs, TabId};

struct Page {
    document: MemoryDocument,
    handle: JoinHandle<RenderEngine>,
}

/// Open a tab, attach an agent to it, and spawn its event loop.
async fn open_page(
    store: Arc<dyn ConfigStore>,
    tabs: &Arc<MemoryTabs>,
    tab: TabId,
    domain: &str,
) -> Page {
    tabs.open(tab, &format!("https://{domain}/"));
    let mailbox = tabs.attach_agent(tab);
    let document = MemoryDocument::new();
    let engine = RenderEngine::new(Domain::new(domain), store, Arc::new(document.clone()));
    let handle = tokio::spawn(run_page_agent(engine, mailbox));
    Page { document, handle }
}

fn open_panel(store: &Arc<MemoryStore>, tabs: &Arc<MemoryTabs>) -> ControlSurface {
    ControlSurface::new(store.clone(), tabs.clone(), tabs.clone())
}

/// Poll until `pred` holds, failing the test after 500ms.
async fn settle(pred: impl Fn() -> bool) {
    timeout(Duration::from_millis(500), async {
        while !pred() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("page did not converge in time");
}

fn is_dark(document: &MemoryDocument) -> bool {
    document.marker_count() == 1 && document.style_count() == 1
}

fn is_light(document: &MemoryDocument) -> bool {
    document.marker_count() == 0
}

/// Store wrapper whose reads fail while the flag is set.
struct FlakyStore {
    inner: Arc<MemoryStore>,
    failing: AtomicBool,
}

impl FlakyStore {
    fn over(inner: Arc<MemoryStore>) -> Self {
        Self { inner, failing: AtomicBool::new(false) }
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigStore for FlakyStore {
    async fn get(&self, keys: &[StoreKey]) -> Result<StoreRecord, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected read failure".into()));
        }
        self.inner.get(keys).await
    }

    async fn set(&self, record: StoreRecord) -> Result<(), StoreError> {
        self.inner.set(record).await
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.inner.subscribe()
    }
}

// =============================================================
// Exceptions across pages
// =============================================================

#[tokio::test]
async fn excepted_domain_stays_light_while_others_darken() {
    let store = Arc::new(MemoryStore::new());
    let tabs = Arc::new(MemoryTabs::new());
    store
        .set(StoreRecord {
            enabled: Some(true),
            settings: Some(Settings::default()),
            exceptions: Some(["news.example.com"].into_iter().collect()),
        })
        .await
        .unwrap();

    let excepted = open_page(store.clone(), &tabs, 1, "news.example.com").await;
    let other = open_page(store.clone(), &tabs, 2, "other.com").await;

    let doc = other.document.clone();
    settle(move || is_dark(&doc)).await;

    sleep(Duration::from_millis(50)).await;
    assert!(is_light(&excepted.document));
}

#[tokio::test]
async fn excepting_a_domain_from_the_panel_lifts_its_styles() {
    let store = Arc::new(MemoryStore::new());
    let tabs = Arc::new(MemoryTabs::new());
    store.insert_raw("enabled", json!(true));

    let page = open_page(store.clone(), &tabs, 1, "news.example.com").await;
    tabs.set_active(1);
    let doc = page.document.clone();
    settle(move || is_dark(&doc)).await;

    let mut panel = open_panel(&store, &tabs);
    panel.on_mount().await.unwrap();
    panel.add_exception().await.unwrap();

    let doc = page.document.clone();
    settle(move || is_light(&doc)).await;

    panel.remove_exception().await.unwrap();
    let doc = page.document.clone();
    settle(move || is_dark(&doc)).await;
}

// =============================================================
// Store-only convergence
// =============================================================

#[tokio::test]
async fn toggle_reaches_the_inactive_page_through_the_store_alone() {
    let store = Arc::new(MemoryStore::new());
    let tabs = Arc::new(MemoryTabs::new());

    let active = open_page(store.clone(), &tabs, 1, "example.com").await;
    let background = open_page(store.clone(), &tabs, 2, "other.com").await;
    tabs.set_active(1);

    let mut panel = open_panel(&store, &tabs);
    panel.on_mount().await.unwrap();
    assert!(panel.toggle().await.unwrap());

    // The command goes to tab 1 only; tab 2 converges off the store feed.
    let doc = active.document.clone();
    settle(move || is_dark(&doc)).await;
    let doc = background.document.clone();
    settle(move || is_dark(&doc)).await;
}

#[tokio::test]
async fn settings_change_reaches_every_open_page() {
    let store = Arc::new(MemoryStore::new());
    let tabs = Arc::new(MemoryTabs::new());
    store.insert_raw("enabled", json!(true));

    let first = open_page(store.clone(), &tabs, 1, "example.com").await;
    let second = open_page(store.clone(), &tabs, 2, "other.com").await;
    tabs.set_active(1);

    let doc = first.document.clone();
    settle(move || is_dark(&doc)).await;
    let doc = second.document.clone();
    settle(move || is_dark(&doc)).await;

    let mut panel = open_panel(&store, &tabs);
    panel.on_mount().await.unwrap();
    panel
        .change_setting(SettingsPatch { contrast: Some(0.5), ..SettingsPatch::default() })
        .await
        .unwrap();

    for page in [&first, &second] {
        let doc = page.document.clone();
        settle(move || {
            doc.style_text("pageshade-style").is_some_and(|css| css.contains("contrast(0.5)"))
        })
        .await;
    }
}

#[tokio::test]
async fn late_page_adopts_the_persisted_state_on_load() {
    let store = Arc::new(MemoryStore::new());
    let tabs = Arc::new(MemoryTabs::new());
    store
        .set(StoreRecord {
            enabled: Some(true),
            settings: Some(Settings { brightness: 2.0, contrast: 0.5, grayscale: 0.0 }),
            exceptions: None,
        })
        .await
        .unwrap();

    let page = open_page(store.clone(), &tabs, 7, "late.example.com").await;

    let doc = page.document.clone();
    settle(move || is_dark(&doc)).await;
    let css = page.document.style_text("pageshade-style").unwrap();
    assert!(css.contains("invert(1) hue-rotate(180deg) brightness(2) contrast(0.5) grayscale(0)"));
}

// =============================================================
// Commands and staleness
// =============================================================

#[tokio::test]
async fn a_stale_command_is_reconciled_by_the_next_store_write() {
    let store = Arc::new(MemoryStore::new());
    let tabs = Arc::new(MemoryTabs::new());

    let page = open_page(store.clone(), &tabs, 1, "example.com").await;
    sleep(Duration::from_millis(50)).await;
    assert!(is_light(&page.document));

    // A command claims dark mode is on; the store never agreed.
    tabs.send(1, &Command::Toggle { enabled: true }).await;
    let doc = page.document.clone();
    settle(move || is_dark(&doc)).await;

    // The next store write replays the truth through the re-fetch path.
    store.insert_raw("settings", json!({"brightness": 1.0, "contrast": 1.0, "grayscale": 0.0}));
    let doc = page.document.clone();
    settle(move || is_light(&doc)).await;
}

#[tokio::test]
async fn a_full_panel_session_converges_the_active_page() {
    let store = Arc::new(MemoryStore::new());
    let tabs = Arc::new(MemoryTabs::new());

    let page = open_page(store.clone(), &tabs, 1, "example.com").await;
    tabs.set_active(1);

    let mut panel = open_panel(&store, &tabs);
    panel.on_mount().await.unwrap();

    assert!(panel.toggle().await.unwrap());
    let doc = page.document.clone();
    settle(move || is_dark(&doc)).await;

    panel
        .change_setting(SettingsPatch { contrast: Some(0.5), ..SettingsPatch::default() })
        .await
        .unwrap();
    panel
        .change_setting(SettingsPatch { brightness: Some(2.0), ..SettingsPatch::default() })
        .await
        .unwrap();

    let doc = page.document.clone();
    settle(move || {
        doc.style_text("pageshade-style")
            .is_some_and(|css| css.contains("brightness(2) contrast(0.5) grayscale(0)"))
    })
    .await;

    assert!(!panel.toggle().await.unwrap());
    let doc = page.document.clone();
    settle(move || is_light(&doc)).await;
}

// =============================================================
// Robustness
// =============================================================

#[tokio::test]
async fn a_page_with_failing_reads_catches_up_once_the_store_heals() {
    let inner = Arc::new(MemoryStore::new());
    let store = Arc::new(FlakyStore::over(inner.clone()));
    let tabs = Arc::new(MemoryTabs::new());
    inner.insert_raw("enabled", json!(true));

    let page = open_page(store.clone(), &tabs, 1, "example.com").await;
    let doc = page.document.clone();
    settle(move || is_dark(&doc)).await;

    // Reads start failing; a write lands that the page cannot see yet.
    store.set_failing(true);
    inner.insert_raw("enabled", json!(false));
    sleep(Duration::from_millis(50)).await;
    assert!(is_dark(&page.document));

    // Reads heal; the next write converges the page on the missed state.
    store.set_failing(false);
    inner.insert_raw("settings", json!({"brightness": 1.0, "contrast": 1.0, "grayscale": 0.0}));
    let doc = page.document.clone();
    settle(move || is_light(&doc)).await;
}

#[tokio::test]
async fn closing_the_tab_stops_its_agent() {
    let store = Arc::new(MemoryStore::new());
    let tabs = Arc::new(MemoryTabs::new());

    let page = open_page(store.clone(), &tabs, 1, "example.com").await;
    tabs.close(1);

    let engine = timeout(Duration::from_millis(500), page.handle)
        .await
        .expect("agent did not stop")
        .expect("agent task panicked");
    assert_eq!(engine.domain().as_str(), "example.com");
}
