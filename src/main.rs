//! Simulation binary: drives the whole system against the in-memory seams.
//!
//! One page agent runs for `PAGESHADE_DOMAIN` while a control surface plays
//! through a panel session: toggle dark mode on, adjust settings, except and
//! un-except the domain, then an out-of-band store write turns dark mode off
//! again. Structured logs show both sides as the page converges.

use std::process;
use std::sync::Arc;

use serde_json::json;
use tokio::time::{Duration, sleep};
use tracing::{error, info};

use pageshade::agent::run_page_agent;
use pageshade::document::MemoryDocument;
use pageshade::domain::Domain;
use pageshade::engine::RenderEngine;
use pageshade::settings::SettingsPatch;
use pageshade::store::{MemoryStore, StoreError};
use pageshade::surface::ControlSurface;
use pageshade::tabs::{MemoryTabs, TabId};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let domain = env_string("PAGESHADE_DOMAIN", "news.example.com");
    let tab = env_parse("PAGESHADE_TAB", 1);

    if let Err(error) = run(&domain, tab).await {
        error!(error = %error, "simulation failed");
        process::exit(1);
    }
}

async fn run(domain: &str, tab: TabId) -> Result<(), StoreError> {
    let store = Arc::new(MemoryStore::new());
    let tabs = Arc::new(MemoryTabs::new());
    let document = MemoryDocument::new();

    tabs.open(tab, &format!("https://{domain}/"));
    tabs.set_active(tab);
    let mailbox = tabs.attach_agent(tab);

    let engine =
        RenderEngine::new(Domain::new(domain), store.clone(), Arc::new(document.clone()));
    let agent = tokio::spawn(run_page_agent(engine, mailbox));

    let mut surface = ControlSurface::new(store.clone(), tabs.clone(), tabs.clone());
    surface.on_mount().await?;

    let enabled = surface.toggle().await?;
    info!(enabled, "panel: toggled dark mode");
    observe_page(&document).await;

    let settings = surface
        .change_setting(SettingsPatch { contrast: Some(0.5), ..SettingsPatch::default() })
        .await?;
    info!(contrast = settings.contrast, "panel: contrast changed");
    let settings = surface
        .change_setting(SettingsPatch { brightness: Some(2.0), ..SettingsPatch::default() })
        .await?;
    info!(brightness = settings.brightness, "panel: brightness changed");
    observe_page(&document).await;

    surface.add_exception().await?;
    info!(%domain, "panel: excepted the active domain");
    observe_page(&document).await;

    surface.remove_exception().await?;
    info!(%domain, "panel: exception lifted");
    observe_page(&document).await;

    // A writer outside this process flips the flag. No command is involved;
    // the page follows the store alone.
    store.insert_raw("enabled", json!(false));
    info!("external writer disabled dark mode");
    observe_page(&document).await;

    tabs.close(tab);
    match agent.await {
        Ok(engine) => info!(state = ?engine.state(), "page agent finished"),
        Err(error) => error!(error = %error, "page agent task failed"),
    }

    Ok(())
}

/// Give the agent a moment to react, then log what the page looks like.
async fn observe_page(document: &MemoryDocument) {
    sleep(Duration::from_millis(50)).await;
    info!(
        markers = document.marker_count(),
        styles = document.style_count(),
        "page state"
    );
}

fn env_string(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or(default),
        Err(_) => default,
    }
}
