//! End-to-end pipeline runs against an in-process site and catalog.

mod common;

use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;

use flyerscout::config::{NotAPdfPolicy, Settings};
use flyerscout::models::{RunOutcome, RunState, StrategyKind};
use flyerscout::scrapers::{SiteConfig, SiteProfile};
use flyerscout::services::{ingest_directory, Pipeline, PipelineEvent, PipelineOptions};
use flyerscout::storage::{INGEST_STATS_FILE, SCRAPE_STATS_FILE};

fn settings(data_dir: &Path, catalog_url: &str) -> Settings {
    let mut settings = Settings::with_data_dir(data_dir.to_path_buf());
    settings.catalog_url = catalog_url.to_string();
    settings.timeouts.api = Duration::from_secs(2);
    settings.timeouts.page = Duration::from_secs(5);
    settings.timeouts.download = Duration::from_secs(5);
    settings.timeouts.upload = Duration::from_secs(5);
    settings.request_delay = Duration::ZERO;
    settings
}

fn profile(seeds: Vec<String>, settings: &Settings) -> SiteProfile {
    SiteConfig {
        name: Some("Test Market".into()),
        seeds,
        store: Some("Test Market".into()),
        category: Some("supermarket".into()),
        cap: Some("00100".into()),
        request_delay_ms: Some(0),
        ..Default::default()
    }
    .into_profile("testsite", settings)
    .unwrap()
}

fn read_record(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_full_run_then_rerun_reports_duplicates() {
    let fixture = common::start().await;
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path(), &fixture.catalog_url());
    let site = profile(vec![fixture.url("/volantini")], &settings);

    let first = Pipeline::new(site.clone(), &settings, PipelineOptions::from_settings(&settings))
        .unwrap()
        .run()
        .await;

    assert_eq!(first.state, RunState::Completed);
    assert_eq!(first.stats.found, 6);
    assert_eq!(first.stats.downloaded, 3);
    // consent page and the byte-identical copy
    assert_eq!(first.stats.skipped, 2);
    // the missing PDF
    assert_eq!(first.stats.errors, 1);
    assert_eq!(first.stats.uploaded, 3);
    assert_eq!(first.stats.duplicates, 0);
    assert_eq!(first.outcome(), RunOutcome::Partial);

    let site_dir = dir.path().join("testsite");
    for name in ["vol1.pdf", "vol2.pdf", "vol3.pdf"] {
        assert!(site_dir.join(name).exists(), "{name} missing");
    }
    assert!(!site_dir.join("consenso.pdf").exists());
    assert!(!site_dir.join("vol1-copia.pdf").exists());
    assert_eq!(
        std::fs::read(site_dir.join("vol1.pdf")).unwrap(),
        common::FLYER_A
    );

    let uploads = fixture.uploads();
    assert_eq!(uploads.len(), 3);
    for upload in &uploads {
        assert_eq!(upload.store, "Test Market");
        assert_eq!(upload.category, "Supermercato");
        assert_eq!(upload.cap, "00100");
        assert_eq!(upload.source, "testsite");
    }

    let record = read_record(&first.record_path.clone().unwrap());
    assert_eq!(record["source"], "testsite");
    assert_eq!(record["state"], "completed");
    assert_eq!(record["run_id"], first.run_id.as_str());
    assert_eq!(record["stats"]["uploaded"], 3);
    assert_eq!(record["error_log"].as_array().unwrap().len(), 1);

    let second = Pipeline::new(site, &settings, PipelineOptions::from_settings(&settings))
        .unwrap()
        .run()
        .await;

    assert_eq!(second.state, RunState::Completed);
    assert_eq!(second.stats.uploaded, 0);
    assert_eq!(second.stats.duplicates, 3);
    assert_eq!(second.stats.errors, 1);
    assert_ne!(second.run_id, first.run_id);
    assert_eq!(fixture.uploads().len(), 6);

    let record = read_record(&site_dir.join(SCRAPE_STATS_FILE));
    assert_eq!(record["run_id"], second.run_id.as_str());
    assert_eq!(record["stats"]["duplicates"], 3);
}

#[tokio::test]
async fn test_download_only_never_contacts_catalog() {
    let fixture = common::start().await;
    let dir = tempfile::tempdir().unwrap();
    // Nothing listens on port 9; a health check or upload would fail.
    let settings = settings(dir.path(), "http://127.0.0.1:9/api");
    let site = profile(vec![fixture.url("/volantini")], &settings);

    let report = Pipeline::new(site, &settings, PipelineOptions::download_only())
        .unwrap()
        .run()
        .await;

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.stats.downloaded, 3);
    assert_eq!(report.stats.uploaded, 0);
    assert_eq!(report.stats.errors, 1);
    assert!(fixture.uploads().is_empty());
}

#[tokio::test]
async fn test_not_a_pdf_counted_as_error_by_policy() {
    let fixture = common::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(dir.path(), &fixture.catalog_url());
    settings.policy.not_a_pdf = NotAPdfPolicy::Error;
    let site = profile(vec![fixture.url("/volantini")], &settings);

    let report = Pipeline::new(site, &settings, PipelineOptions::download_only())
        .unwrap()
        .run()
        .await;

    assert_eq!(report.stats.skipped, 1);
    assert_eq!(report.stats.errors, 2);
    assert!(report
        .stats
        .error_log
        .iter()
        .any(|e| e.message.contains("consenso.pdf") && e.message.contains("text/html")));
}

#[tokio::test]
async fn test_unreachable_seeds_abort_run() {
    let fixture = common::start().await;
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path(), &fixture.catalog_url());
    let site = profile(
        vec![fixture.url("/chiuso"), fixture.url("/anche-chiuso")],
        &settings,
    );

    let report = Pipeline::new(site, &settings, PipelineOptions::from_settings(&settings))
        .unwrap()
        .run()
        .await;

    assert_eq!(report.state, RunState::Aborted);
    assert_eq!(report.outcome().exit_code(), 3);
    // two seed failures plus the abort itself
    assert_eq!(report.stats.errors, 3);
    assert!(report.fatal.unwrap().contains("none of the 2 seed pages"));

    let record = read_record(&report.record_path.unwrap());
    assert_eq!(record["state"], "aborted");
    assert_eq!(record["stats"]["found"], 0);
}

#[tokio::test]
async fn test_discover_only_and_events() {
    let fixture = common::start().await;
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path(), &fixture.catalog_url());
    let site = profile(vec![fixture.url("/volantini")], &settings);

    let mut pipeline = Pipeline::new(site.clone(), &settings, PipelineOptions::download_only()).unwrap();
    let (candidates, stats) = pipeline.discover_only().await.unwrap();
    assert_eq!(stats.found, 6);

    let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(urls[0], fixture.url("/promo/vol1.pdf"));
    assert!(urls.contains(&fixture.url("/cdn/vol2.pdf").as_str()));
    let vol3 = candidates
        .iter()
        .find(|c| c.url.ends_with("/promo/vol3.pdf"))
        .unwrap();
    assert_eq!(vol3.strategy, StrategyKind::SecondaryPage);
    assert_eq!(vol3.found_on, fixture.url("/offerte"));
    assert!(!dir.path().join("testsite").join("vol1.pdf").exists());

    let (tx, mut rx) = mpsc::channel(256);
    let report = Pipeline::new(site, &settings, PipelineOptions::download_only())
        .unwrap()
        .with_events(tx)
        .run()
        .await;
    assert_eq!(report.state, RunState::Completed);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::CandidatesFound { total: 6 })));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::Downloaded { .. }))
            .count(),
        3
    );
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::StateChanged {
            state: RunState::Completed,
            ..
        })
    ));
}

#[tokio::test]
async fn test_ingest_directory_uploads_distinct_pdfs() {
    let fixture = common::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lidl_volantino.pdf"), common::FLYER_A).unwrap();
    std::fs::write(dir.path().join("md-offerte.pdf"), common::FLYER_B).unwrap();
    std::fs::write(dir.path().join("ripetuto.pdf"), common::FLYER_A).unwrap();
    std::fs::write(dir.path().join("pagina.pdf"), common::CONSENT_PAGE).unwrap();
    std::fs::write(dir.path().join("note.txt"), "appunti").unwrap();
    let mut settings = settings(dir.path(), &fixture.catalog_url());
    settings.policy.fallback_cap = Some("20100".into());

    let report = ingest_directory(dir.path(), None, &settings, true)
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.site, "local");
    assert_eq!(report.stats.found, 4);
    assert_eq!(report.stats.uploaded, 2);
    assert_eq!(report.stats.skipped, 2);
    assert_eq!(report.stats.errors, 0);

    let mut stores: Vec<(String, String, String)> = fixture
        .uploads()
        .into_iter()
        .map(|u| (u.store, u.category, u.cap))
        .collect();
    stores.sort();
    assert_eq!(
        stores,
        vec![
            ("Lidl".to_string(), "Discount".to_string(), "20100".to_string()),
            ("MD".to_string(), "Discount".to_string(), "20100".to_string()),
        ]
    );

    let record = read_record(&dir.path().join(INGEST_STATS_FILE));
    assert_eq!(record["source"], "local");
    assert_eq!(record["stats"]["uploaded"], 2);
}

#[tokio::test]
async fn test_ingest_directory_paces_uploads() {
    let fixture = common::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.pdf"), common::FLYER_A).unwrap();
    std::fs::write(dir.path().join("b.pdf"), common::FLYER_B).unwrap();
    let mut settings = settings(dir.path(), &fixture.catalog_url());
    settings.request_delay = Duration::from_millis(400);

    let report = ingest_directory(dir.path(), None, &settings, false)
        .await
        .unwrap();
    assert_eq!(report.stats.uploaded, 2);

    let uploads = fixture.uploads();
    assert_eq!(uploads.len(), 2);
    let gap = uploads[1].received_at.duration_since(uploads[0].received_at);
    assert!(gap >= Duration::from_millis(300), "uploads only {gap:?} apart");
}

#[tokio::test]
async fn test_download_timeout_abandons_candidate_without_retry() {
    let fixture = common::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(dir.path(), &fixture.catalog_url());
    settings.timeouts.download = Duration::from_secs(1);
    let site = profile(vec![fixture.url("/lenta")], &settings);

    let report = Pipeline::new(site, &settings, PipelineOptions::download_only())
        .unwrap()
        .run()
        .await;

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.outcome(), RunOutcome::Partial);
    assert_eq!(report.stats.found, 3);
    assert_eq!(report.stats.downloaded, 2);
    assert_eq!(report.stats.errors, 1);
    assert!(report.stats.error_log[0].message.contains("lento.pdf"));
    assert_eq!(fixture.slow_hits(), 1);
    assert!(!dir.path().join("testsite").join("lento.pdf").exists());
}
