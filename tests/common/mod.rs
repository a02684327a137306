//! In-process retailer site and catalog service for pipeline tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use flyerscout::models::Artifact;

pub const FLYER_A: &[u8] = b"%PDF-1.4 volantino settimanale A";
pub const FLYER_B: &[u8] = b"%PDF-1.4 volantino B";
pub const FLYER_C: &[u8] = b"%PDF-1.7 offerte C";
/// How long `/promo/lento.pdf` stalls before answering.
pub const SLOW_RESPONSE: Duration = Duration::from_secs(3);
pub const CONSENT_PAGE: &str =
    "<!DOCTYPE html><html><body>Accetta i cookie per continuare</body></html>";

/// One multipart upload as the catalog received it.
#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub filename: String,
    pub fingerprint: String,
    pub store: String,
    pub category: String,
    pub cap: String,
    pub source: String,
    pub received_at: Instant,
}

#[derive(Default)]
struct CatalogState {
    known: HashSet<String>,
    uploads: Vec<ReceivedUpload>,
}

/// Handle to a running fixture server.
#[derive(Clone)]
pub struct Fixture {
    pub base: String,
    catalog: Arc<Mutex<CatalogState>>,
    slow_hits: Arc<AtomicUsize>,
}

impl Fixture {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn catalog_url(&self) -> String {
        self.url("/api")
    }

    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.catalog.lock().unwrap().uploads.clone()
    }

    /// Requests that reached the stalling PDF route.
    pub fn slow_hits(&self) -> usize {
        self.slow_hits.load(Ordering::SeqCst)
    }
}

fn seed_page(base: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Volantini</title></head>
<body>
  <nav><a href="/offerte">Offerte della settimana</a> <a href="/contatti">Contatti</a></nav>
  <a href="/promo/vol1.pdf">Volantino</a>
  <a href="/consenso.pdf">Scarica</a>
  <a href="/promo/missing.pdf">Archivio</a>
  <a href="{base}/promo/vol1-copia.pdf">Copia</a>
  <iframe src="{base}/cdn/vol2.pdf"></iframe>
</body>
</html>"#
    )
}

const SECONDARY_PAGE: &str = r#"<html><body>
  <a href="/promo/vol3.pdf">Sfoglia</a>
  <a href="/promo/vol1.pdf">Volantino</a>
</body></html>"#;

/// A page whose first flyer stalls past any sane download timeout.
const SLOW_PAGE: &str = r#"<html><body>
  <a href="/promo/lento.pdf">Volantino lento</a>
  <a href="/promo/vol1.pdf">Volantino</a>
  <a href="/cdn/vol2.pdf">Extra</a>
</body></html>"#;

async fn slow_pdf(State(fixture): State<Fixture>) -> impl IntoResponse {
    fixture.slow_hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(SLOW_RESPONSE).await;
    pdf(FLYER_C)
}

fn pdf(bytes: &'static [u8]) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/pdf")], bytes)
}

async fn upload(State(fixture): State<Fixture>, mut multipart: Multipart) -> Json<serde_json::Value> {
    let mut received = ReceivedUpload {
        filename: String::new(),
        fingerprint: String::new(),
        store: String::new(),
        category: String::new(),
        cap: String::new(),
        source: String::new(),
        received_at: Instant::now(),
    };

    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "pdfs" {
            received.filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap();
            received.fingerprint = Artifact::compute_fingerprint(&bytes);
            continue;
        }
        let text = field.text().await.unwrap();
        match name.as_str() {
            "store" => received.store = text,
            "category" => received.category = text,
            "location.cap" => received.cap = text,
            "source" => received.source = text,
            _ => {}
        }
    }

    received.received_at = Instant::now();
    let mut state = fixture.catalog.lock().unwrap();
    let is_new = state.known.insert(received.fingerprint.clone());
    state.uploads.push(received);
    let id = state.uploads.len();

    if is_new {
        Json(json!({
            "success": true,
            "message": "1 volantino creato",
            "data": {
                "totalFlyersCreated": 1,
                "totalDuplicatesSkipped": 0,
                "uploadedFiles": 1,
                "createdFlyers": [{ "flyerId": format!("flyer-{}", id) }]
            }
        }))
    } else {
        Json(json!({
            "success": true,
            "message": "Nessun nuovo volantino",
            "data": {
                "totalFlyersCreated": 0,
                "totalDuplicatesSkipped": 1,
                "uploadedFiles": 1
            }
        }))
    }
}

/// Start the site and catalog on one ephemeral port.
pub async fn start() -> Fixture {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let fixture = Fixture {
        base: format!("http://{}", addr),
        catalog: Arc::new(Mutex::new(CatalogState::default())),
        slow_hits: Arc::new(AtomicUsize::new(0)),
    };

    let page = seed_page(&fixture.base);
    let app = Router::new()
        .route("/volantini", get(move || async move { Html(page) }))
        .route("/offerte", get(|| async { Html(SECONDARY_PAGE) }))
        .route("/promo/vol1.pdf", get(|| async { pdf(FLYER_A) }))
        .route("/promo/vol1-copia.pdf", get(|| async { pdf(FLYER_A) }))
        .route("/cdn/vol2.pdf", get(|| async { pdf(FLYER_B) }))
        .route("/promo/vol3.pdf", get(|| async { pdf(FLYER_C) }))
        .route("/lenta", get(|| async { Html(SLOW_PAGE) }))
        .route("/promo/lento.pdf", get(slow_pdf))
        .route("/consenso.pdf", get(|| async { Html(CONSENT_PAGE) }))
        .route("/health", get(|| async { "ok" }))
        .route("/api/pdfs/upload", post(upload))
        .with_state(fixture.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    fixture
}
