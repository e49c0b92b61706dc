#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use printdesk_api::config::AppConfig;
use printdesk_api::db::{establish_connection_with_config, DbConfig};
use printdesk_api::errors::ServiceError;
use printdesk_api::events::event_channel;
use printdesk_api::message_queue::InMemoryPrintQueue;
use printdesk_api::migrator::Migrator;
use printdesk_api::services::chat::{ChatProvider, MediaDownload};
use printdesk_api::services::payment_links::{
    PaymentLink, PaymentLinkProvider, PaymentLinkRequest,
};
use printdesk_api::services::payments::sign_payload;
use printdesk_api::{app_router, build_app_state, AppState};
use rust_decimal_macros::dec;
use sea_orm_migration::MigratorTrait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

pub const WORKER_API_KEY: &str = "worker-secret-key-for-tests";
pub const WEBHOOK_SECRET: &str = "webhook-secret-for-tests";

/// Chat double that records outbound messages and serves a canned PDF
/// for media downloads.
pub struct MockChatProvider {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl MockChatProvider {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn send_message(&self, to: &str, body: &str) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }

    async fn download_media(&self, _media_url: &str) -> Result<MediaDownload, ServiceError> {
        Ok(MediaDownload {
            bytes: bytes::Bytes::from_static(b"%PDF-1.4 test document"),
            content_type: "application/pdf".to_string(),
            file_name: Some("upload.pdf".to_string()),
        })
    }
}

/// Payment link double issuing deterministic link ids.
pub struct MockPaymentLinkProvider {
    counter: AtomicU32,
    pub fail: AtomicBool,
}

impl MockPaymentLinkProvider {
    pub fn new() -> Self {
        Self {
            counter: AtomicU32::new(0),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PaymentLinkProvider for MockPaymentLinkProvider {
    async fn create_payment_link(
        &self,
        _request: PaymentLinkRequest,
    ) -> Result<PaymentLink, ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::ExternalServiceError(
                "payment provider unavailable".into(),
            ));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentLink {
            id: format!("plink_test_{}", n),
            url: format!("https://pay.test/plink_test_{}", n),
        })
    }
}

/// Full application wired against sqlite, an in-memory queue, and the
/// mock providers.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub chat: Arc<MockChatProvider>,
    pub payment_links: Arc<MockPaymentLinkProvider>,
    pub queue: Arc<InMemoryPrintQueue>,
    _scratch: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let scratch = tempfile::tempdir().expect("create temp dir");
        let db_path = scratch.path().join("test.db");
        let storage_path = scratch.path().join("uploads");

        let db_config = DbConfig {
            url: format!("sqlite://{}?mode=rwc", db_path.display()),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let db = establish_connection_with_config(&db_config)
            .await
            .expect("connect to sqlite");
        Migrator::up(&db, None).await.expect("run migrations");

        let config = Arc::new(AppConfig {
            database_url: db_config.url.clone(),
            redis_url: "redis://unused".into(),
            host: "127.0.0.1".into(),
            port: 0,
            environment: "test".into(),
            log_level: "info".into(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: 1,
            db_min_connections: 1,
            queue_backend: "in-memory".into(),
            queue_name: "print_queue".into(),
            queue_block_timeout_secs: 1,
            worker_api_key: WORKER_API_KEY.into(),
            payment_webhook_secret: WEBHOOK_SECRET.into(),
            payment_api_base: "https://pay.test".into(),
            payment_key_id: None,
            payment_key_secret: None,
            chat_account_sid: None,
            chat_auth_token: None,
            chat_from_number: None,
            chat_verify_token: Some("verify-me".into()),
            public_base_url: "http://localhost:8080".into(),
            file_storage_path: storage_path.to_string_lossy().into_owned(),
            price_per_page_bw: dec!(2.00),
            price_per_page_color: dec!(10.00),
            default_shop_id: None,
            session_timeout_minutes: 30,
        });

        let chat = Arc::new(MockChatProvider::new());
        let payment_links = Arc::new(MockPaymentLinkProvider::new());
        let queue = Arc::new(InMemoryPrintQueue::new());
        let (event_sender, event_rx) = event_channel(256);
        tokio::spawn(printdesk_api::events::process_events(event_rx));

        let state = build_app_state(
            config,
            Arc::new(db),
            queue.clone(),
            chat.clone(),
            payment_links.clone(),
            Arc::new(event_sender),
        );
        let router = app_router(state.clone());

        Self {
            state,
            router,
            chat,
            payment_links,
            queue,
            _scratch: scratch,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router never fails")
    }

    /// Posts an inbound chat message the way the provider would and
    /// returns the reply text extracted from the TwiML body.
    pub async fn send_chat_message(&self, from: &str, body: &str, media: Option<&str>) -> String {
        let mut form = format!(
            "From={}&Body={}",
            urlencode(from),
            urlencode(body)
        );
        if let Some(content_type) = media {
            form.push_str(&format!(
                "&NumMedia=1&MediaUrl0={}&MediaContentType0={}",
                urlencode("https://media.test/item0"),
                urlencode(content_type)
            ));
        }

        let response = self
            .request(
                Request::post("/webhooks/chat")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(form))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let xml = body_string(response).await;
        extract_twiml_message(&xml)
    }

    /// Posts a signed payment webhook delivery.
    pub async fn send_payment_webhook(
        &self,
        payload: &serde_json::Value,
        signature: Option<&str>,
    ) -> Response<Body> {
        let body = serde_json::to_vec(payload).unwrap();
        let mut builder =
            Request::post("/webhooks/payments").header(header::CONTENT_TYPE, "application/json");
        if let Some(signature) = signature {
            builder = builder.header("X-Razorpay-Signature", signature);
        }
        self.request(builder.body(Body::from(body)).unwrap()).await
    }

    /// Runs the happy conversation up to the payment link and returns
    /// the issued payment link id.
    pub async fn conversation_to_payment(&self, phone: &str) -> String {
        self.send_chat_message(phone, "hi", None).await;
        self.send_chat_message(phone, "", Some("application/pdf"))
            .await;
        self.send_chat_message(phone, "2", None).await;
        let reply = self.send_chat_message(phone, "3", None).await;
        assert!(reply.contains("https://pay.test/"), "reply: {}", reply);

        let start = reply.find("plink_test_").expect("payment link id in reply");
        reply[start..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect()
    }

    /// A well-formed paid event for a payment link.
    pub fn paid_event(&self, event_id: &str, payment_link_id: &str, amount_minor: i64) -> serde_json::Value {
        serde_json::json!({
            "id": event_id,
            "event": "payment_link.paid",
            "payload": {
                "payment_link": {
                    "entity": { "id": payment_link_id, "amount": amount_minor }
                },
                "payment": {
                    "entity": { "id": format!("pay_{}", event_id), "amount": amount_minor }
                }
            }
        })
    }

    pub fn sign(&self, payload: &serde_json::Value) -> String {
        sign_payload(WEBHOOK_SECRET, &serde_json::to_vec(payload).unwrap())
    }
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).expect("json body")
}

fn extract_twiml_message(xml: &str) -> String {
    let start = xml.find("<Message>").map(|i| i + "<Message>".len());
    let end = xml.find("</Message>");
    match (start, end) {
        (Some(start), Some(end)) => unescape_xml(&xml[start..end]),
        _ => panic!("no <Message> in TwiML: {}", xml),
    }
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub fn urlencode(text: &str) -> String {
    let mut out = String::new();
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}
