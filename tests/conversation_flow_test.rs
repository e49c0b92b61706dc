mod common;

use common::TestApp;
use printdesk_api::entities::{order, session};
use sea_orm::EntityTrait;

const PHONE: &str = "whatsapp:+15550001111";

async fn session_state(app: &TestApp) -> String {
    session::Entity::find()
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("session exists")
        .state
}

#[tokio::test]
async fn full_order_conversation() {
    let app = TestApp::spawn().await;

    let reply = app.send_chat_message(PHONE, "hi", None).await;
    assert!(reply.contains("Welcome"), "greeting: {}", reply);
    assert_eq!(session_state(&app).await, "AWAITING_FILE");

    let reply = app
        .send_chat_message(PHONE, "", Some("application/pdf"))
        .await;
    assert!(reply.contains("upload.pdf"), "file ack: {}", reply);
    assert_eq!(session_state(&app).await, "AWAITING_PRINT_TYPE");

    let reply = app.send_chat_message(PHONE, "2", None).await;
    assert!(reply.contains("How many copies"), "copies prompt: {}", reply);
    assert_eq!(session_state(&app).await, "AWAITING_COPIES");

    let reply = app.send_chat_message(PHONE, "3", None).await;
    assert!(reply.contains("Black & White"), "summary: {}", reply);
    // 1 page x 3 copies x 2.00
    assert!(reply.contains("6.00"), "total in summary: {}", reply);
    assert!(reply.contains("https://pay.test/"), "link: {}", reply);
    assert_eq!(session_state(&app).await, "AWAITING_PAYMENT");

    let orders = order::Entity::find().all(&*app.state.db).await.unwrap();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.status, "PAYMENT_PENDING");
    assert_eq!(order.copies, 3);
    assert_eq!(order.print_type.as_deref(), Some("BW"));
    assert!(order.payment_link_id.as_deref().unwrap().starts_with("plink_test_"));
}

#[tokio::test]
async fn file_first_skips_the_greeting_state() {
    let app = TestApp::spawn().await;

    let reply = app
        .send_chat_message(PHONE, "", Some("application/pdf"))
        .await;
    assert!(reply.contains("How would you like it printed"), "{}", reply);
    assert_eq!(session_state(&app).await, "AWAITING_PRINT_TYPE");
}

#[tokio::test]
async fn invalid_selections_reprompt_without_state_change() {
    let app = TestApp::spawn().await;
    app.send_chat_message(PHONE, "", Some("application/pdf"))
        .await;

    let reply = app.send_chat_message(PHONE, "purple", None).await;
    assert!(reply.contains("didn't catch that"), "{}", reply);
    assert_eq!(session_state(&app).await, "AWAITING_PRINT_TYPE");

    app.send_chat_message(PHONE, "color", None).await;
    assert_eq!(session_state(&app).await, "AWAITING_COPIES");

    for bad in ["0", "101", "lots", "-2"] {
        let reply = app.send_chat_message(PHONE, bad, None).await;
        assert!(reply.contains("between 1 and 100"), "{}: {}", bad, reply);
        assert_eq!(session_state(&app).await, "AWAITING_COPIES");
    }
}

#[tokio::test]
async fn unsupported_media_is_rejected() {
    let app = TestApp::spawn().await;
    app.send_chat_message(PHONE, "hi", None).await;

    let reply = app.send_chat_message(PHONE, "", Some("video/mp4")).await;
    assert!(reply.contains("isn't supported"), "{}", reply);
    assert_eq!(session_state(&app).await, "AWAITING_FILE");
}

#[tokio::test]
async fn cancel_only_works_while_payment_is_pending() {
    let app = TestApp::spawn().await;
    app.send_chat_message(PHONE, "", Some("application/pdf"))
        .await;
    app.send_chat_message(PHONE, "1", None).await;
    assert_eq!(session_state(&app).await, "AWAITING_COPIES");

    // Before a payment link exists, "cancel" is just an invalid copy count.
    let reply = app.send_chat_message(PHONE, "CANCEL", None).await;
    assert!(reply.contains("between 1 and 100"), "{}", reply);
    assert_eq!(session_state(&app).await, "AWAITING_COPIES");

    app.send_chat_message(PHONE, "2", None).await;
    assert_eq!(session_state(&app).await, "AWAITING_PAYMENT");

    let reply = app.send_chat_message(PHONE, "cancel", None).await;
    assert!(reply.contains("cancelled"), "{}", reply);
    assert_eq!(session_state(&app).await, "IDLE");

    // The pending order stays payable; only the conversation resets.
    let orders = order::Entity::find().all(&*app.state.db).await.unwrap();
    assert_eq!(orders[0].status, "PAYMENT_PENDING");

    // The flow starts cleanly afterwards.
    let reply = app.send_chat_message(PHONE, "hello", None).await;
    assert!(reply.contains("Welcome"), "{}", reply);
}

#[tokio::test]
async fn pending_payment_reminds_on_text_but_a_new_file_starts_over() {
    let app = TestApp::spawn().await;
    app.conversation_to_payment(PHONE).await;

    let reply = app.send_chat_message(PHONE, "did it work?", None).await;
    assert!(reply.contains("still pending"), "{}", reply);
    assert!(reply.contains("https://pay.test/"), "{}", reply);
    assert_eq!(session_state(&app).await, "AWAITING_PAYMENT");

    // A new document abandons the pending payment and restarts the flow.
    let reply = app
        .send_chat_message(PHONE, "", Some("application/pdf"))
        .await;
    assert!(reply.contains("How would you like it printed"), "{}", reply);
    assert_eq!(session_state(&app).await, "AWAITING_PRINT_TYPE");
}

#[tokio::test]
async fn webhook_verification_challenge() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    let app = TestApp::spawn().await;

    let response = app
        .request(
            Request::get("/webhooks/chat?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=12345")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::body_string(response).await, "12345");

    let response = app
        .request(
            Request::get("/webhooks/chat?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=12345")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn payment_provider_failure_keeps_copies_state() {
    let app = TestApp::spawn().await;
    app.send_chat_message(PHONE, "", Some("application/pdf"))
        .await;
    app.send_chat_message(PHONE, "both", None).await;

    app.payment_links
        .fail
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let reply = app.send_chat_message(PHONE, "2", None).await;
    assert!(reply.contains("went wrong"), "{}", reply);
    assert_eq!(session_state(&app).await, "AWAITING_COPIES");

    // Retry succeeds once the provider recovers.
    app.payment_links
        .fail
        .store(false, std::sync::atomic::Ordering::SeqCst);
    let reply = app.send_chat_message(PHONE, "2", None).await;
    assert!(reply.contains("https://pay.test/"), "{}", reply);
    assert_eq!(session_state(&app).await, "AWAITING_PAYMENT");

    // BOTH pricing: 1 page x 2 copies x (2.00 + 10.00).
    assert!(reply.contains("24.00"), "{}", reply);
}
