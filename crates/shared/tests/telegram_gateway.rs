use std::collections::VecDeque;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use shared::config::BotConfig;
use shared::gateway::FailureClass;
use shared::telegram::TelegramGateway;
use shared::{AckControl, GatewayError, MessagingGateway, OutgoingMessage};
use shared::models::{ChannelId, MessageHandle};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

const TEST_TOKEN: &str = "test-token";

#[derive(Debug, Clone)]
struct MockReply {
    status: StatusCode,
    body: Value,
}

#[derive(Debug, Clone)]
struct TestServerState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    seen_calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl TestServerState {
    fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            seen_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[tokio::test]
async fn send_message_posts_keyboard_and_returns_delivered_message() {
    let state = TestServerState::with_replies(vec![ok_reply(json!({
        "message_id": 501,
        "chat": { "id": 42 }
    }))]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = TelegramGateway::new(&config_for(base_url)).expect("gateway should build");
    let delivered = gateway
        .send_message(
            &ChannelId::new("42"),
            OutgoingMessage::text("01.01.2030 09:00").with_control(AckControl::done_or_not_done()),
        )
        .await
        .expect("send should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(delivered.handle, MessageHandle(501));
    assert_eq!(delivered.channel, ChannelId::from(42_i64));
    let seen_calls = state.seen_calls.lock().await.clone();
    assert_eq!(seen_calls.len(), 1);
    let (path, payload) = &seen_calls[0];
    assert_eq!(path, "sendMessage");
    assert_eq!(payload["chat_id"], 42);
    assert_eq!(payload["text"], "01.01.2030 09:00");
    assert_eq!(
        payload["reply_markup"]["inline_keyboard"][1][0]["callback_data"],
        "not_done"
    );
}

#[tokio::test]
async fn delivered_channel_is_the_chat_telegram_resolved() {
    let state = TestServerState::with_replies(vec![
        ok_reply(json!({ "message_id": 601, "chat": { "id": 42 } })),
        ok_reply(json!({ "message_id": 602, "chat": { "id": 42 } })),
    ]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = TelegramGateway::new(&config_for(base_url)).expect("gateway should build");
    let by_username = gateway
        .send_message(&ChannelId::new("@ivan_petrov"), OutgoingMessage::text("hello"))
        .await
        .expect("send by username should succeed");
    let by_padded_id = gateway
        .send_message(&ChannelId::new("042"), OutgoingMessage::text("hello"))
        .await
        .expect("send by padded id should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(by_username.channel, ChannelId::from(42_i64));
    assert_eq!(by_padded_id.channel, ChannelId::from(42_i64));
    let seen_calls = state.seen_calls.lock().await.clone();
    assert_eq!(seen_calls[0].1["chat_id"], "@ivan_petrov");
    assert_eq!(seen_calls[1].1["chat_id"], 42);
}

#[tokio::test]
async fn delete_and_answer_use_their_own_methods() {
    let state = TestServerState::with_replies(vec![ok_reply(json!(true)), ok_reply(json!(true))]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = TelegramGateway::new(&config_for(base_url)).expect("gateway should build");
    gateway
        .delete_message(&ChannelId::new("42"), MessageHandle(501))
        .await
        .expect("delete should succeed");
    gateway
        .answer_interaction("cbq-1", None)
        .await
        .expect("answer should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    let seen_calls = state.seen_calls.lock().await.clone();
    assert_eq!(seen_calls[0].0, "deleteMessage");
    assert_eq!(seen_calls[0].1, json!({ "chat_id": 42, "message_id": 501 }));
    assert_eq!(seen_calls[1].0, "answerCallbackQuery");
    assert_eq!(seen_calls[1].1, json!({ "callback_query_id": "cbq-1" }));
}

#[tokio::test]
async fn rate_limited_calls_are_transient_and_not_retried() {
    let state = TestServerState::with_replies(vec![error_reply(
        StatusCode::TOO_MANY_REQUESTS,
        "Too Many Requests: retry after 5",
    )]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = TelegramGateway::new(&config_for(base_url)).expect("gateway should build");
    let err = gateway
        .send_message(&ChannelId::new("42"), OutgoingMessage::text("hello"))
        .await
        .expect_err("rate limit should fail");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(err.class(), FailureClass::Transient);
    assert!(
        matches!(&err, GatewayError::Transient { code, .. } if code == "TELEGRAM_HTTP_429"),
        "unexpected error: {err}"
    );
    assert_eq!(state.seen_calls.lock().await.len(), 1);
}

#[tokio::test]
async fn unknown_chat_is_a_permanent_failure() {
    let state = TestServerState::with_replies(vec![error_reply(
        StatusCode::BAD_REQUEST,
        "Bad Request: chat not found",
    )]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = TelegramGateway::new(&config_for(base_url)).expect("gateway should build");
    let err = gateway
        .send_message(&ChannelId::new("not-a-chat"), OutgoingMessage::text("hello"))
        .await
        .expect_err("unknown chat should fail");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(err.class(), FailureClass::Permanent);
    assert!(err.to_string().contains("chat not found"));
    assert!(!err.to_string().contains(TEST_TOKEN));
}

#[tokio::test]
async fn get_updates_passes_offset_and_decodes_updates() {
    let state = TestServerState::with_replies(vec![ok_reply(json!([
        {
            "update_id": 900,
            "message": {
                "message_id": 1,
                "chat": { "id": 7 },
                "from": { "id": 7, "first_name": "Olga" },
                "text": "/start"
            }
        },
        {
            "update_id": 901,
            "callback_query": {
                "id": "cbq-9",
                "from": { "id": 42, "first_name": "Ivan" },
                "message": { "message_id": 501, "chat": { "id": 42 } },
                "data": "done"
            }
        }
    ]))]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = TelegramGateway::new(&config_for(base_url)).expect("gateway should build");
    let updates = gateway
        .get_updates(Some(900), 0)
        .await
        .expect("updates should decode");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(
        updates.iter().map(|update| update.update_id).collect::<Vec<_>>(),
        vec![900, 901]
    );
    assert_eq!(
        updates[1]
            .callback_query
            .as_ref()
            .and_then(|query| query.data.as_deref()),
        Some("done")
    );
    let seen_calls = state.seen_calls.lock().await.clone();
    assert_eq!(seen_calls[0].0, "getUpdates");
    assert_eq!(seen_calls[0].1["offset"], 900);
    assert_eq!(seen_calls[0].1["timeout"], 0);
}

#[tokio::test]
async fn skip_pending_updates_resumes_after_last_update() {
    let state = TestServerState::with_replies(vec![ok_reply(json!([{ "update_id": 77 }]))]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = TelegramGateway::new(&config_for(base_url)).expect("gateway should build");
    let offset = gateway
        .skip_pending_updates()
        .await
        .expect("skip should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(offset, Some(78));
    assert_eq!(state.seen_calls.lock().await[0].1["offset"], -1);
}

fn config_for(base_url: String) -> BotConfig {
    BotConfig {
        telegram_bot_token: TEST_TOKEN.to_string(),
        telegram_api_base_url: base_url,
        poll_timeout_seconds: 0,
        http_timeout_ms: 5_000,
        skip_pending_updates: false,
        poll_retry_base_seconds: 1,
        poll_retry_max_seconds: 1,
    }
}

fn ok_reply(result: Value) -> MockReply {
    MockReply {
        status: StatusCode::OK,
        body: json!({ "ok": true, "result": result }),
    }
}

fn error_reply(status: StatusCode, description: &str) -> MockReply {
    MockReply {
        status,
        body: json!({
            "ok": false,
            "error_code": status.as_u16(),
            "description": description
        }),
    }
}

async fn spawn_test_server(
    state: TestServerState,
) -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route(&format!("/bot{TEST_TOKEN}/{{method}}"), post(test_method_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let local_addr = listener
        .local_addr()
        .expect("listener address should resolve");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server_task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        server.await.expect("test server should run");
    });

    (format!("http://{local_addr}"), shutdown_tx, server_task)
}

async fn test_method_handler(
    State(state): State<TestServerState>,
    Path(method): Path<String>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.seen_calls.lock().await.push((method, payload));

    let reply = state.replies.lock().await.pop_front().unwrap_or(MockReply {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: json!({ "ok": false, "description": "exhausted_test_replies" }),
    });

    (reply.status, Json(reply.body))
}
