//! Integration tests for the webhook endpoint.
//!
//! Each test spins up a fake Telegram Bot API server and the bot's own
//! webhook server on random ports, then posts real updates over HTTP.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::timeout;

use signup_bot::channels::TelegramClient;
use signup_bot::dispatcher::Dispatcher;
use signup_bot::registration::{Prompt, RegistrationMachine, SessionStore};
use signup_bot::store::{LibSqlUserStore, UserRecord, UserStore};
use signup_bot::webhook::{WebhookState, webhook_routes};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Calls received by the fake Bot API: (method, body).
#[derive(Clone, Default)]
struct FakeTelegram {
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    failing: bool,
}

impl FakeTelegram {
    async fn sent_texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|(method, _)| method == "sendMessage")
            .filter_map(|(_, body)| body["text"].as_str().map(String::from))
            .collect()
    }

    async fn methods(&self) -> Vec<String> {
        self.calls.lock().await.iter().map(|(m, _)| m.clone()).collect()
    }
}

async fn fake_api(
    State(fake): State<FakeTelegram>,
    Path((_token, method)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    fake.calls.lock().await.push((method, body));
    if fake.failing {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"ok": false, "description": "boom"})),
        )
    } else {
        (StatusCode::OK, Json(json!({"ok": true, "result": true})))
    }
}

/// Start the fake Bot API, return its base URL.
async fn start_fake_telegram(fake: FakeTelegram) -> String {
    let app = Router::new()
        .route("/{token}/{method}", post(fake_api))
        .with_state(fake);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{port}")
}

struct Harness {
    base: String,
    fake: FakeTelegram,
    users: Arc<LibSqlUserStore>,
    sessions: Arc<SessionStore>,
    http: reqwest::Client,
}

impl Harness {
    async fn post(&self, update: Value) -> (StatusCode, String) {
        self.post_raw(update.to_string()).await
    }

    async fn post_raw(&self, body: String) -> (StatusCode, String) {
        let resp = self
            .http
            .post(format!("{}/webhook", self.base))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        (resp.status(), resp.text().await.unwrap())
    }
}

async fn start_bot_with(fake: FakeTelegram) -> Harness {
    let api_base = start_fake_telegram(fake.clone()).await;
    let telegram = Arc::new(
        TelegramClient::new(SecretString::from("123:TEST".to_string())).with_api_base(api_base),
    );

    let users = Arc::new(LibSqlUserStore::new_memory().await.unwrap());
    let sessions = Arc::new(SessionStore::new());
    let machine = RegistrationMachine::new(
        Arc::clone(&sessions),
        users.clone(),
        Duration::from_secs(5),
    );
    let dispatcher = Arc::new(Dispatcher::new(machine, telegram));
    let app = webhook_routes(WebhookState { dispatcher });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the servers a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    Harness {
        base: format!("http://127.0.0.1:{port}"),
        fake,
        users,
        sessions,
        http: reqwest::Client::new(),
    }
}

async fn start_bot() -> Harness {
    start_bot_with(FakeTelegram::default()).await
}

fn text(user_id: i64, text: &str) -> Value {
    json!({
        "update_id": 1,
        "message": {
            "message_id": 1,
            "from": {"id": user_id, "is_bot": false, "first_name": "Test"},
            "chat": {"id": user_id, "type": "private"},
            "date": 1700000000,
            "text": text
        }
    })
}

fn button(user_id: i64, data: &str) -> Value {
    json!({
        "update_id": 2,
        "callback_query": {
            "id": format!("cb-{user_id}"),
            "from": {"id": user_id, "is_bot": false, "first_name": "Test"},
            "message": {"message_id": 3, "chat": {"id": user_id, "type": "private"}, "date": 1700000000},
            "chat_instance": "ci",
            "data": data
        }
    })
}

// ── Scenarios ────────────────────────────────────────────────────────

#[tokio::test]
async fn full_registration_over_http() {
    timeout(TEST_TIMEOUT, async {
        let bot = start_bot().await;

        for update in [
            text(1, "/start"),
            button(1, "register"),
            text(1, "alice"),
            text(1, "secret"),
            text(1, "skip"),
        ] {
            assert_eq!(bot.post(update).await, (StatusCode::OK, "ok".to_string()));
        }

        assert_eq!(
            bot.fake.sent_texts().await,
            vec![
                Prompt::Welcome.text(),
                Prompt::AskUsername.text(),
                Prompt::AskPassword.text(),
                Prompt::AskReferral.text(),
                Prompt::Complete.text(),
            ]
        );

        let calls = bot.fake.calls.lock().await;
        let menu = &calls[0].1["reply_markup"]["inline_keyboard"];
        assert_eq!(menu[0][0]["callback_data"], "register");
        assert_eq!(menu[1][0]["callback_data"], "login");
        drop(calls);
        assert!(bot.fake.methods().await.contains(&"answerCallbackQuery".to_string()));

        assert_eq!(
            bot.users.get_user(1).await.unwrap(),
            Some(UserRecord {
                username: "alice".into(),
                password: "secret".into(),
                referral: None,
            })
        );
        assert!(bot.sessions.get(1).await.is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn taken_username_reprompts_over_http() {
    timeout(TEST_TIMEOUT, async {
        let bot = start_bot().await;
        bot.users
            .put_user(
                1,
                &UserRecord {
                    username: "alice".into(),
                    password: "x".into(),
                    referral: None,
                },
            )
            .await
            .unwrap();

        bot.post(button(2, "register")).await;
        bot.post(text(2, "alice")).await;
        bot.post(text(2, "bob")).await;

        let texts = bot.fake.sent_texts().await;
        assert_eq!(
            texts,
            vec![
                Prompt::AskUsername.text(),
                Prompt::UsernameTaken.text(),
                Prompt::AskPassword.text(),
            ]
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn text_after_completion_asks_to_start() {
    timeout(TEST_TIMEOUT, async {
        let bot = start_bot().await;
        for update in [
            button(1, "register"),
            text(1, "carol"),
            text(1, "pw"),
            text(1, "CODE9"),
            text(1, "hello?"),
        ] {
            bot.post(update).await;
        }

        let texts = bot.fake.sent_texts().await;
        assert_eq!(texts.last().unwrap(), Prompt::StartFirst.text());
        let record = bot.users.get_user(1).await.unwrap().unwrap();
        assert_eq!(record.referral.as_deref(), Some("CODE9"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn login_reply_is_fixed() {
    timeout(TEST_TIMEOUT, async {
        let bot = start_bot().await;
        bot.post(button(1, "login")).await;
        assert_eq!(
            bot.fake.sent_texts().await,
            vec![Prompt::LoginUnavailable.text()]
        );
        assert!(bot.sessions.get(1).await.is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn concurrent_users_register_independently() {
    timeout(TEST_TIMEOUT, async {
        let bot = start_bot().await;

        let run = |user_id: i64, name: &'static str| {
            let bot = &bot;
            async move {
                for update in [
                    button(user_id, "register"),
                    text(user_id, name),
                    text(user_id, "pw"),
                    text(user_id, "skip"),
                ] {
                    bot.post(update).await;
                }
            }
        };
        tokio::join!(run(10, "dave"), run(20, "erin"));

        assert_eq!(bot.users.get_user(10).await.unwrap().unwrap().username, "dave");
        assert_eq!(bot.users.get_user(20).await.unwrap().unwrap().username, "erin");
        assert_eq!(bot.users.count_users().await.unwrap(), 2);
    })
    .await
    .expect("test timed out");
}

// ── Acknowledgement contract ─────────────────────────────────────────

#[tokio::test]
async fn malformed_payload_still_acknowledged() {
    timeout(TEST_TIMEOUT, async {
        let bot = start_bot().await;
        let (status, body) = bot.post_raw("{not json".to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
        assert!(bot.fake.calls.lock().await.is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn send_failure_still_acknowledged() {
    timeout(TEST_TIMEOUT, async {
        let bot = start_bot_with(FakeTelegram {
            failing: true,
            ..FakeTelegram::default()
        })
        .await;

        let (status, body) = bot.post(button(1, "register")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
        // The dialog still advanced even though the reply could not be sent.
        assert!(bot.sessions.get(1).await.is_some());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let bot = start_bot().await;
        let resp = bot
            .http
            .get(format!("{}/health", bot.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "ok");
    })
    .await
    .expect("test timed out");
}
