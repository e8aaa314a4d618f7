#![allow(dead_code)]
use async_trait::async_trait;
use bookswap_server::api::{MgmtState, app_router, mgmt_router};
use bookswap_server::config::{
    AuthConfig, Config, DatabaseConfig, GatewayConfig, MailConfig, RateLimitConfig, ServerConfig, TelemetryConfig,
    UploadConfig,
};
use bookswap_server::domain::mail::Mail;
use bookswap_server::domain::ports::Mailer;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message};
use uuid::Uuid;

static INIT: Once = Once::new();

/// Signing up with this address grants the admin role.
pub const ADMIN_EMAIL: &str = "admin@example.com";

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("bookswap_server=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
            .add_directive("tungstenite=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

pub fn get_test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            mgmt_port: 0,
            trusted_proxies: vec!["127.0.0.1/32".parse().unwrap()],
            ..ServerConfig::default()
        },
        database: DatabaseConfig::default(),
        auth: AuthConfig {
            jwt_secret: "test_secret".to_string(),
            reset_secret: "test_reset_secret".to_string(),
            admin_emails: vec![ADMIN_EMAIL.to_string()],
            ..AuthConfig::default()
        },
        rate_limit: RateLimitConfig { per_second: 10_000, burst: 10_000, auth_per_second: 10_000, auth_burst: 10_000 },
        gateway: GatewayConfig::default(),
        uploads: UploadConfig {
            dir: std::env::temp_dir().join(format!("bookswap-test-{}", Uuid::new_v4())).to_string_lossy().into_owned(),
            max_image_bytes: 64 * 1024,
            max_images: 3,
        },
        mail: MailConfig::default(),
        telemetry: TelemetryConfig::default(),
    }
}

/// Keeps every mail so tests can read verification codes and reset links.
#[derive(Debug, Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<Mail>>,
}

impl CapturingMailer {
    pub fn last_code(&self, email: &str) -> String {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|mail| match mail {
                Mail::VerificationCode { to, code } if to == email => Some(code.clone()),
                _ => None,
            })
            .expect("no verification code mailed")
    }

    pub fn last_reset_token(&self, email: &str) -> String {
        let link = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|mail| match mail {
                Mail::PasswordReset { to, link } if to == email => Some(link.clone()),
                _ => None,
            })
            .expect("no reset link mailed");
        link.split("token=").nth(1).unwrap().to_string()
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, mail: Mail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

pub struct TestApp {
    pub config: Config,
    pub client: reqwest::Client,
    pub server_url: String,
    pub ws_url: String,
    pub mgmt_url: String,
    pub mailer: Arc<CapturingMailer>,
    pub shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        setup_tracing();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mailer = Arc::new(CapturingMailer::default());

        let app = bookswap_server::AppBuilder::new(config.clone())
            .with_database(None)
            .with_mailer(mailer.clone())
            .build()
            .await
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_addr = mgmt_listener.local_addr().unwrap();

        let router = app_router(config.clone(), app.services, shutdown_rx);
        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        let mgmt = mgmt_router(MgmtState { health_service: app.health_service });
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        Self {
            config,
            client: reqwest::Client::new(),
            server_url: format!("http://{addr}"),
            ws_url: format!("ws://{addr}/api/v1/gateway"),
            mgmt_url: format!("http://{mgmt_addr}"),
            mailer,
            shutdown_tx,
        }
    }

    pub fn api(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.server_url)
    }

    pub async fn signup(&self, name: &str, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.api("/user/signup"))
            .json(&json!({ "fullName": name, "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Signs up and verifies a fresh account, returning its session.
    pub async fn register_user(&self, name: &str) -> TestUser {
        let email = format!("{name}_{}@example.com", &Uuid::new_v4().to_string()[..8]);
        self.register_with_email(name, &email).await
    }

    pub async fn register_admin(&self) -> TestUser {
        self.register_with_email("admin", ADMIN_EMAIL).await
    }

    pub async fn register_with_email(&self, name: &str, email: &str) -> TestUser {
        let email = email.to_string();
        let resp = self.signup(name, &email, "password123").await;
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED, "signup failed");

        let code = self.mailer.last_code(&email);
        let resp = self
            .client
            .post(self.api("/user/verify-otp"))
            .json(&json!({ "email": email, "otp": code }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK, "verification failed");

        let body: Value = resp.json().await.unwrap();
        TestUser {
            id: Uuid::parse_str(body["user"]["id"].as_str().unwrap()).unwrap(),
            email,
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn send_text(&self, from: &TestUser, to: Uuid, text: &str) -> reqwest::Response {
        let form = reqwest::multipart::Form::new().text("receiverId", to.to_string()).text("text", text.to_string());
        self.client.post(self.api("/msg/send-message")).bearer_auth(&from.token).multipart(form).send().await.unwrap()
    }

    pub async fn create_category(&self, admin: &TestUser, name: &str) -> reqwest::Response {
        let form = reqwest::multipart::Form::new().text("name", name.to_string());
        self.client.post(self.api("/category/admin/add")).bearer_auth(&admin.token).multipart(form).send().await.unwrap()
    }

    /// Creates a category and returns its id.
    pub async fn seed_category(&self, admin: &TestUser, name: &str) -> Uuid {
        let resp = self.create_category(admin, name).await;
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED, "category creation failed");
        let body: Value = resp.json().await.unwrap();
        Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
    }

    pub async fn add_book(&self, user: &TestUser, form: reqwest::multipart::Form) -> reqwest::Response {
        self.client.post(self.api("/book/add")).bearer_auth(&user.token).multipart(form).send().await.unwrap()
    }

    /// Lists an exchange book and returns its JSON.
    pub async fn list_book(&self, user: &TestUser, category_id: Uuid, title: &str) -> Value {
        let resp = self.add_book(user, book_form(category_id, title)).await;
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED, "book listing failed");
        resp.json().await.unwrap()
    }

    pub async fn connect_ws(&self, token: &str) -> TestWsClient {
        let (stream, _) = connect_async(format!("{}?token={token}", self.ws_url)).await.expect("Failed to connect WS");
        TestWsClient { stream }
    }

    /// Connects and announces presence, waiting until the server confirms it.
    pub async fn connect_online(&self, user: &TestUser) -> TestWsClient {
        let mut ws = self.connect_ws(&user.token).await;
        ws.emit("addUser", json!(user.id)).await;
        loop {
            let online = ws.expect_event("getOnlineUsers").await;
            if online.as_array().unwrap().iter().any(|id| id == &json!(user.id)) {
                return ws;
            }
        }
    }
}

/// A complete exchange listing in `category_id`.
pub fn book_form(category_id: Uuid, title: &str) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .text("title", title.to_string())
        .text("author", "Ursula K. Le Guin")
        .text("genre", "fantasy")
        .text("genre", "classic")
        .text("condition", "used")
        .text("productType", "exchange")
        .text("pages", "183")
        .text("categoryId", category_id.to_string())
        .text("location", "Porto")
}

pub struct TestWsClient {
    pub stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestWsClient {
    pub async fn emit(&mut self, event: &str, data: Value) {
        let frame = json!({ "event": event, "data": data }).to_string();
        self.stream.send(Message::Text(frame.into())).await.unwrap();
    }

    pub async fn receive_raw_timeout(&mut self, timeout: Duration) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
        tokio::time::timeout(timeout, self.stream.next()).await.ok().flatten()
    }

    /// Next parsed event, or `None` if nothing arrives in time.
    pub async fn next_event(&mut self, timeout: Duration) -> Option<(String, Value)> {
        loop {
            match self.receive_raw_timeout(timeout).await? {
                Ok(Message::Text(text)) => {
                    let frame: Value = serde_json::from_str(text.as_str()).unwrap();
                    return Some((frame["event"].as_str().unwrap().to_string(), frame["data"].clone()));
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    /// Skips unrelated events until `name` arrives. Panics after five seconds.
    pub async fn expect_event(&mut self, name: &str) -> Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.next_event(remaining).await {
                Some((event, data)) if event == name => return data,
                Some(_) => {}
                None => panic!("timed out waiting for {name}"),
            }
        }
    }

    /// Collects every event of kind `name` that arrives within `window`.
    pub async fn collect(&mut self, name: &str, window: Duration) -> Vec<Value> {
        let deadline = tokio::time::Instant::now() + window;
        let mut found = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return found;
            }
            match self.next_event(remaining).await {
                Some((event, data)) if event == name => found.push(data),
                Some(_) => {}
                None => return found,
            }
        }
    }
}
