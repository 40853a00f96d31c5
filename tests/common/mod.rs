#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use reqwest::{header, redirect, Response, StatusCode};
use uuid::Uuid;

use brandhub::app::{app, AppState};
use brandhub::auth::hash_password;
use brandhub::config::AppConfig;
use brandhub::database::models::{ContactDetails, NewAccount};
use brandhub::insight::{InsightError, InsightGenerator, InsightStream};
use brandhub::policy::Role;
use brandhub::store::{LearningStore, MemoryStore, ProfileStore};

pub const PASSWORD: &str = "correct-horse";

/// Insight generator that replays canned deltas, or fails before streaming.
pub struct FakeInsight {
    pub chunks: Vec<String>,
    pub fail: bool,
}

impl FakeInsight {
    pub fn replying(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            chunks: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl InsightGenerator for FakeInsight {
    async fn generate(&self, prompt: String) -> Result<InsightStream, InsightError> {
        assert!(prompt.contains("BrandHub"));
        if self.fail {
            return Err(InsightError::NotConfigured);
        }
        Ok(stream::iter(self.chunks.clone().into_iter().map(Ok)).boxed())
    }
}

/// A signed-in test user.
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub cookie: String,
}

pub struct TestApp {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
}

/// Serve the real router on a free port with the in-memory store.
pub async fn spawn_app() -> Result<TestApp> {
    spawn_app_with(FakeInsight::replying(&["- Enrollment is up", " this week."])).await
}

pub async fn spawn_app_with(insight: FakeInsight) -> Result<TestApp> {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(AppConfig::in_memory(), store.clone(), store.clone(), Arc::new(insight));
    let base_url = spawn_state(state).await?;
    Ok(TestApp {
        base_url,
        store,
        client: no_redirect_client(),
    })
}

/// Route server logs through the test writer; `RUST_LOG` picks the level.
fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Serve any state; tests that swap in failing stores use this directly.
pub async fn spawn_state(state: AppState) -> Result<String> {
    init_tracing();

    // Pick an unused port for isolation
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    let base_url = format!("http://127.0.0.1:{}", port);

    let router = app(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });

    wait_ready(&no_redirect_client(), &base_url, Duration::from_secs(5)).await?;
    tracing::debug!("test server listening on {}", base_url);
    Ok(base_url)
}

async fn wait_ready(client: &reqwest::Client, base_url: &str, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(resp) = client.get(format!("{}/health", base_url)).send().await {
            if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    anyhow::bail!("server did not become ready on {} within {:?}", base_url, timeout)
}

pub fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .expect("client")
}

/// `Location` header of a redirect response.
pub fn location(res: &Response) -> Option<String> {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `name=value` pair from the response's `Set-Cookie`, ready to send back.
pub fn session_cookie(res: &Response) -> Option<String> {
    res.headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// `message` query parameter of a redirect target.
pub fn message_param(location: &str) -> Option<String> {
    let url = url::Url::parse(&format!("http://localhost{}", location)).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "message")
        .map(|(_, value)| value.into_owned())
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str, user: Option<&TestUser>) -> Result<Response> {
        let mut req = self.client.get(self.url(path));
        if let Some(user) = user {
            req = req.header(header::COOKIE, &user.cookie);
        }
        Ok(req.send().await?)
    }

    pub async fn post_json(&self, path: &str, user: &TestUser, body: &serde_json::Value) -> Result<Response> {
        Ok(self
            .client
            .post(self.url(path))
            .header(header::COOKIE, &user.cookie)
            .json(body)
            .send()
            .await?)
    }

    pub async fn put_json(&self, path: &str, user: &TestUser, body: &serde_json::Value) -> Result<Response> {
        Ok(self
            .client
            .put(self.url(path))
            .header(header::COOKIE, &user.cookie)
            .json(body)
            .send()
            .await?)
    }

    pub async fn delete(&self, path: &str, user: &TestUser) -> Result<Response> {
        Ok(self
            .client
            .delete(self.url(path))
            .header(header::COOKIE, &user.cookie)
            .send()
            .await?)
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<Response> {
        Ok(self.client.post(self.url(path)).form(form).send().await?)
    }

    /// Create an account straight in the store, bypassing the signup form.
    pub async fn create_account(&self, email: &str, name: &str, role: Role) -> Result<Uuid> {
        let profile = self
            .store
            .register_account(NewAccount {
                email: email.to_string(),
                name: name.to_string(),
                password_hash: hash_password(PASSWORD)?,
                role,
                brand_id: None,
                contact: ContactDetails::default(),
            })
            .await?;
        Ok(profile.id)
    }

    /// Sign in through `POST /login` and keep the session cookie.
    pub async fn login(&self, email: &str, password: &str) -> Result<Response> {
        self.post_form("/login", &[("email", email), ("password", password)]).await
    }

    /// Create an account with the given stored role and sign it in.
    /// `None` stores a profile with no recognised role.
    pub async fn user(&self, role: Option<Role>) -> Result<TestUser> {
        let label = role.map(|r| r.as_str()).unwrap_or("norole");
        let email = format!("{}-{}@example.test", label, Uuid::new_v4().simple());
        let id = self
            .create_account(&email, &format!("Test {}", label), role.unwrap_or(Role::Student))
            .await?;
        if role.is_none() {
            self.store.set_role(id, None).await?;
        }

        let res = self.login(&email, PASSWORD).await?;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        let cookie = session_cookie(&res).context("login did not set a session cookie")?;
        Ok(TestUser { id, email, cookie })
    }

    pub async fn course(&self, title: &str, capacity: i32) -> Result<Uuid> {
        self.course_for(title, capacity, None).await
    }

    pub async fn course_for(&self, title: &str, capacity: i32, instructor_id: Option<Uuid>) -> Result<Uuid> {
        let start = NaiveDate::from_ymd_opt(2026, 9, 1).context("date")?;
        let end = NaiveDate::from_ymd_opt(2026, 12, 15).context("date")?;
        self.create_course(title, capacity, instructor_id, start, end).await
    }

    /// Unassigned active course running over the given dates.
    pub async fn course_dated(&self, title: &str, start: NaiveDate, end: NaiveDate) -> Result<Uuid> {
        self.create_course(title, 10, None, start, end).await
    }

    async fn create_course(
        &self,
        title: &str,
        capacity: i32,
        instructor_id: Option<Uuid>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Uuid> {
        use brandhub::database::models::{CourseStatus, NewCourse};

        let course = self
            .store
            .create_course(NewCourse {
                title: title.to_string(),
                description: None,
                brand_id: None,
                instructor_id,
                start_date,
                end_date,
                capacity,
                price: rust_decimal::Decimal::ZERO,
                status: CourseStatus::Active,
            })
            .await?;
        Ok(course.id)
    }
}
