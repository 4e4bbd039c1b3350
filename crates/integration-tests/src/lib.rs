//! In-process integration test harness for Dentalab.
//!
//! Builds the real router over an in-memory data store and a fake auth
//! service, then drives it request by request with a cookie-carrying client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p dentalab-integration-tests
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let app = TestApp::new();
//! app.auth.add_account("lab@example.com", "password123", "Ana", "Dental Works");
//! let mut client = app.client();
//! client.sign_in("lab@example.com", "password123").await;
//! let page = client.get("/clinics").await;
//! assert_eq!(page.status, StatusCode::OK);
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::util::ServiceExt;
use url::Url;

use dentalab_core::{CurrencyCode, UserId};
use dentalab_web::auth::{
    AccessToken, AuthError, AuthProvider, AuthSession, AuthUser, RefreshToken, SignUp,
    SignUpOutcome,
};
use dentalab_web::config::{AppConfig, DataStoreConfig, PaymentConfig};
use dentalab_web::state::AppState;
use dentalab_web::store::{DataStore, Query, StoreError, cell_text};

// =============================================================================
// In-memory data store
// =============================================================================

/// Data-store operation, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Select,
    Insert,
    Update,
    Delete,
}

/// Failure returned instead of performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Access-policy rejection.
    PermissionDenied,
    /// Generic API error with a message shown verbatim.
    Api(String),
}

impl Failure {
    fn to_error(&self) -> StoreError {
        match self {
            Self::PermissionDenied => {
                StoreError::PermissionDenied("new row violates row-level security policy".to_string())
            }
            Self::Api(message) => StoreError::Api {
                status: 400,
                code: None,
                message: message.clone(),
            },
        }
    }
}

#[derive(Default)]
struct StoreState {
    tables: HashMap<String, Vec<Value>>,
    failures: HashMap<(Op, String), Failure>,
    calls: HashMap<(Op, String), usize>,
}

/// Table store keyed by table name, with failure injection.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row directly, assigning an `id` if it has none.
    pub fn seed(&self, table: &str, mut row: Value) -> String {
        let id = ensure_id(&mut row);
        self.state
            .lock()
            .unwrap()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row);
        id
    }

    /// Overwrite fields of the row with this `id`.
    pub fn patch(&self, table: &str, id: &str, fields: Value) {
        let mut state = self.state.lock().unwrap();
        let row = state
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| cell_text(r, "id").as_deref() == Some(id)))
            .expect("no such row");
        if let (Some(target), Some(fields)) = (row.as_object_mut(), fields.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
    }

    /// Every row of a table, in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// The row with this `id`.
    #[must_use]
    pub fn row(&self, table: &str, id: &str) -> Option<Value> {
        self.rows(table)
            .into_iter()
            .find(|r| cell_text(r, "id").as_deref() == Some(id))
    }

    /// Make every `op` on `table` fail until cleared.
    pub fn fail(&self, op: Op, table: &str, failure: Failure) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((op, table.to_string()), failure);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    /// How many times `op` reached `table`, failed calls included.
    #[must_use]
    pub fn calls(&self, op: Op, table: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&(op, table.to_string()))
            .copied()
            .unwrap_or_default()
    }

    fn enter(&self, op: Op, table: &str) -> Result<std::sync::MutexGuard<'_, StoreState>, StoreError> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry((op, table.to_string())).or_default() += 1;
        if let Some(failure) = state.failures.get(&(op, table.to_string())) {
            return Err(failure.to_error());
        }
        Ok(state)
    }
}

fn ensure_id(row: &mut Value) -> String {
    if let Some(id) = cell_text(row, "id") {
        return id;
    }
    let id = uuid::Uuid::new_v4().to_string();
    if let Some(object) = row.as_object_mut() {
        object.insert("id".to_string(), Value::String(id.clone()));
    }
    id
}

fn sort_rows(rows: &mut [Value], query: &Query) {
    if let Some(order) = &query.order {
        rows.sort_by(|a, b| {
            let left = cell_text(a, &order.column);
            let right = cell_text(b, &order.column);
            if order.ascending {
                left.cmp(&right)
            } else {
                right.cmp(&left)
            }
        });
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, _token: &AccessToken, query: &Query) -> Result<Vec<Value>, StoreError> {
        let state = self.enter(Op::Select, &query.table)?;
        let mut rows: Vec<Value> = state
            .tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        sort_rows(&mut rows, query);
        Ok(rows)
    }

    async fn insert(&self, _token: &AccessToken, table: &str, mut row: Value) -> Result<Value, StoreError> {
        let mut state = self.enter(Op::Insert, table)?;
        ensure_id(&mut row);
        if let Some(object) = row.as_object_mut() {
            object
                .entry("created_at")
                .or_insert_with(|| json!(Utc::now().to_rfc3339()));
        }
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        _token: &AccessToken,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        let mut state = self.enter(Op::Update, &query.table)?;
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(&query.table) {
            for row in rows.iter_mut().filter(|r| query.matches(r)) {
                if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
                    for (key, value) in fields {
                        target.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, _token: &AccessToken, query: &Query) -> Result<Vec<Value>, StoreError> {
        let mut state = self.enter(Op::Delete, &query.table)?;
        let Some(rows) = state.tables.get_mut(&query.table) else {
            return Ok(Vec::new());
        };
        let (deleted, kept): (Vec<Value>, Vec<Value>) =
            rows.drain(..).partition(|r| query.matches(r));
        *rows = kept;
        Ok(deleted)
    }
}

// =============================================================================
// Fake auth service
// =============================================================================

struct AuthState {
    accounts: HashMap<String, (String, AuthUser)>,
    tokens: HashMap<String, AuthUser>,
    refresh_tokens: HashMap<String, AuthUser>,
    /// Lifetime of issued access tokens.
    lifetime: Duration,
    /// When set, sign-up issues no session (email confirmation required).
    confirm_email: bool,
    refreshes: usize,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            accounts: HashMap::new(),
            tokens: HashMap::new(),
            refresh_tokens: HashMap::new(),
            lifetime: Duration::hours(1),
            confirm_email: false,
            refreshes: 0,
        }
    }
}

/// Auth service holding accounts in memory.
#[derive(Default)]
pub struct FakeAuth {
    state: Mutex<AuthState>,
}

impl FakeAuth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account that can sign in.
    pub fn add_account(&self, email: &str, password: &str, name: &str, lab_name: &str) -> UserId {
        let user = AuthUser {
            id: UserId::generate(),
            email: email.to_string(),
            name: Some(name.to_string()),
            lab_name: Some(lab_name.to_string()),
        };
        let id = user.id;
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(email.to_lowercase(), (password.to_string(), user));
        id
    }

    /// Require email confirmation on sign-up.
    pub fn require_confirmation(&self) {
        self.state.lock().unwrap().confirm_email = true;
    }

    /// Issue sessions whose access token is already expired, so the next
    /// request has to refresh.
    pub fn issue_expired_tokens(&self) {
        self.state.lock().unwrap().lifetime = Duration::seconds(-1);
    }

    /// Forget every refresh token, as after a server-side sign-out.
    pub fn revoke_refresh_tokens(&self) {
        self.state.lock().unwrap().refresh_tokens.clear();
    }

    /// How many sessions were renewed with a refresh token.
    #[must_use]
    pub fn refreshes(&self) -> usize {
        self.state.lock().unwrap().refreshes
    }

    fn issue(&self, user: &AuthUser) -> AuthSession {
        let lifetime = self.state.lock().unwrap().lifetime;
        self.issue_for(user, lifetime)
    }

    fn issue_for(&self, user: &AuthUser, lifetime: Duration) -> AuthSession {
        let token = format!("token-{}", uuid::Uuid::new_v4());
        let refresh = format!("refresh-{}", uuid::Uuid::new_v4());
        let mut state = self.state.lock().unwrap();
        state.tokens.insert(token.clone(), user.clone());
        state.refresh_tokens.insert(refresh.clone(), user.clone());
        AuthSession {
            access_token: AccessToken::new(token),
            expires_at: Utc::now() + lifetime,
            refresh_token: Some(RefreshToken::new(refresh)),
            user: user.clone(),
        }
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let user = {
            let state = self.state.lock().unwrap();
            match state.accounts.get(&email.to_lowercase()) {
                Some((expected, user)) if expected == password => user.clone(),
                _ => return Err(AuthError::InvalidCredentials),
            }
        };
        Ok(self.issue(&user))
    }

    async fn sign_up(&self, request: &SignUp) -> Result<SignUpOutcome, AuthError> {
        if self
            .state
            .lock()
            .unwrap()
            .accounts
            .contains_key(&request.email.to_lowercase())
        {
            return Err(AuthError::UserAlreadyExists);
        }
        let id = self.add_account(&request.email, &request.password, &request.name, &request.lab_name);
        let user = AuthUser {
            id,
            email: request.email.clone(),
            name: Some(request.name.clone()),
            lab_name: Some(request.lab_name.clone()),
        };
        let confirm = self.state.lock().unwrap().confirm_email;
        let session = (!confirm).then(|| self.issue(&user));
        Ok(SignUpOutcome { user, session })
    }

    async fn recover(&self, _email: &str) -> Result<(), AuthError> {
        Ok(())
    }

    async fn refresh(&self, token: &RefreshToken) -> Result<AuthSession, AuthError> {
        let user = {
            let mut state = self.state.lock().unwrap();
            let user = state
                .refresh_tokens
                .remove(token.expose())
                .ok_or(AuthError::SessionExpired)?;
            state.refreshes += 1;
            user
        };
        Ok(self.issue_for(&user, Duration::hours(1)))
    }

    async fn get_user(&self, token: &AccessToken) -> Result<AuthUser, AuthError> {
        self.state
            .lock()
            .unwrap()
            .tokens
            .get(token.expose())
            .cloned()
            .ok_or(AuthError::SessionExpired)
    }

    async fn sign_out(&self, token: &AccessToken) -> Result<(), AuthError> {
        self.state.lock().unwrap().tokens.remove(token.expose());
        Ok(())
    }
}

// =============================================================================
// Application under test
// =============================================================================

/// Configuration pointing at nothing; the collaborators are in memory.
#[must_use]
pub fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        datastore: DataStoreConfig {
            url: Url::parse("http://datastore.invalid").unwrap(),
            anon_key: SecretString::from("test-anon-key".to_string()),
        },
        payment: PaymentConfig {
            client_id: Some("test-client".to_string()),
            currency: CurrencyCode::USD,
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
        log_json: false,
    }
}

/// The router plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub auth: Arc<FakeAuth>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let auth = Arc::new(FakeAuth::new());
        let state = AppState::new(test_config(), store.clone(), auth.clone());
        Self {
            router: dentalab_web::app(state),
            store,
            auth,
        }
    }

    /// A fresh browser with no cookies.
    #[must_use]
    pub fn client(&self) -> TestClient {
        TestClient {
            router: self.router.clone(),
            cookie: None,
        }
    }

    /// Register a lab owner in both the auth service and `usuarios`.
    pub fn add_user(&self, email: &str, role: &str) -> UserId {
        let id = self.auth.add_account(email, PASSWORD, "Ana Ruiz", "Dental Works");
        self.store.seed(
            "usuarios",
            json!({
                "id": id.to_string(),
                "email": email,
                "nombre": "Ana Ruiz",
                "rol": role,
                "nombre_laboratorio": "Dental Works",
                "activo": true,
                "fecha_registro": Utc::now().to_rfc3339(),
            }),
        );
        id
    }

    /// Sign a new user in and return their browser.
    pub async fn signed_in(&self, email: &str, role: &str) -> (UserId, TestClient) {
        let id = self.add_user(email, role);
        let mut client = self.client();
        let response = client.sign_in(email, PASSWORD).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "sign-in failed: {}", response.body);
        (id, client)
    }
}

/// Password of every account created by [`TestApp::add_user`].
pub const PASSWORD: &str = "correct-horse";

/// A finished response with its body read.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestResponse {
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.body.contains(text)
    }
}

/// One browser: keeps the session cookie between requests.
pub struct TestClient {
    router: Router,
    cookie: Option<String>,
}

impl TestClient {
    pub async fn get(&mut self, path: &str) -> TestResponse {
        self.send(Request::get(path), Body::empty()).await
    }

    pub async fn post_form(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let request = Request::post(path).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(request, Body::from(body)).await
    }

    /// Post a `multipart/form-data` body of text fields.
    pub async fn post_multipart(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        const BOUNDARY: &str = "dentalab-test-boundary";
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        let request = Request::post(path).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        self.send(request, Body::from(body)).await
    }

    pub async fn post_json(&mut self, path: &str, value: &Value) -> TestResponse {
        let request = Request::post(path).header(header::CONTENT_TYPE, "application/json");
        self.send(request, Body::from(value.to_string())).await
    }

    /// Follow a `303 See Other` with a GET, the way a browser would.
    pub async fn follow(&mut self, response: &TestResponse) -> TestResponse {
        let location = response.location.clone().expect("response is not a redirect");
        self.get(&location).await
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> TestResponse {
        self.post_form("/auth/login", &[("email", email), ("password", password)])
            .await
    }

    async fn send(&mut self, mut request: axum::http::request::Builder, body: Body) -> TestResponse {
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie
                .to_str()
                .unwrap()
                .split(';')
                .next()
                .unwrap()
                .to_string();
            self.cookie = Some(pair);
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            location,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}
