#![allow(dead_code)]

//! Shared fixtures for the integration tests: a route file, a gateway wired
//! with recording collaborators, and helpers to inspect what they saw.

use async_trait::async_trait;
use routegate::cache::{CacheError, CacheKey, CacheStore, MemoryCacheStore};
use routegate::config::GatewayConfig;
use routegate::envelope::HeaderVecExt;
use routegate::events::{EventSink, GatewayEvent};
use routegate::registry::{handler_fn, transform_fn, HandlerRegistry, TransformError, TransformedOutput};
use routegate::security::{AuthError, AuthRequest, AuthenticationStrategy, Principal};
use routegate::spec::{load_route_table, RouteTable};
use routegate::{ErrorCode, Gateway, ResponseEnvelope};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub mod temp_files {
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Write `content` to a fresh temporary file with the given extension.
    /// The file is removed when the returned handle is dropped.
    pub fn create_temp_file(content: &str, ext: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("routegate_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    pub fn create_temp_yaml(content: &str) -> NamedTempFile {
        create_temp_file(content, "yaml")
    }

    pub fn create_temp_json(content: &str) -> NamedTempFile {
        create_temp_file(content, "json")
    }
}

/// Route file shared by the gateway tests.
pub const ROUTES_YAML: &str = r#"
authentication:
  account:
    strategy: default
    parameters:
      account_id:
        type: integer
        pattern: "[0-9]+"
routes:
  - method: get
    endpoint: /accounts/{account_id}/items
    library: lib/accounts
    callback: list_items
    authentication: account
    caching: { enabled: true, ttl_secs: 60 }
    event: items.listed
    endpoint_parameters:
      limit: { type: integer, default: 10 }
  - method: post
    endpoint: /accounts
    library: lib/accounts
    callback: create_account
    endpoint_parameters:
      name: { type: string, required: true }
      email: { type: string, required: true }
  - method: get
    endpoint: /health
    library: lib/status
    callback: health
  - method: get
    endpoint: /panics
    library: lib/status
    callback: panics
  - method: get
    endpoint: /teapot
    library: lib/status
    callback: teapot
  - method: get
    endpoint: /report
    library: lib/status
    callback: report
  - method: get
    endpoint: /orphan
    library: lib/status
    callback: orphan
errors:
  InternalError:
    status_code: 500
    status_code_text: Internal Server Error
    user_error_code: 9000
    user_message: Something went wrong
  InvalidUri:
    status_code: 404
    status_code_text: Not Found
    user_error_code: 1004
    user_message: No such endpoint
  InvalidInput:
    status_code: 400
    status_code_text: Bad Request
    user_error_code: 1001
    user_message: Invalid input
  AuthenticationFailed:
    status_code: 401
    status_code_text: Unauthorized
    user_error_code: 2001
    user_message: Authentication failed
  InvalidAuthenticationScheme:
    status_code: 401
    status_code_text: Unauthorized
    user_error_code: 2002
    user_message: Unsupported authentication scheme
  InvalidClientBearerToken:
    status_code: 401
    status_code_text: Unauthorized
    user_error_code: 2003
    user_message: Malformed client bearer token
"#;

pub const VALID_TOKEN: &str = "token123";

/// Load [`ROUTES_YAML`] through a real file, the way the binary does.
pub fn load_fixture_table(config: &GatewayConfig) -> RouteTable {
    let file = temp_files::create_temp_yaml(ROUTES_YAML);
    load_route_table(file.path(), &config.load_options()).unwrap()
}

/// Strategy that accepts [`VALID_TOKEN`] and records every token it is handed.
#[derive(Clone, Default)]
pub struct RecordingStrategy {
    tokens: Arc<Mutex<Vec<String>>>,
}

impl RecordingStrategy {
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }
}

#[async_trait]
impl AuthenticationStrategy for RecordingStrategy {
    async fn authenticate(&self, request: AuthRequest) -> Result<Principal, AuthError> {
        self.tokens
            .lock()
            .unwrap()
            .push(request.credential.token.clone());
        if request.credential.token == VALID_TOKEN {
            let mut principal = Principal::new("alice");
            if let Some(account) = request.account_id {
                principal = principal.with_account(account);
            }
            Ok(principal)
        } else {
            Err(AuthError::failed())
        }
    }
}

/// Memory store that counts reads and writes.
#[derive(Default)]
pub struct CountingCacheStore {
    inner: MemoryCacheStore,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    keys: Mutex<Vec<String>>,
}

impl CountingCacheStore {
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn written_keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheStore for CountingCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().push(key.as_str().to_string());
        self.inner.set(key, value, ttl).await
    }
}

/// Store whose backend is always down.
pub struct UnavailableCacheStore;

#[async_trait]
impl CacheStore for UnavailableCacheStore {
    async fn get(&self, _key: &CacheKey) -> Result<Option<Value>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &CacheKey, _value: Value, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<GatewayEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<GatewayEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.topic).collect()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: GatewayEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Handlers for every fixture route except `/orphan`, which stays unbound.
pub fn fixture_registry(list_calls: Arc<AtomicUsize>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    registry.register_handler(
        "lib/accounts",
        "list_items",
        handler_fn(move |ctx| {
            let calls = Arc::clone(&list_calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok::<_, anyhow::Error>(ResponseEnvelope::ok(json!({
                    "account": ctx.path_param("account_id"),
                    "limit": ctx.param("limit").cloned(),
                    "subject": ctx.principal.as_ref().map(|p| p.subject.clone()),
                    "served": n,
                })))
            }
        }),
    );
    registry.register_handler(
        "lib/accounts",
        "create_account",
        handler_fn(|ctx| async move {
            Ok::<_, anyhow::Error>(
                ResponseEnvelope::ok(json!({ "name": ctx.param("name").cloned() }))
                    .with_status(201),
            )
        }),
    );
    registry.register_transform(
        "accounts",
        "create_account",
        transform_fn(|_ctx, envelope| async move {
            let mut output = TransformedOutput::json(
                envelope.status,
                json!({ "created": envelope.data.unwrap_or_default() }),
            );
            output.headers.set_header("Location", "/accounts/1");
            Ok::<_, TransformError>(output)
        }),
    );
    registry.register_handler(
        "lib/status",
        "health",
        handler_fn(|ctx| async move {
            Ok::<_, anyhow::Error>(ResponseEnvelope::ok(json!({
                "status": "ok",
                "authenticated": ctx.principal.is_some(),
            })))
        }),
    );
    registry.register_handler(
        "lib/status",
        "panics",
        handler_fn(|_ctx| async move {
            if true {
                panic!("handler exploded");
            }
            Ok::<_, anyhow::Error>(ResponseEnvelope::ok(Value::Null))
        }),
    );
    registry.register_handler(
        "lib/status",
        "teapot",
        handler_fn(|_ctx| async move {
            Ok::<_, anyhow::Error>(ResponseEnvelope::error(ErrorCode::Custom(
                "TeapotError".to_string(),
            )))
        }),
    );
    registry.register_handler(
        "lib/status",
        "report",
        handler_fn(|_ctx| async move {
            Ok::<_, anyhow::Error>(ResponseEnvelope::ok(json!({ "rows": 3 })))
        }),
    );
    registry.register_transform(
        "status",
        "report",
        transform_fn(|_ctx, _envelope| async move {
            Err::<TransformedOutput, _>(TransformError::Failed("template missing".into()))
        }),
    );

    registry
}

/// A gateway over the fixture routes plus handles on its collaborators.
pub struct Fixture {
    pub gateway: Gateway,
    pub list_calls: Arc<AtomicUsize>,
    pub strategy: RecordingStrategy,
    pub cache: Arc<CountingCacheStore>,
    pub events: Arc<RecordingEventSink>,
}

impl Fixture {
    pub fn new(caching: bool) -> Self {
        let mut config = GatewayConfig::default();
        config.caching.enabled = caching;
        config.server_banner = Some("routegate-test".to_string());
        Self::with_config(config)
    }

    pub fn with_config(config: GatewayConfig) -> Self {
        let table = load_fixture_table(&config);
        let list_calls = Arc::new(AtomicUsize::new(0));
        let strategy = RecordingStrategy::default();
        let cache = Arc::new(CountingCacheStore::default());
        let events = Arc::new(RecordingEventSink::default());

        let gateway = Gateway::builder(table)
            .registry(fixture_registry(Arc::clone(&list_calls)))
            .strategy("default", strategy.clone())
            .cache_store(Arc::clone(&cache) as Arc<dyn CacheStore>)
            .events(Arc::clone(&events) as Arc<dyn EventSink>)
            .config(config)
            .build()
            .unwrap();

        Self {
            gateway,
            list_calls,
            strategy,
            cache,
            events,
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}
