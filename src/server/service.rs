use super::{GatewayRequest, GatewayResponse};
use crate::cache::{CacheGate, CacheStore, MemoryCacheStore};
use crate::config::GatewayConfig;
use crate::dispatcher::{DispatchOutcome, DispatchState, Dispatcher, DispatcherParts};
use crate::envelope::ResponseEnvelope;
use crate::errors::ErrorCode;
use crate::events::{EventSink, NoopEventSink};
use crate::ids::IdGenerator;
use crate::middleware::{CorsDecorator, ResponseDecorator, ServerBannerDecorator};
use crate::registry::HandlerRegistry;
use crate::router::{CompileError, Router};
use crate::security::{AuthGate, AuthStrategies, AuthenticationStrategy};
use crate::spec::RouteTable;
use crate::validator::{ParameterValidator, RuleValidator};
use std::sync::Arc;
use tracing::{info, warn};

/// The gateway service: match → dispatch → respond.
///
/// Built once at startup; `handle` takes `&self` and may be called from any
/// number of tasks concurrently.
pub struct Gateway {
    table: Arc<RouteTable>,
    router: Router,
    dispatcher: Dispatcher,
    ids: IdGenerator,
    request_id_header: String,
    decorators: Vec<Arc<dyn ResponseDecorator>>,
}

impl Gateway {
    pub fn builder(table: RouteTable) -> GatewayBuilder {
        GatewayBuilder::new(table)
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub async fn handle(&self, request: GatewayRequest) -> GatewayResponse {
        self.handle_traced(request).await.response
    }

    /// Like [`Gateway::handle`], also returning the pipeline trace.
    pub async fn handle_traced(&self, request: GatewayRequest) -> DispatchOutcome {
        let request_id = self.ids.next_id();
        let request_headers = request.headers.clone();

        let matched = self
            .router
            .route(&request.method, &request.path)
            .and_then(|m| self.table.get(m.route_index).cloned().map(|route| (route, m)));

        let mut outcome = match matched {
            Some((route, route_match)) => {
                self.dispatcher
                    .dispatch(route, request, route_match, request_id.clone())
                    .await
            }
            None => {
                info!(
                    request_id = %request_id,
                    method = %request.method,
                    path = %request.path,
                    "No route for request"
                );
                let envelope = ResponseEnvelope::error(ErrorCode::InvalidUri);
                DispatchOutcome {
                    response: self.dispatcher.error_response(&envelope, &request_id, None, None),
                    trace: vec![DispatchState::Errored],
                    cache_hit: false,
                    principal: None,
                }
            }
        };

        outcome
            .response
            .set_header(&self.request_id_header, request_id.to_string());
        for decorator in &self.decorators {
            decorator.decorate(&request_headers, &mut outcome.response);
        }
        outcome
    }
}

/// Assembles a [`Gateway`] from a route table and its collaborators.
pub struct GatewayBuilder {
    table: RouteTable,
    registry: HandlerRegistry,
    strategies: AuthStrategies,
    validator: Arc<dyn ParameterValidator>,
    cache_store: Option<Arc<dyn CacheStore>>,
    events: Arc<dyn EventSink>,
    config: GatewayConfig,
    decorators: Vec<Arc<dyn ResponseDecorator>>,
}

impl GatewayBuilder {
    pub fn new(table: RouteTable) -> Self {
        Self {
            table,
            registry: HandlerRegistry::new(),
            strategies: AuthStrategies::new(),
            validator: Arc::new(RuleValidator::new()),
            cache_store: None,
            events: Arc::new(NoopEventSink),
            config: GatewayConfig::default(),
            decorators: Vec::new(),
        }
    }

    pub fn registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn strategies(mut self, strategies: AuthStrategies) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn strategy<S>(mut self, name: &str, strategy: S) -> Self
    where
        S: AuthenticationStrategy + 'static,
    {
        self.strategies.register(name, strategy);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn ParameterValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Extra decorator, run after the configured CORS and banner ones.
    pub fn decorator(mut self, decorator: Arc<dyn ResponseDecorator>) -> Self {
        self.decorators.push(decorator);
        self
    }

    /// Compile the routes and wire the pipeline.
    ///
    /// Routes without a registered handler are logged, not rejected; they
    /// answer with an internal error at dispatch time.
    pub fn build(self) -> Result<Gateway, CompileError> {
        let router = Router::from_table(&self.table)?;
        let missing = self.registry.verify(&self.table);
        if !missing.is_empty() {
            warn!(missing = ?missing, "Routes without handlers");
        }

        let needs_cache = self.table.routes.iter().any(|r| r.caching_enabled());
        let cache = match self.cache_store {
            Some(store) => Some(CacheGate::new(store)),
            None if needs_cache => Some(CacheGate::new(Arc::new(MemoryCacheStore::new(
                self.config.caching.capacity,
            )))),
            None => None,
        };

        let catalog = Arc::clone(&self.table.catalog);
        let dispatcher = Dispatcher::new(DispatcherParts {
            registry: Arc::new(self.registry),
            auth: AuthGate::new(self.strategies),
            validator: self.validator,
            cache,
            events: self.events,
            catalog,
            expose_debug: self.config.expose_debug_info,
            error_topic: self.config.error_event_topic.clone(),
        });

        let mut decorators: Vec<Arc<dyn ResponseDecorator>> = Vec::new();
        if self.config.cors.enabled {
            let mut cors = self.config.cors.clone();
            let id_header = &self.config.request_id_header;
            if !cors
                .expose_headers
                .iter()
                .any(|h| h.eq_ignore_ascii_case(id_header))
            {
                cors.expose_headers.push(id_header.clone());
            }
            decorators.push(Arc::new(CorsDecorator::new(&cors)));
        }
        if let Some(banner) = &self.config.server_banner {
            decorators.push(Arc::new(ServerBannerDecorator::new(banner.clone())));
        }
        decorators.extend(self.decorators);

        info!(
            routes_count = self.table.len(),
            caching = needs_cache,
            decorators = decorators.len(),
            "Gateway ready"
        );

        Ok(Gateway {
            table: Arc::new(self.table),
            router,
            dispatcher,
            ids: IdGenerator::new(self.config.request_id_prefix.as_str()),
            request_id_header: self.config.request_id_header,
            decorators,
        })
    }
}
