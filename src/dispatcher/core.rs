use crate::cache::{is_cache_requested, CacheGate, CacheKey};
use crate::envelope::{HeaderVecExt, ResponseEnvelope};
use crate::errors::{build_error_document, ErrorCatalog, ErrorCode};
use crate::events::{EventKind, EventSink, GatewayEvent};
use crate::ids::RequestId;
use crate::registry::HandlerRegistry;
use crate::router::RouteMatch;
use crate::security::{AuthGate, AuthInput, AuthOutcome, Principal};
use crate::server::{GatewayRequest, GatewayResponse, RequestContext};
use crate::spec::RouteDefinition;
use crate::validator::{reshape, ParameterValidator};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Pipeline states of one request.
///
/// `Responded` and `Errored` are terminal. Every other state may move to
/// `Errored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchState {
    Matched,
    Authenticating,
    Validating,
    CacheLookup,
    Invoking,
    Transforming,
    Responded,
    Errored,
}

impl DispatchState {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchState::Matched => "matched",
            DispatchState::Authenticating => "authenticating",
            DispatchState::Validating => "validating",
            DispatchState::CacheLookup => "cache_lookup",
            DispatchState::Invoking => "invoking",
            DispatchState::Transforming => "transforming",
            DispatchState::Responded => "responded",
            DispatchState::Errored => "errored",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DispatchState::Responded | DispatchState::Errored)
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of dispatching one request.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub response: GatewayResponse,
    /// States visited, in order; the last one is terminal.
    pub trace: Vec<DispatchState>,
    pub cache_hit: bool,
    pub principal: Option<Principal>,
}

impl DispatchOutcome {
    pub fn final_state(&self) -> DispatchState {
        self.trace.last().copied().unwrap_or(DispatchState::Errored)
    }

    pub fn visited(&self, state: DispatchState) -> bool {
        self.trace.contains(&state)
    }
}

struct StateTrace {
    request_id: String,
    states: Vec<DispatchState>,
    cache_hit: bool,
}

impl StateTrace {
    fn new(request_id: &RequestId) -> Self {
        Self {
            request_id: request_id.to_string(),
            states: vec![DispatchState::Matched],
            cache_hit: false,
        }
    }

    fn enter(&mut self, state: DispatchState) {
        let from = self.states.last().copied().unwrap_or(DispatchState::Matched);
        debug!(
            request_id = %self.request_id,
            from = %from,
            stage = %state,
            "Dispatcher transition"
        );
        self.states.push(state);
    }
}

/// Render a caught panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Drives a matched request through authenticate → validate → cache →
/// invoke → transform, and turns every failure into an error document.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    auth: AuthGate,
    validator: Arc<dyn ParameterValidator>,
    cache: Option<CacheGate>,
    events: Arc<dyn EventSink>,
    catalog: Arc<ErrorCatalog>,
    expose_debug: bool,
    error_topic: Option<String>,
}

/// Collaborators and settings of a [`Dispatcher`].
pub struct DispatcherParts {
    pub registry: Arc<HandlerRegistry>,
    pub auth: AuthGate,
    pub validator: Arc<dyn ParameterValidator>,
    pub cache: Option<CacheGate>,
    pub events: Arc<dyn EventSink>,
    pub catalog: Arc<ErrorCatalog>,
    pub expose_debug: bool,
    pub error_topic: Option<String>,
}

/// Successful end of the pipeline.
struct Completed {
    response: GatewayResponse,
    envelope: ResponseEnvelope,
}

impl Dispatcher {
    pub fn new(parts: DispatcherParts) -> Self {
        Self {
            registry: parts.registry,
            auth: parts.auth,
            validator: parts.validator,
            cache: parts.cache,
            events: parts.events,
            catalog: parts.catalog,
            expose_debug: parts.expose_debug,
            error_topic: parts.error_topic,
        }
    }

    pub fn catalog(&self) -> &Arc<ErrorCatalog> {
        &self.catalog
    }

    /// Run the pipeline for a matched request.
    ///
    /// Never fails: handler errors, panics and gate rejections all come back
    /// as an error document with the catalog-resolved status.
    pub async fn dispatch(
        &self,
        route: Arc<RouteDefinition>,
        request: GatewayRequest,
        route_match: RouteMatch,
        request_id: RequestId,
    ) -> DispatchOutcome {
        let start = Instant::now();
        let mut trace = StateTrace::new(&request_id);
        let mut ctx = RequestContext::new(
            Arc::clone(&route),
            request,
            route_match.path_params,
            route_match.format,
            request_id.clone(),
        );

        info!(
            request_id = %request_id,
            method = %route.method,
            route = %route.endpoint,
            handler = %route.handler_id(),
            "Dispatching request"
        );

        let result = AssertUnwindSafe(self.run(&mut ctx, &mut trace))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!(
                    request_id = %request_id,
                    handler = %route.handler_id(),
                    panic = %message,
                    "Request pipeline panicked"
                );
                Err(ResponseEnvelope::internal(format!("panic: {message}")))
            });

        let response = match result {
            Ok(completed) => {
                trace.enter(DispatchState::Responded);
                if let Some(topic) = &route.event {
                    self.events.emit(GatewayEvent {
                        topic: topic.clone(),
                        kind: EventKind::Success,
                        request_id: request_id.clone(),
                        route: Some(Arc::clone(&route)),
                        envelope: completed.envelope,
                        principal: ctx.principal.clone(),
                    });
                }
                completed.response
            }
            Err(envelope) => {
                trace.enter(DispatchState::Errored);
                self.error_response(&envelope, &request_id, Some(&route), ctx.principal.clone())
            }
        };

        info!(
            request_id = %request_id,
            status = response.status,
            stage = %trace.states.last().copied().unwrap_or(DispatchState::Errored),
            cache_hit = trace.cache_hit,
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );

        DispatchOutcome {
            response,
            trace: trace.states,
            cache_hit: trace.cache_hit,
            principal: ctx.principal,
        }
    }

    /// Render an errored envelope. Internal errors are logged and reported
    /// on the error topic.
    pub fn error_response(
        &self,
        envelope: &ResponseEnvelope,
        request_id: &RequestId,
        route: Option<&Arc<RouteDefinition>>,
        principal: Option<Principal>,
    ) -> GatewayResponse {
        let document = build_error_document(envelope, request_id, &self.catalog, self.expose_debug);
        if document.error_type.is_internal() {
            error!(
                request_id = %request_id,
                route = route.map(|r| r.endpoint.as_str()).unwrap_or("-"),
                debug_info = envelope.debug_info.as_deref().unwrap_or(""),
                "Internal error"
            );
            if let Some(topic) = &self.error_topic {
                self.events.emit(GatewayEvent {
                    topic: topic.clone(),
                    kind: EventKind::InternalError,
                    request_id: request_id.clone(),
                    route: route.cloned(),
                    envelope: envelope.clone(),
                    principal,
                });
            }
        } else {
            debug!(
                request_id = %request_id,
                error_type = %document.error_type,
                status = document.status_code,
                violations = document.message_detail.len(),
                "Error response"
            );
        }
        GatewayResponse::from_error_document(&document)
    }

    async fn run(
        &self,
        ctx: &mut RequestContext,
        trace: &mut StateTrace,
    ) -> Result<Completed, ResponseEnvelope> {
        let route = Arc::clone(&ctx.route);

        if let Some(spec) = route.authentication.as_ref() {
            trace.enter(DispatchState::Authenticating);
            let input = AuthInput {
                headers: &ctx.headers,
                params: &ctx.params,
                path_params: &ctx.path_params,
                required_permissions: &route.required_permissions,
            };
            match self.auth.authenticate(Some(spec), input).await {
                AuthOutcome::NotRequired => {}
                AuthOutcome::Authenticated(principal) => ctx.principal = Some(principal),
                AuthOutcome::Rejected(rejection) => return Err(rejection.into_envelope()),
            }
        }

        trace.enter(DispatchState::Validating);
        let params = ctx.merged_params();
        let messages = self
            .validator
            .validate(&route.parameters, &params, &ctx.files)
            .await;
        if !messages.is_empty() {
            return Err(ResponseEnvelope::error(ErrorCode::InvalidInput).with_violations(reshape(&messages)));
        }

        trace.enter(DispatchState::CacheLookup);
        let policy = route.caching.filter(|p| p.enabled);
        let cache = match (&self.cache, policy) {
            (Some(gate), Some(policy)) => Some((
                gate,
                policy,
                CacheKey::build(route.library_basename(), &route.callback, &params),
            )),
            _ => None,
        };

        let mut cached = None;
        if let Some((gate, _, key)) = &cache {
            if is_cache_requested(&params) {
                cached = gate.lookup(key).await;
            } else {
                debug!(request_id = %ctx.request_id, cache_key = %key, "Cache not requested");
            }
        }

        let envelope = match cached {
            Some(payload) => {
                trace.cache_hit = true;
                ResponseEnvelope::ok(payload)
            }
            None => {
                trace.enter(DispatchState::Invoking);
                let envelope = self.invoke(ctx).await?;
                if let (Some((gate, policy, key)), Some(data)) = (&cache, &envelope.data) {
                    gate.store(key, data.clone(), policy.ttl).await;
                }
                envelope
            }
        };

        trace.enter(DispatchState::Transforming);
        let response = self.transform(ctx, &envelope).await;
        Ok(Completed { response, envelope })
    }

    async fn invoke(&self, ctx: &RequestContext) -> Result<ResponseEnvelope, ResponseEnvelope> {
        let route = &ctx.route;
        let Some(handler) = self.registry.handler(route) else {
            return Err(ResponseEnvelope::internal(format!(
                "no handler registered for {}",
                route.handler_id()
            )));
        };

        let start = Instant::now();
        let envelope = handler.call(ctx).await.map_err(|e| {
            warn!(
                request_id = %ctx.request_id,
                handler = %route.handler_id(),
                error = %e,
                "Handler returned an error"
            );
            ResponseEnvelope::internal(format!("{e:#}"))
        })?;
        debug!(
            request_id = %ctx.request_id,
            handler = %route.handler_id(),
            status = envelope.status,
            error_code = ?envelope.error_code,
            latency_ms = start.elapsed().as_millis() as u64,
            "Handler returned"
        );

        if envelope.is_error() {
            return Err(envelope);
        }
        Ok(envelope)
    }

    /// Apply the route's output transform. A missing, failing or panicking
    /// transform falls back to the raw envelope.
    async fn transform(&self, ctx: &RequestContext, envelope: &ResponseEnvelope) -> GatewayResponse {
        let route = &ctx.route;
        let output = match self.registry.transform(route) {
            Some(transform) => {
                match AssertUnwindSafe(transform.transform(ctx, envelope))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(output)) => Some(output),
                    Ok(Err(e)) => {
                        warn!(
                            request_id = %ctx.request_id,
                            output_library = %route.output_library,
                            error = %e,
                            "Output transform failed, sending raw envelope"
                        );
                        None
                    }
                    Err(payload) => {
                        warn!(
                            request_id = %ctx.request_id,
                            output_library = %route.output_library,
                            panic = %panic_message(payload.as_ref()),
                            "Output transform panicked, sending raw envelope"
                        );
                        None
                    }
                }
            }
            None => {
                debug!(
                    request_id = %ctx.request_id,
                    output_library = %route.output_library,
                    callback = %route.callback,
                    "No output transform registered, sending raw envelope"
                );
                None
            }
        };

        match output {
            Some(output) => {
                let mut response = GatewayResponse {
                    status: output.status,
                    headers: envelope.headers.clone(),
                    body: output.body,
                };
                for (name, value) in output.headers {
                    response.set_header(&name, value);
                }
                response.set_header("Content-Type", output.content_type);
                response
            }
            None => {
                let mut response = GatewayResponse::json(
                    envelope.status,
                    envelope.data.clone().unwrap_or(Value::Null),
                );
                for (name, value) in &envelope.headers {
                    response.headers.set_header(name, value.clone());
                }
                response.set_header("Content-Type", envelope.content_type.clone());
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(DispatchState::Responded.is_terminal());
        assert!(DispatchState::Errored.is_terminal());
        assert!(!DispatchState::CacheLookup.is_terminal());
        assert_eq!(DispatchState::CacheLookup.to_string(), "cache_lookup");
    }

    #[test]
    fn panic_payloads_render() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
