use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, warn};

use crate::app::AppState;
use crate::auth::{resolve_identity, Identity};
use crate::database::models::Profile;
use crate::error::ApiError;
use crate::policy::{self, classify_route, AccessDecision, Role, RouteClass};

/// The caller as resolved once per request by `access_policy_middleware`.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().and_then(|p| p.role)
    }

    /// Identity for handlers that act on the caller's own records.
    pub fn require_identity(&self) -> Result<&Identity, ApiError> {
        self.identity
            .as_ref()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Resolve identity, then profile. Neither step fails the request: an
/// unusable token is anonymous and an unreadable profile has no role.
pub async fn resolve_caller(state: &AppState, headers: &HeaderMap) -> Caller {
    let Some(identity) = resolve_identity(headers, &state.config.security) else {
        return Caller::anonymous();
    };

    let profile = match state.profiles.get_profile(identity.user_id).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!("Profile lookup failed for {}: {}", identity.user_id, e);
            None
        }
    };

    Caller {
        identity: Some(identity),
        profile,
    }
}

fn enforce(caller: &Caller, path: &str) -> Option<Response> {
    let decision = policy::decide(caller.is_authenticated(), caller.role(), path);
    let location = decision.location(path)?;

    if let AccessDecision::Redirect { target, .. } = decision {
        debug!(
            path,
            class = classify_route(path).as_str(),
            role = caller.role().map(|r| r.as_str()).unwrap_or("none"),
            authenticated = caller.is_authenticated(),
            target,
            "Access policy redirect"
        );
    }
    Some(Redirect::temporary(&location).into_response())
}

/// Gate every request through the access policy and thread the resolved
/// `Caller` to handlers as a request extension.
pub async fn access_policy_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    // Public routes never consult the session.
    if classify_route(&path) == RouteClass::Public {
        request.extensions_mut().insert(Caller::anonymous());
        return next.run(request).await;
    }

    let caller = resolve_caller(&state, request.headers()).await;
    if let Some(redirect) = enforce(&caller, &path) {
        return redirect;
    }

    request.extensions_mut().insert(caller);
    next.run(request).await
}

/// Route layer for the role areas: re-applies the policy to the caller the
/// outer middleware already resolved.
pub async fn area_guard(request: Request, next: Next) -> Response {
    let caller = request.extensions().get::<Caller>().cloned().unwrap_or_default();
    if let Some(redirect) = enforce(&caller, request.uri().path()) {
        return redirect;
    }
    next.run(request).await
}
