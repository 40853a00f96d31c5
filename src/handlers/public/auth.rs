// handlers/public/auth.rs - Login, signup and signout form actions
//
// Form actions answer with 303 redirects. Failures go back to the form with
// a `message` query parameter instead of an error body.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::session::{clear_session_cookie, session_cookie};
use crate::auth::{
    generate_jwt, hash_password, normalize_email, validate_email_format, validate_password, verify_password, Claims,
};
use crate::database::models::{ContactDetails, NewAccount};
use crate::handlers::{non_blank, with_message};
use crate::policy::{self, role_home, Role, LOGIN_PATH, SIGNUP_PATH};
use crate::store::StoreError;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const SIGNUP_SUCCESS: &str = "Account created successfully! Please sign in.";

#[derive(Debug, Default, Deserialize)]
pub struct FormQuery {
    pub redirect: Option<String>,
    pub message: Option<String>,
}

/// GET /login - login form descriptor
pub async fn login_get(Query(query): Query<FormQuery>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "form": "login",
            "action": LOGIN_PATH,
            "fields": ["email", "password", "redirect"],
            "redirect": query.redirect,
            "message": query.message,
        }
    }))
}

/// GET /signup - signup form descriptor
pub async fn signup_get(Query(query): Query<FormQuery>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "form": "signup",
            "action": SIGNUP_PATH,
            "fields": ["email", "password", "name", "role", "brand_id"],
            "roles": Role::ALL.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
            "message": query.message,
        }
    }))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub redirect: Option<String>,
}

/// POST /login - verify credentials, set the session cookie, send the user home
pub async fn login_post(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let email = normalize_email(&form.email);
    let fail = || Redirect::to(&with_message(LOGIN_PATH, INVALID_CREDENTIALS)).into_response();

    let account = match state.profiles.find_account(&email).await {
        Ok(Some(account)) if verify_password(&form.password, &account.password_hash) => account,
        Ok(_) => {
            info!("Failed login for {}", email);
            return fail();
        }
        Err(e) => {
            warn!("Account lookup failed for {}: {}", email, e);
            return fail();
        }
    };

    let role = match state.profiles.get_profile(account.id).await {
        Ok(profile) => profile.and_then(|p| p.role),
        Err(e) => {
            warn!("Profile lookup failed for {}: {}", account.id, e);
            None
        }
    };

    let security = &state.config.security;
    let claims = Claims::new(account.id, account.email.clone(), security.jwt_expiry_hours);
    let token = match generate_jwt(&claims, &security.jwt_secret) {
        Ok(token) => token,
        Err(e) => {
            error!("Failed to issue session token: {}", e);
            return Redirect::to(&with_message(LOGIN_PATH, "Could not sign in. Please try again.")).into_response();
        }
    };

    let target = post_login_target(form.redirect.as_deref(), role);
    info!("User {} signed in as {}", account.id, role.map(|r| r.as_str()).unwrap_or("none"));

    (
        [(header::SET_COOKIE, session_cookie(security, &token))],
        Redirect::to(&target),
    )
        .into_response()
}

/// Honor a requested dashboard path only if the policy would let this role
/// through; anything else (external URLs, forbidden areas, paths that cannot
/// be a `Location` value) goes to role home.
fn post_login_target(requested: Option<&str>, role: Option<Role>) -> String {
    match requested {
        Some(path)
            if path.starts_with(policy::DASHBOARD_PATH)
                && !path.starts_with("//")
                && !path.chars().any(char::is_control)
                && HeaderValue::from_str(path).is_ok()
                && policy::decide(true, role, path).is_allow() =>
        {
            path.to_string()
        }
        _ => role_home(role).to_string(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Option<String>,
    pub brand_id: Option<String>,
    #[serde(flatten)]
    pub contact: ContactDetails,
}

/// POST /signup - create account, profile and role record in one unit
pub async fn signup_post(State(state): State<AppState>, Form(form): Form<SignupForm>) -> Response {
    let back = |message: &str| Redirect::to(&with_message(SIGNUP_PATH, message)).into_response();

    let role = match non_blank(form.role) {
        None => Role::Student,
        Some(value) => match Role::parse(&value) {
            Some(role) => role,
            None => return back("Invalid role selected"),
        },
    };

    let email = normalize_email(&form.email);
    if !validate_email_format(&email) {
        return back("Please enter a valid email address");
    }
    if let Err(message) = validate_password(&form.password) {
        return back(&message);
    }
    let name = form.name.trim().to_string();
    if name.is_empty() {
        return back("Name is required");
    }
    let brand_id = match non_blank(form.brand_id) {
        None => None,
        Some(value) => match Uuid::parse_str(&value) {
            Ok(id) => Some(id),
            Err(_) => return back("Invalid brand selected"),
        },
    };

    let password_hash = match hash_password(&form.password) {
        Ok(hash) => hash,
        Err(e) => {
            error!("Password hashing failed: {}", e);
            return back("Could not create account");
        }
    };

    let account = NewAccount {
        email,
        name,
        password_hash,
        role,
        brand_id,
        contact: form.contact,
    };

    match state.profiles.register_account(account).await {
        Ok(profile) => {
            info!("Registered {} as {}", profile.id, role);
            Redirect::to(&with_message(LOGIN_PATH, SIGNUP_SUCCESS)).into_response()
        }
        Err(StoreError::Conflict(message)) => back(&message),
        Err(StoreError::NotFound(_)) => back("Invalid brand selected"),
        Err(e) => {
            error!("Signup failed: {}", e);
            back("Could not create account")
        }
    }
}

/// POST /auth/signout - expire the session cookie
pub async fn signout_post(State(state): State<AppState>) -> Response {
    (
        [(header::SET_COOKIE, clear_session_cookie(&state.config.security))],
        Redirect::to(LOGIN_PATH),
    )
        .into_response()
}
