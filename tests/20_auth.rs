mod common;

use anyhow::Result;
use reqwest::{header, StatusCode};
use uuid::Uuid;

use brandhub::policy::Role;
use brandhub::store::{LearningStore, ProfileStore};

use common::{location, message_param, session_cookie, spawn_app, PASSWORD};

#[tokio::test]
async fn signup_then_login_lands_on_role_home() -> Result<()> {
    let app = spawn_app().await?;

    let res = app
        .post_form(
            "/signup",
            &[("email", "Ada@Example.test"), ("password", PASSWORD), ("name", "Ada"), ("city", "Austin")],
        )
        .await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let target = location(&res).unwrap_or_default();
    assert!(target.starts_with("/login?"));
    assert_eq!(
        message_param(&target).as_deref(),
        Some("Account created successfully! Please sign in.")
    );

    // Emails are stored lowercased, so any casing signs in.
    let res = app.login("ADA@example.test", PASSWORD).await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res).as_deref(), Some("/dashboard/student"));

    let set_cookie = res.headers().get(header::SET_COOKIE).and_then(|v| v.to_str().ok()).unwrap_or_default();
    assert!(set_cookie.starts_with("brandhub_session="));
    assert!(set_cookie.contains("HttpOnly"));

    // Default role is student, with a student record behind it.
    let account = app.store.find_account("ada@example.test").await?.expect("account");
    let student = app.store.get_student(account.id).await?;
    assert_eq!(student.city.as_deref(), Some("Austin"));
    assert_eq!(student.engagement_score, 0);
    Ok(())
}

#[tokio::test]
async fn instructor_signup_creates_instructor_profile() -> Result<()> {
    let app = spawn_app().await?;

    let res = app
        .post_form(
            "/signup",
            &[("email", "ivy@example.test"), ("password", PASSWORD), ("name", "Ivy"), ("role", "instructor")],
        )
        .await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let instructors = app.store.list_instructors().await?;
    assert_eq!(instructors.len(), 1);
    assert_eq!(instructors[0].role, Some(Role::Instructor));

    let res = app.login("ivy@example.test", PASSWORD).await?;
    assert_eq!(location(&res).as_deref(), Some("/dashboard/instructor"));
    Ok(())
}

#[tokio::test]
async fn signup_rejects_bad_input_with_message() -> Result<()> {
    let app = spawn_app().await?;

    let cases: [(&[(&str, &str)], &str); 4] = [
        (
            &[("email", "a@example.test"), ("password", PASSWORD), ("name", "A"), ("role", "superuser")],
            "Invalid role selected",
        ),
        (
            &[("email", "a@example.test"), ("password", PASSWORD), ("name", "A"), ("role", "Admin")],
            "Invalid role selected",
        ),
        (
            &[("email", "a@example.test"), ("password", "short"), ("name", "A")],
            "Password must be at least 6 characters",
        ),
        (
            &[("email", "not-an-email"), ("password", PASSWORD), ("name", "A")],
            "Please enter a valid email address",
        ),
    ];

    for (form, expected) in cases {
        let res = app.post_form("/signup", form).await?;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        let target = location(&res).unwrap_or_default();
        assert!(target.starts_with("/signup?"), "{}", target);
        assert_eq!(message_param(&target).as_deref(), Some(expected));
    }
    assert!(app.store.find_account("a@example.test").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_reported() -> Result<()> {
    let app = spawn_app().await?;
    app.create_account("dup@example.test", "First", Role::Student).await?;

    let res = app
        .post_form("/signup", &[("email", "dup@example.test"), ("password", PASSWORD), ("name", "Second")])
        .await?;
    let target = location(&res).unwrap_or_default();
    assert_eq!(
        message_param(&target).as_deref(),
        Some("An account with this email already exists")
    );
    Ok(())
}

#[tokio::test]
async fn failed_signup_leaves_nothing_behind() -> Result<()> {
    let app = spawn_app().await?;
    let missing_brand = Uuid::new_v4().to_string();

    let res = app
        .post_form(
            "/signup",
            &[("email", "ghost@example.test"), ("password", PASSWORD), ("name", "Ghost"), ("brand_id", missing_brand.as_str())],
        )
        .await?;
    let target = location(&res).unwrap_or_default();
    assert_eq!(message_param(&target).as_deref(), Some("Invalid brand selected"));

    assert!(app.store.find_account("ghost@example.test").await?.is_none());
    assert!(app.store.list_students(Some("ghost")).await?.is_empty());

    let res = app.login("ghost@example.test", PASSWORD).await?;
    assert_eq!(
        message_param(&location(&res).unwrap_or_default()).as_deref(),
        Some("Invalid email or password")
    );
    Ok(())
}

#[tokio::test]
async fn wrong_password_redirects_back_without_session() -> Result<()> {
    let app = spawn_app().await?;
    app.create_account("sam@example.test", "Sam", Role::Student).await?;

    let res = app.login("sam@example.test", "wrong-password").await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&res).as_deref(),
        Some("/login?message=Invalid+email+or+password")
    );
    assert!(session_cookie(&res).is_none());

    let res = app.login("nobody@example.test", PASSWORD).await?;
    assert_eq!(
        location(&res).as_deref(),
        Some("/login?message=Invalid+email+or+password")
    );
    Ok(())
}

#[tokio::test]
async fn login_returns_to_requested_page() -> Result<()> {
    let app = spawn_app().await?;
    app.create_account("root@example.test", "Root", Role::Admin).await?;

    let res = app
        .post_form(
            "/login",
            &[("email", "root@example.test"), ("password", PASSWORD), ("redirect", "/dashboard/admin/students")],
        )
        .await?;
    assert_eq!(location(&res).as_deref(), Some("/dashboard/admin/students"));

    let res = app
        .post_form(
            "/login",
            &[("email", "root@example.test"), ("password", PASSWORD), ("redirect", "https://elsewhere.test/")],
        )
        .await?;
    assert_eq!(location(&res).as_deref(), Some("/dashboard/admin"));
    Ok(())
}

#[tokio::test]
async fn login_form_echoes_redirect_and_message() -> Result<()> {
    let app = spawn_app().await?;

    let res = app.get("/login?redirect=%2Fdashboard%2Fstudent&message=Hello", None).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await?;
    assert_eq!(body["data"]["redirect"], "/dashboard/student");
    assert_eq!(body["data"]["message"], "Hello");
    Ok(())
}

#[tokio::test]
async fn signout_expires_cookie() -> Result<()> {
    let app = spawn_app().await?;
    let user = app.user(Some(Role::Student)).await?;

    let res = app
        .client
        .post(app.url("/auth/signout"))
        .header(header::COOKIE, &user.cookie)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res).as_deref(), Some("/login"));
    let set_cookie = res.headers().get(header::SET_COOKIE).and_then(|v| v.to_str().ok()).unwrap_or_default();
    assert!(set_cookie.starts_with("brandhub_session=;"));
    assert!(set_cookie.contains("Max-Age=0"));
    Ok(())
}

#[tokio::test]
async fn unsafe_redirect_falls_back_to_role_home() -> Result<()> {
    let app = spawn_app().await?;
    app.create_account("sue@example.test", "Sue", Role::Student).await?;

    let res = app
        .post_form(
            "/login",
            &[
                ("email", "sue@example.test"),
                ("password", PASSWORD),
                ("redirect", "/dashboard/student/x\nSet-Cookie: a=b"),
            ],
        )
        .await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res).as_deref(), Some("/dashboard/student"));
    assert!(session_cookie(&res).is_some_and(|c| c.starts_with("brandhub_session=")));

    // The server is still serving afterwards.
    let res = app.get("/health", None).await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}
