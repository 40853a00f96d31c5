mod common;

use anyhow::Result;
use chrono::{Days, Utc};
use reqwest::StatusCode;
use serde_json::Value;

use brandhub::database::models::{CapacityRule, EnrollmentStatus};
use brandhub::policy::Role;
use brandhub::store::LearningStore;

use common::spawn_app;

#[tokio::test]
async fn browse_flags_enrolled_courses() -> Result<()> {
    let app = spawn_app().await?;
    let student = app.user(Some(Role::Student)).await?;
    let joined = app.course("Joined", 10).await?;
    app.course("Open", 3).await?;
    app.store.enroll(student.id, joined, CapacityRule::Enforce).await?;

    let res = app.get("/dashboard/student/browse", Some(&student)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let courses = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(courses.len(), 2);

    let by_title = |title: &str| courses.iter().find(|c| c["title"] == title).cloned().unwrap_or_default();
    assert_eq!(by_title("Joined")["enrolled"], true);
    assert_eq!(by_title("Joined")["seats_left"], 9);
    assert_eq!(by_title("Open")["enrolled"], false);
    assert_eq!(by_title("Open")["seats_left"], 3);
    Ok(())
}

#[tokio::test]
async fn self_enrollment_enforces_uniqueness_and_capacity() -> Result<()> {
    let app = spawn_app().await?;
    let first = app.user(Some(Role::Student)).await?;
    let second = app.user(Some(Role::Student)).await?;
    let course = app.course("One Seat", 1).await?;
    let path = format!("/dashboard/student/browse/{}/enroll", course);

    let res = app.post_json(&path, &first, &Value::Null).await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["message"], "Successfully enrolled!");
    assert_eq!(body["data"]["enrollment"]["status"], "active");
    assert_eq!(body["data"]["enrollment"]["progress"], 0);

    let res = app.post_json(&path, &first, &Value::Null).await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Already enrolled in this course");

    let res = app.post_json(&path, &second, &Value::Null).await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Course is full");

    assert_eq!(app.store.get_course(course).await?.current_enrolled, 1);
    Ok(())
}

#[tokio::test]
async fn overview_courses_and_certificates() -> Result<()> {
    let app = spawn_app().await?;
    let student = app.user(Some(Role::Student)).await?;
    let ongoing = app.course("Ongoing", 10).await?;
    let finished = app.course("Finished", 10).await?;
    app.store.enroll(student.id, ongoing, CapacityRule::Enforce).await?;
    let done = app.store.enroll(student.id, finished, CapacityRule::Enforce).await?;
    app.store.set_progress(done.id, 100, EnrollmentStatus::Completed).await?;

    let res = app.get("/dashboard/student", Some(&student)).await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["student"]["email"], student.email.as_str());
    assert_eq!(body["data"]["completed_count"], 1);
    let active = body["data"]["active_enrollments"].as_array().cloned().unwrap_or_default();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["course_title"], "Ongoing");

    let res = app.get("/dashboard/student/courses", Some(&student)).await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let res = app.get("/dashboard/student/certificates", Some(&student)).await?;
    let body: Value = res.json().await?;
    let certificates = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(certificates.len(), 1);
    assert_eq!(certificates[0]["course_title"], "Finished");
    assert_eq!(certificates[0]["progress"], 100);
    Ok(())
}

#[tokio::test]
async fn admin_in_student_area_has_no_record() -> Result<()> {
    let app = spawn_app().await?;
    let admin = app.user(Some(Role::Admin)).await?;

    let res = app.get("/dashboard/student", Some(&admin)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert!(body["data"]["student"].is_null());
    assert_eq!(body["data"]["completed_count"], 0);
    Ok(())
}

#[tokio::test]
async fn progress_reports_averages_over_every_enrollment() -> Result<()> {
    let app = spawn_app().await?;
    let student = app.user(Some(Role::Student)).await?;
    let finished = app.course("Finished", 10).await?;
    let ongoing = app.course("Ongoing", 10).await?;
    let done = app.store.enroll(student.id, finished, CapacityRule::Enforce).await?;
    let current = app.store.enroll(student.id, ongoing, CapacityRule::Enforce).await?;
    app.store.set_progress(done.id, 100, EnrollmentStatus::Completed).await?;
    app.store.set_progress(current.id, 45, EnrollmentStatus::Active).await?;
    app.store.set_engagement(student.id, 72).await?;

    let res = app.get("/dashboard/student/progress", Some(&student)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["engagement_score"], 72);
    assert_eq!(body["data"]["avg_progress"], 73);
    assert_eq!(body["data"]["completed_count"], 1);
    assert_eq!(body["data"]["enrollments"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn progress_without_student_record_is_empty() -> Result<()> {
    let app = spawn_app().await?;
    let admin = app.user(Some(Role::Admin)).await?;

    let res = app.get("/dashboard/student/progress", Some(&admin)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["engagement_score"], 0);
    assert_eq!(body["data"]["avg_progress"], 0);
    assert_eq!(body["data"]["enrollments"], serde_json::json!([]));
    Ok(())
}

#[tokio::test]
async fn schedule_groups_upcoming_courses_by_start_date() -> Result<()> {
    let app = spawn_app().await?;
    let student = app.user(Some(Role::Student)).await?;
    let today = Utc::now().date_naive();

    let ended = app.course_dated("Ended", today - Days::new(30), today - Days::new(1)).await?;
    let running = app.course_dated("Running", today - Days::new(5), today + Days::new(5)).await?;
    let soon_a = app.course_dated("Soon A", today + Days::new(7), today + Days::new(40)).await?;
    let soon_b = app.course_dated("Soon B", today + Days::new(7), today + Days::new(20)).await?;
    let dropped = app.course_dated("Dropped", today + Days::new(2), today + Days::new(9)).await?;
    for course in [ended, running, soon_a, soon_b, dropped] {
        let enrollment = app.store.enroll(student.id, course, CapacityRule::Enforce).await?;
        if course == dropped {
            app.store.set_progress(enrollment.id, 0, EnrollmentStatus::Dropped).await?;
        }
    }

    let res = app.get("/dashboard/student/schedule", Some(&student)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let days = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(days.len(), 2);

    assert_eq!(days[0]["date"], (today - Days::new(5)).to_string().as_str());
    assert_eq!(days[0]["courses"][0]["course_title"], "Running");

    assert_eq!(days[1]["date"], (today + Days::new(7)).to_string().as_str());
    let mut titles: Vec<String> = days[1]["courses"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .filter_map(|c| c["course_title"].as_str().map(str::to_string))
        .collect();
    titles.sort();
    assert_eq!(titles, ["Soon A", "Soon B"]);
    Ok(())
}
