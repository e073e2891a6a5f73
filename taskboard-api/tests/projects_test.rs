/// Integration tests for projects, memberships, plans and documents

mod common;

use axum::http::StatusCode;
use common::TestContext;
use serde_json::json;
use taskboard_shared::models::{membership::MemberRole, project::ProjectPlan};

#[tokio::test]
async fn test_create_and_list_projects() {
    let ctx = TestContext::new();
    let (_, cookie) = ctx.user_with_session("founder").await;

    let (status, project) = ctx
        .send("POST", "/v1/projects", Some(&cookie), Some(json!({ "name": "Apollo" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(project["plan"], "free");

    let (status, projects) = ctx.send("GET", "/v1/projects", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    let projects = projects.as_array().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["name"], "Apollo");
    assert_eq!(projects[0]["role"], "admin");

    let (status, body) = ctx
        .send("POST", "/v1/projects", Some(&cookie), Some(json!({ "name": "" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "name");
}

#[tokio::test]
async fn test_admin_only_operations() {
    let ctx = TestContext::new();
    let (admin, admin_cookie) = ctx.user_with_session("admin").await;
    let (member, member_cookie) = ctx.user_with_session("member").await;
    let project = ctx.create_project(&admin, "Gemini").await;
    ctx.add_member(project.id, &member, MemberRole::Member).await;

    let uri = format!("/v1/projects/{}", project.id);
    let update = json!({ "description": "Orbital rendezvous" });

    let (status, body) = ctx.send("PATCH", &uri, Some(&member_cookie), Some(update.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access denied");

    let (status, updated) = ctx.send("PATCH", &uri, Some(&admin_cookie), Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["description"], "Orbital rendezvous");
    assert_eq!(updated["name"], "Gemini");

    let (status, _) = ctx.send("DELETE", &uri, Some(&member_cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.send("DELETE", &uri, Some(&admin_cookie), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = ctx.send("GET", &uri, Some(&admin_cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_last_member_cannot_be_removed() {
    let ctx = TestContext::new();
    let (admin, cookie) = ctx.user_with_session("solo").await;
    let project = ctx.create_project(&admin, "Solo").await;

    let (status, _) = ctx
        .send(
            "DELETE",
            &format!("/v1/projects/{}/members/{}", project.id, admin.id),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, members) = ctx
        .send("GET", &format!("/v1/projects/{}/members", project.id), Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_role_changes() {
    let ctx = TestContext::new();
    let (admin, admin_cookie) = ctx.user_with_session("admin").await;
    let co_admin = ctx.create_user("co-admin").await;
    let (member, _) = ctx.user_with_session("member").await;
    let project = ctx.create_project(&admin, "Mercury").await;
    ctx.add_member(project.id, &co_admin, MemberRole::Admin).await;
    ctx.add_member(project.id, &member, MemberRole::Viewer).await;

    let role_uri = |user_id| format!("/v1/projects/{}/members/{}", project.id, user_id);

    let (status, _) = ctx
        .send("PATCH", &role_uri(admin.id), Some(&admin_cookie), Some(json!({ "role": "viewer" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, membership) = ctx
        .send("PATCH", &role_uri(member.id), Some(&admin_cookie), Some(json!({ "role": "member" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(membership["role"], "member");

    let (_, members) = ctx
        .send("GET", &format!("/v1/projects/{}/members", project.id), Some(&admin_cookie), None)
        .await;
    let role_of = |user_id: uuid::Uuid| {
        members
            .as_array()
            .unwrap()
            .iter()
            .find(|m| m["user_id"] == user_id.to_string())
            .map(|m| m["role"].clone())
            .unwrap()
    };
    assert_eq!(role_of(admin.id), "admin");
    assert_eq!(role_of(co_admin.id), "admin");
    assert_eq!(role_of(member.id), "member");

    let (status, _) = ctx.send("DELETE", &role_uri(member.id), Some(&admin_cookie), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_invitation_flow() {
    let ctx = TestContext::new();
    let (admin, admin_cookie) = ctx.user_with_session("host").await;
    let (guest, guest_cookie) = ctx.user_with_session("guest").await;
    let (_, intruder_cookie) = ctx.user_with_session("intruder").await;
    let project = ctx.create_project(&admin, "Skylab").await;

    let invitations = format!("/v1/projects/{}/invitations", project.id);

    let (status, _) = ctx
        .send("POST", &invitations, Some(&guest_cookie), Some(json!({ "email": guest.email })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, invitation) = ctx
        .send(
            "POST",
            &invitations,
            Some(&admin_cookie),
            Some(json!({ "email": guest.email.to_uppercase(), "role": "viewer" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(invitation["email"], guest.email);
    let accept = format!("/v1/invitations/{}/accept", invitation["token"].as_str().unwrap());

    let (status, _) = ctx.send("POST", &accept, Some(&intruder_cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, membership) = ctx.send("POST", &accept, Some(&guest_cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(membership["role"], "viewer");

    let (status, _) = ctx.send("POST", &accept, Some(&guest_cookie), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx
        .send("POST", &invitations, Some(&admin_cookie), Some(json!({ "email": guest.email })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, members) = ctx
        .send("GET", &format!("/v1/projects/{}/members", project.id), Some(&guest_cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_statistics_follow_the_plan() {
    let ctx = TestContext::new();
    let (admin, cookie) = ctx.user_with_session("analyst").await;
    let project = ctx.create_project(&admin, "Voyager").await;
    let uri = format!("/v1/projects/{}/statistics", project.id);

    for (title, status) in [("a", "todo"), ("b", "todo"), ("c", "done")] {
        let (code, _) = ctx
            .send(
                "POST",
                &format!("/v1/projects/{}/tasks", project.id),
                Some(&cookie),
                Some(json!({ "title": title, "status": status })),
            )
            .await;
        assert_eq!(code, StatusCode::CREATED);
    }

    let (status, body) = ctx.send("GET", &uri, Some(&cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access denied");

    assert!(ctx.store.set_plan(project.id, ProjectPlan::Pro).await);

    let (status, stats) = ctx.send("GET", &uri, Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_tasks"], 3);
    assert_eq!(stats["completed_tasks"], 1);
    assert_eq!(stats["total_members"], 1);
    let todo = stats["by_status"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["status"] == "todo")
        .unwrap();
    assert_eq!(todo["count"], 2);
}

#[tokio::test]
async fn test_unauthenticated_requests_never_reach_membership() {
    let ctx = TestContext::new();
    let admin = ctx.create_user("owner").await;
    let project = ctx.create_project(&admin, "Hubble").await;

    for uri in [
        format!("/v1/projects/{}/tasks", project.id),
        format!("/v1/projects/{}/members", project.id),
        format!("/v1/projects/{}/statistics", project.id),
        "/v1/board".to_string(),
    ] {
        let (status, _) = ctx.send("GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }

    assert_eq!(ctx.store.membership_lookups(), 0);
    assert_eq!(ctx.store.plan_lookups(), 0);
}

#[tokio::test]
async fn test_documents_follow_roles() {
    let ctx = TestContext::new();
    let (admin, admin_cookie) = ctx.user_with_session("writer").await;
    let (viewer, viewer_cookie) = ctx.user_with_session("reader").await;
    let (_, outsider_cookie) = ctx.user_with_session("outsider").await;
    let project = ctx.create_project(&admin, "Cassini").await;
    ctx.add_member(project.id, &viewer, MemberRole::Viewer).await;

    let documents = format!("/v1/projects/{}/documents", project.id);
    let body = json!({ "title": "Runbook", "content": { "steps": ["check", "launch"] } });

    let (status, _) = ctx.send("POST", &documents, Some(&viewer_cookie), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, document) = ctx.send("POST", &documents, Some(&admin_cookie), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let document_uri = format!("/v1/documents/{}", document["id"].as_str().unwrap());

    let (status, fetched) = ctx.send("GET", &document_uri, Some(&viewer_cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["content"]["steps"][1], "launch");

    let (status, _) = ctx.send("GET", &document_uri, Some(&outsider_cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, listed) = ctx.send("GET", &documents, Some(&viewer_cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = ctx.send("DELETE", &document_uri, Some(&admin_cookie), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_health_without_backends() {
    let ctx = TestContext::new();
    let response = ctx.send_raw("GET", "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");

    let (_, body) = ctx.send("GET", "/health", None, None).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "not_configured");
}
