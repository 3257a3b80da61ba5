mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::spawn_app;

#[tokio::test]
async fn auth_edge_cases() -> Result<()> {
    let app = spawn_app().await?;

    // 1. Register with short password
    let (status, _) = app
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "name": "Short Pass", "email": "short@example.com", "password": "short" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "Should fail with bad request for short password");

    // 2. First valid user becomes admin, the second does not
    let (status, first) = app
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "name": "Valid User", "email": "Valid@Example.com", "password": "password123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["user"]["email"], "valid@example.com");
    assert_eq!(first["user"]["roles"], json!(["admin"]));

    let (second_token, _) = app.register("Second", "second@example.com").await?;
    let (status, me) = app.send("GET", "/auth/me", Some(&second_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["roles"], json!([]));

    // 3. Duplicate email
    let (status, _) = app
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "name": "Again", "email": "valid@example.com", "password": "password123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // 4. Login with wrong password
    let (status, _) = app
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "valid@example.com", "password": "wrongpassword" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "Should fail with unauthorized for wrong password");

    // 5. Login with non-existent email
    let (status, _) = app
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "password123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "Should fail with unauthorized for non-existent user");

    // 6. Protected routes without token, or with a garbage token
    let (status, _) = app.send("GET", "/access-requests", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "Should fail with unauthorized for missing token");
    let (status, _) = app.send("GET", "/access-requests", Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 7. Non-admins cannot manage roles
    let (status, value) = app
        .send(
            "POST",
            &format!("/users/{}/roles", first["user"]["id"].as_str().unwrap_or_default()),
            Some(&second_token),
            Some(json!({ "role": "it" })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(value["error"], "forbidden");

    // 8. The last admin cannot drop the role
    let admin_token = first["token"].as_str().unwrap_or_default().to_string();
    let admin_id = first["user"]["id"].as_str().unwrap_or_default().to_string();
    let (status, _) = app
        .send("DELETE", &format!("/users/{}/roles/admin", admin_id), Some(&admin_token), None)
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send("DELETE", &format!("/users/{}/roles/superuser", admin_id), Some(&admin_token), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}
