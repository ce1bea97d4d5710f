//! Integration tests for granting admin privileges from the dashboard.
//!
//! Run with: cargo test -p shopfront-integration-tests

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use shopfront_core::Role;
use shopfront_integration_tests::{PASSWORD, TestContext, location};

#[tokio::test]
async fn test_admin_grants_another_user() {
    let ctx = TestContext::new().await;
    ctx.seed_user("staff@shop.test", Some(Role::Admin)).await;
    let target = ctx.seed_user("helper@shop.test", None).await;
    ctx.login("staff@shop.test").await;

    let resp = ctx
        .post_form("/admin/grant", &[("user_id", target.as_str())])
        .await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&resp),
        Some(format!("/admin/dashboard?granted={target}"))
    );
    let profile = ctx.profiles.get(&target).await.unwrap().unwrap();
    assert_eq!(profile.role, Some(Role::Admin));

    // The new admin can use the gate right away
    let helper = TestContext::new_client();
    ctx.login_with(&helper, "helper@shop.test", PASSWORD).await;
    let resp = helper.get(ctx.url("/admin")).send().await.unwrap();
    assert_eq!(location(&resp).as_deref(), Some("/admin/dashboard"));
}

#[tokio::test]
async fn test_granted_message_is_rendered() {
    let ctx = TestContext::new().await;
    ctx.seed_user("staff@shop.test", Some(Role::Admin)).await;
    ctx.login("staff@shop.test").await;

    let body = ctx
        .get("/admin/dashboard?granted=helper-1")
        .await
        .text()
        .await
        .unwrap();

    assert!(body.contains("Admin privileges granted to helper-1."));
}

#[tokio::test]
async fn test_non_admin_cannot_grant() {
    let ctx = TestContext::new().await;
    let caller = ctx.seed_user("shopper@shop.test", None).await;
    ctx.login("shopper@shop.test").await;
    let writes_before = ctx.store.write_count();

    let resp = ctx
        .post_form("/admin/grant", &[("user_id", caller.as_str())])
        .await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(ctx.store.write_count(), writes_before);
    let profile = ctx.profiles.get(&caller).await.unwrap().unwrap();
    assert_eq!(profile.role, None);
}

#[tokio::test]
async fn test_anonymous_grant_redirects_to_sign_in() {
    let ctx = TestContext::new().await;
    let target = ctx.seed_user("helper@shop.test", None).await;

    let resp = ctx
        .post_form("/admin/grant", &[("user_id", target.as_str())])
        .await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&resp).as_deref(),
        Some("/auth/login?redirect=%2Fadmin%2Fgrant")
    );
    let profile = ctx.profiles.get(&target).await.unwrap().unwrap();
    assert_eq!(profile.role, None);
}

#[tokio::test]
async fn test_grant_to_unknown_user() {
    let ctx = TestContext::new().await;
    ctx.seed_user("staff@shop.test", Some(Role::Admin)).await;
    ctx.login("staff@shop.test").await;

    let resp = ctx
        .post_form("/admin/grant", &[("user_id", "nobody-here")])
        .await;

    assert_eq!(
        location(&resp).as_deref(),
        Some("/admin/dashboard?error=not_found")
    );
}

#[tokio::test]
async fn test_grant_with_malformed_user_id() {
    let ctx = TestContext::new().await;
    ctx.seed_user("staff@shop.test", Some(Role::Admin)).await;
    ctx.login("staff@shop.test").await;

    let resp = ctx
        .post_form("/admin/grant", &[("user_id", "users/escape")])
        .await;

    assert_eq!(
        location(&resp).as_deref(),
        Some("/admin/dashboard?error=invalid_user")
    );
}

#[tokio::test]
async fn test_listed_caller_can_grant_before_visiting_gate() {
    let ctx = TestContext::new().await;
    let owner = ctx
        .seed_user(shopfront_integration_tests::LISTED_ADMIN_EMAIL, None)
        .await;
    let target = ctx.seed_user("helper@shop.test", None).await;
    ctx.login(shopfront_integration_tests::LISTED_ADMIN_EMAIL).await;

    let resp = ctx
        .post_form("/admin/grant", &[("user_id", target.as_str())])
        .await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(ctx.profiles.get(&owner).await.unwrap().unwrap().is_admin());
    assert!(ctx.profiles.get(&target).await.unwrap().unwrap().is_admin());
}
