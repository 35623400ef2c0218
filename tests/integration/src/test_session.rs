//! `SSO_SESSION_ID` integration tests.

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use ssoguard_core::UserId;

    use crate::{spawn_gateway, test_user};

    fn logged_in_cookie(resp: &reqwest::Response) -> String {
        resp.headers()
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("sso_display_logged_in="))
            .expect("logged-in cookie")
            .to_owned()
    }

    #[tokio::test]
    async fn test_should_return_session_user() {
        let gateway = spawn_gateway().await;
        gateway.users.insert(test_user(1, 0));
        let key = gateway.sessions.create(UserId::new(1), Duration::hours(1));

        let resp = gateway
            .signed_get("/api/v1/session-user/")
            .header("Authorization", format!("SSO_SESSION_ID {key}"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 200);
        assert!(logged_in_cookie(&resp).starts_with("sso_display_logged_in=true"));
        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["email"], "user1@example.com");
    }

    #[tokio::test]
    async fn test_should_reject_invalidated_session() {
        let gateway = spawn_gateway().await;
        gateway.users.insert(test_user(1, 0));
        let key = gateway.sessions.create(UserId::new(1), Duration::hours(1));
        let authorization = format!("SSO_SESSION_ID {key}");

        let first = gateway
            .signed_get("/api/v1/session-user/")
            .header("Authorization", &authorization)
            .send()
            .await
            .expect("request");
        assert_eq!(first.status(), 200);

        assert!(gateway.sessions.invalidate(&key));

        let second = gateway
            .signed_get("/api/v1/session-user/")
            .header("Authorization", &authorization)
            .send()
            .await
            .expect("request");
        assert_eq!(second.status(), 401);
        assert!(logged_in_cookie(&second).starts_with("sso_display_logged_in=false"));
        let body: serde_json::Value = second.json().await.expect("json body");
        assert_eq!(body["detail"], "Invalid session id");
    }

    #[tokio::test]
    async fn test_should_reject_malformed_session_header() {
        let gateway = spawn_gateway().await;
        let resp = gateway
            .signed_get("/api/v1/session-user/")
            .header("Authorization", "SSO_SESSION_ID one two")
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 401);
        assert_eq!(
            resp.headers().get("www-authenticate").and_then(|v| v.to_str().ok()),
            Some("SSO_SESSION_ID")
        );
        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["detail"], "Invalid SSO_SESSION_ID header.");
    }

    #[tokio::test]
    async fn test_should_reject_expired_session() {
        let gateway = spawn_gateway().await;
        gateway.users.insert(test_user(1, 0));
        let key = gateway.sessions.create(UserId::new(1), Duration::seconds(-5));
        let resp = gateway
            .signed_get("/api/v1/session-user/")
            .header("Authorization", format!("SSO_SESSION_ID {key}"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 401);
    }
}
