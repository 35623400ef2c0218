//! Signature rejection integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ssoguard_auth::{DisabledNonceStore, generate_signature};
    use ssoguard_core::RejectionVariant;

    use crate::{SIGNATURE_SECRET, spawn_gateway, spawn_gateway_with};

    #[tokio::test]
    async fn test_should_serve_health_check_unsigned() {
        let gateway = spawn_gateway().await;
        let resp = gateway
            .client
            .get(gateway.url("/healthcheck/"))
            .send()
            .await
            .expect("health check");
        assert_eq!(resp.status(), 200);
        assert!(resp.headers().contains_key("x-request-id"));
        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_should_reject_unsigned_request() {
        let gateway = spawn_gateway().await;
        let resp = gateway
            .client
            .get(gateway.url("/api/v1/session-user/"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 401);
        assert_eq!(resp.text().await.expect("body"), "Unauthorized");
    }

    #[tokio::test]
    async fn test_should_reject_signature_over_different_body() {
        let gateway = spawn_gateway_with(
            |c| c.rejection_variant = RejectionVariant::Pfo,
            Arc::new(DisabledNonceStore),
        )
        .await;
        let path = "/api/v1/session-user/";
        let resp = gateway
            .client
            .get(gateway.url(path))
            .header("X-Signature", generate_signature(SIGNATURE_SECRET, path, b"other"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 400);
        assert_eq!(resp.text().await.expect("body"), "PFO");
    }

    #[tokio::test]
    async fn test_should_reject_signature_with_wrong_secret() {
        let gateway = spawn_gateway().await;
        let path = "/api/v1/validate-redirect/?next=/";
        let resp = gateway
            .client
            .get(gateway.url(path))
            .header("X-Signature", generate_signature("not-the-secret", path, b""))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 401);
    }

    #[tokio::test]
    async fn test_should_pass_signed_request_to_router() {
        let gateway = spawn_gateway().await;
        let resp = gateway
            .signed_get("/api/v1/unknown/")
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["detail"], "Not found.");
    }
}
