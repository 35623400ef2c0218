//! Redirect validation integration tests.

#[cfg(test)]
mod tests {
    use ssoguard_auth::redirect::url_with_redirect;

    use crate::spawn_gateway;

    async fn check(next: &str) -> bool {
        let gateway = spawn_gateway().await;
        let path = url_with_redirect("/api/v1/validate-redirect/", next, "next");
        let resp = gateway.signed_get(&path).send().await.expect("request");
        assert_eq!(resp.status(), 200, "{next}");
        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["next"], next);
        body["valid"].as_bool().expect("boolean verdict")
    }

    #[tokio::test]
    async fn test_should_accept_allowed_apex_domain() {
        assert!(check("https://great.gov.uk/profile/").await);
    }

    #[tokio::test]
    async fn test_should_accept_internal_path() {
        assert!(check("/profile/about/").await);
    }

    #[tokio::test]
    async fn test_should_accept_bare_custom_suffix() {
        assert!(check("http://great").await);
    }

    #[tokio::test]
    async fn test_should_reject_scheme_relative_url() {
        assert!(!check("//evil.com").await);
    }

    #[tokio::test]
    async fn test_should_reject_unlisted_domain() {
        assert!(!check("https://evil.com/great.gov.uk").await);
    }
}
