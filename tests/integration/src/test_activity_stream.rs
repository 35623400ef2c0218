//! Hawk-authenticated activity stream integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ssoguard_auth::{DisabledNonceStore, MemoryNonceStore};

    use crate::{ALLOWED_IP, HAWK_KEY, spawn_gateway, spawn_gateway_with, test_user};

    #[tokio::test]
    async fn test_should_sign_activity_stream_response() {
        let gateway = spawn_gateway().await;
        let (sender, request) = gateway.hawk_get("/activity-stream/");
        let resp = request.send().await.expect("request");
        assert_eq!(resp.status(), 200);
        let server_authorization = resp
            .headers()
            .get("server-authorization")
            .and_then(|v| v.to_str().ok())
            .expect("signed response")
            .to_owned();
        let body = resp.bytes().await.expect("body");
        sender
            .accept_response(&server_authorization, &body, "application/json")
            .expect("response signature verifies");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(payload["secret"], "content-for-pen-test");
    }

    #[tokio::test]
    async fn test_should_page_users_by_cursor() {
        let gateway = spawn_gateway().await;
        for id in 1..=5 {
            gateway.users.insert(test_user(id, id));
        }

        let mut path = "/activity-stream/users/".to_owned();
        let mut sizes = Vec::new();
        let mut seen = Vec::new();
        loop {
            let (_, request) = gateway.hawk_get(&path);
            let resp = request.send().await.expect("request");
            assert_eq!(resp.status(), 200);
            let page: serde_json::Value = resp.json().await.expect("json body");
            assert_eq!(page["type"], "Collection");
            let items = page["orderedItems"].as_array().expect("items");
            sizes.push(items.len());
            seen.extend(items.iter().map(|item| item["object"]["id"].clone()));
            if sizes.len() == 1 {
                assert!(page["previous"].is_null());
            }
            match page["next"].as_str() {
                Some(next) => {
                    path = next
                        .strip_prefix(&gateway.base_url)
                        .expect("absolute next link")
                        .to_owned();
                }
                None => break,
            }
        }

        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(seen[0], "dit:DirectorySSO:User:1");
        assert_eq!(seen[4], "dit:DirectorySSO:User:5");
    }

    #[tokio::test]
    async fn test_should_not_skip_users_modified_mid_crawl() {
        let gateway = spawn_gateway().await;
        for id in 1..=4 {
            gateway.users.insert(test_user(id, id));
        }

        let mut path = "/activity-stream/users/".to_owned();
        let mut seen = Vec::new();
        loop {
            let (_, request) = gateway.hawk_get(&path);
            let page: serde_json::Value = request
                .send()
                .await
                .expect("request")
                .json()
                .await
                .expect("json body");
            let items = page["orderedItems"].as_array().expect("items");
            seen.extend(
                items
                    .iter()
                    .filter_map(|item| item["object"]["id"].as_str().map(str::to_owned)),
            );
            if seen.len() == 2 {
                gateway.users.insert(test_user(1, 60));
            }
            match page["next"].as_str() {
                Some(next) => {
                    path = next
                        .strip_prefix(&gateway.base_url)
                        .expect("absolute next link")
                        .to_owned();
                }
                None => break,
            }
        }

        assert_eq!(
            seen,
            vec![
                "dit:DirectorySSO:User:1",
                "dit:DirectorySSO:User:2",
                "dit:DirectorySSO:User:3",
                "dit:DirectorySSO:User:4",
                "dit:DirectorySSO:User:1",
            ]
        );
    }

    #[tokio::test]
    async fn test_should_reject_wrong_key_generically() {
        let gateway = spawn_gateway().await;
        let (_, request) = gateway.hawk_request("/activity-stream/", "wrong-key", ALLOWED_IP);
        let resp = request.send().await.expect("request");
        assert_eq!(resp.status(), 401);
        assert_eq!(
            resp.headers().get("www-authenticate").and_then(|v| v.to_str().ok()),
            Some("Hawk")
        );
        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["detail"], "Incorrect authentication credentials.");
    }

    #[tokio::test]
    async fn test_should_reject_missing_credentials() {
        let gateway = spawn_gateway().await;
        let resp = gateway
            .client
            .get(gateway.url("/activity-stream/"))
            .header("X-Forwarded-For", ALLOWED_IP)
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 401);
        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["detail"], "Authentication credentials were not provided.");
    }

    #[tokio::test]
    async fn test_should_reject_replayed_request() {
        let gateway = spawn_gateway().await;
        let (_, request) = gateway.hawk_get("/activity-stream/");
        let replay = request.try_clone().expect("cloneable request");

        assert_eq!(request.send().await.expect("request").status(), 200);
        let resp = replay.send().await.expect("request");
        assert_eq!(resp.status(), 401);
        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["detail"], "Incorrect authentication credentials.");
    }

    #[tokio::test]
    async fn test_should_accept_replay_when_nonce_cache_disabled() {
        let gateway = spawn_gateway_with(|_| {}, Arc::new(DisabledNonceStore)).await;
        let (_, request) = gateway.hawk_get("/activity-stream/");
        let replay = request.try_clone().expect("cloneable request");

        assert_eq!(request.send().await.expect("request").status(), 200);
        assert_eq!(replay.send().await.expect("request").status(), 200);
    }

    #[tokio::test]
    async fn test_should_keep_nonce_of_request_from_public_network() {
        let nonces = Arc::new(MemoryNonceStore::new(Duration::from_secs(60)));
        let gateway = spawn_gateway_with(|_| {}, nonces.clone()).await;
        let (_, request) = gateway.hawk_request("/activity-stream/", HAWK_KEY, "8.8.8.8");
        assert_eq!(request.send().await.expect("request").status(), 401);
        assert!(nonces.is_empty());
    }

    #[tokio::test]
    async fn test_should_deny_public_network() {
        let gateway = spawn_gateway().await;
        let (_, request) = gateway.hawk_request("/activity-stream/", HAWK_KEY, "8.8.8.8");
        let resp = request
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 401);
        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["detail"], "Public network access denied");
    }
}
