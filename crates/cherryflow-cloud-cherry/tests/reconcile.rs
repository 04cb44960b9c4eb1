//! Integration tests for the Cherry Servers provider using wiremock
//!
//! Every test runs the real HTTP transport against a mock API and checks
//! both the reported outcome and the requests that reached the server.

use cherryflow_cloud::{
    CloudError, CloudProvider, DesiredSpec, DesiredState, ReconcileRequest, WaitPolicy,
};
use cherryflow_cloud_cherry::{CherryError, CherryProvider, ClientConfig};
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{bearer_token, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::new("test-token").with_base_url(server.uri())
}

fn provider(server: &MockServer) -> CherryProvider {
    init_tracing();
    CherryProvider::new(&config(server)).expect("provider should build")
}

fn desired(value: Value) -> DesiredSpec {
    DesiredSpec::from_value(value).expect("desired spec should be an object")
}

/// Mutating requests as "METHOD /path", in arrival order
async fn mutations(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.method.as_str() != "GET")
        .map(|request| format!("{} {}", request.method.as_str(), request.url.path()))
        .collect()
}

fn ssh_key_body() -> Value {
    json!({
        "id": 7955,
        "label": "deploy",
        "key": "ssh-ed25519 AAAAC3Nz deploy@example.com",
        "fingerprint": "54:8e:84:11:bb:29"
    })
}

fn server_body(image: &str, status: &str) -> Value {
    json!({
        "id": 383531,
        "hostname": "web-1",
        "status": status,
        "deployed_image": {"slug": image},
        "ssh_keys": [{"id": 7955}],
        "project": {"id": 42},
        "region": {"slug": "LT-Siauliai"},
        "plan": {"slug": "B1-1-1gb-20s-shared"},
        "tags": {"env": "prod"}
    })
}

mod ssh_key_tests {
    use super::*;

    /// Create once, then find the same key by label on the next run
    #[tokio::test]
    async fn test_create_then_resolve_by_label() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ssh-keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ssh-keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([ssh_key_body()])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ssh-keys"))
            .and(bearer_token("test-token"))
            .and(body_partial_json(json!({"label": "deploy"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(ssh_key_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ssh-keys/7955"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ssh_key_body()))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let request = ReconcileRequest::new(
            desired(json!({"label": "deploy", "key": "ssh-ed25519 AAAAC3Nz deploy@example.com"})),
            DesiredState::Present,
        );

        let created = provider.reconcile("ssh-key", &request).await.unwrap();
        assert!(created.changed);
        assert_eq!(created.resource.unwrap().id.as_str(), "7955");

        let again = provider.reconcile("ssh-key", &request).await.unwrap();
        assert!(!again.changed);
        assert!(again.plan.is_empty());
        assert_eq!(again.resource.unwrap().id.as_str(), "7955");
    }

    /// Check mode reports the create without sending it
    #[tokio::test]
    async fn test_check_mode_never_mutates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ssh-keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let request = ReconcileRequest::new(
            desired(json!({"label": "ci", "key": "ssh-ed25519 AAAAci"})),
            DesiredState::Present,
        )
        .check_mode(true);

        let outcome = provider(&server).reconcile("ssh-key", &request).await.unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.plan.len(), 1);
        assert!(outcome.resource.is_none());
        assert!(mutations(&server).await.is_empty());
    }
}

mod server_tests {
    use super::*;

    async fn mount_listing(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/projects/42/servers"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([server_body("ubuntu_22_04_64bit", "deployed")])),
            )
            .mount(server)
            .await;
    }

    fn reinstall_request() -> ReconcileRequest {
        ReconcileRequest::new(
            desired(json!({
                "project_id": 42,
                "hostname": "web-1",
                "image": "debian_12_64bit"
            })),
            DesiredState::Active,
        )
        .wait_policy(
            WaitPolicy::default()
                .with_poll_interval(Duration::from_millis(10))
                .with_timeout(Duration::from_secs(5)),
        )
    }

    /// An image change needs an explicit opt-in before anything is sent
    #[tokio::test]
    async fn test_reinstall_requires_opt_in() {
        let server = MockServer::start().await;
        mount_listing(&server).await;

        let err = provider(&server)
            .reconcile("server", &reinstall_request())
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::Validation(msg) if msg.contains("reprovisioning")));
        assert!(mutations(&server).await.is_empty());
    }

    /// With the opt-in the server is reinstalled and waited for
    #[tokio::test]
    async fn test_reinstall_with_opt_in() {
        let server = MockServer::start().await;
        mount_listing(&server).await;

        Mock::given(method("POST"))
            .and(path("/servers/383531/actions"))
            .and(body_partial_json(json!({
                "type": "reinstall",
                "image": "debian_12_64bit",
                "ssh_keys": [7955]
            })))
            .respond_with(
                ResponseTemplate::new(202)
                    .set_body_json(server_body("debian_12_64bit", "reinstalling")),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/servers/383531"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(server_body("debian_12_64bit", "deployed")),
            )
            .mount(&server)
            .await;

        let request = reinstall_request().allow_disruptive(true);
        let outcome = provider(&server).reconcile("server", &request).await.unwrap();

        assert!(outcome.changed);
        let resource = outcome.resource.unwrap();
        assert_eq!(resource.str("image"), Some("debian_12_64bit"));
        assert_eq!(resource.status(), Some("deployed"));
        assert_eq!(
            mutations(&server).await,
            vec!["POST /servers/383531/actions".to_string()]
        );
    }

    /// Clearing tags converges: the API reads cleared tags back as `{}`
    #[tokio::test]
    async fn test_cleared_tags_converge() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/servers/383531"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(server_body("ubuntu_22_04_64bit", "deployed")),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        let mut cleared = server_body("ubuntu_22_04_64bit", "deployed");
        cleared["tags"] = json!({});
        Mock::given(method("GET"))
            .and(path("/servers/383531"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cleared.clone()))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/servers/383531"))
            .respond_with(ResponseTemplate::new(201).set_body_json(cleared))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server);
        let request = ReconcileRequest::new(
            desired(json!({"id": 383531, "tags": null})),
            DesiredState::Present,
        );

        let first = provider.reconcile("server", &request).await.unwrap();
        assert!(first.changed);
        assert_eq!(first.resource.unwrap().fields["tags"], json!({}));

        let second = provider.reconcile("server", &request).await.unwrap();
        assert!(!second.changed);
        assert!(second.plan.is_empty());
        assert_eq!(mutations(&server).await, vec!["PUT /servers/383531".to_string()]);
    }

    /// A server that answers 403 right after deletion counts as gone
    #[tokio::test]
    async fn test_restricted_server_is_absent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/servers/99"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({"code": 403, "message": "Forbidden"})),
            )
            .mount(&server)
            .await;

        let request = ReconcileRequest::new(desired(json!({"id": 99})), DesiredState::Absent);
        let outcome = provider(&server).reconcile("server", &request).await.unwrap();

        assert!(!outcome.changed);
        assert!(outcome.resource.is_none());
        assert!(mutations(&server).await.is_empty());
    }

    /// A rejected create is reported with the API message and no progress
    #[tokio::test]
    async fn test_create_failure_reports_api_message() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/projects/42/servers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/projects/42/servers"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"code": 400, "message": "Plan is out of stock"})),
            )
            .mount(&server)
            .await;

        let request = ReconcileRequest::new(
            desired(json!({
                "project_id": 42,
                "hostname": "web-2",
                "region": "LT-Siauliai",
                "plan": "B1-1-1gb-20s-shared"
            })),
            DesiredState::Present,
        );
        let err = provider(&server).reconcile("server", &request).await.unwrap_err();

        match err {
            CloudError::ApplyFailed {
                completed, source, ..
            } => {
                assert_eq!(completed, 0);
                assert_eq!(source.status(), Some(400));
                assert!(source.to_string().contains("out of stock"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

mod floating_ip_tests {
    use super::*;

    /// A trailing dot on the PTR record is not a difference
    #[tokio::test]
    async fn test_ptr_trailing_dot_is_not_an_update() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ips/a1b2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "a1b2",
                "address": "5.199.171.10",
                "type": "floating-ip",
                "ptr_record": "host.example.com.",
                "region": {"slug": "LT-Siauliai"}
            })))
            .mount(&server)
            .await;

        let request = ReconcileRequest::new(
            desired(json!({"id": "a1b2", "ptr_record": "host.example.com"})),
            DesiredState::Present,
        );
        let outcome = provider(&server)
            .reconcile("floating-ip", &request)
            .await
            .unwrap();

        assert!(!outcome.changed);
        assert!(mutations(&server).await.is_empty());
    }
}

mod storage_tests {
    use super::*;

    /// An attached volume is detached before it is deleted
    #[tokio::test]
    async fn test_absent_detaches_then_deletes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/storages/593063"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 593063,
                "size": 20,
                "attached_to": {"id": 383531},
                "region": {"slug": "LT-Siauliai"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/storages/593063/attachments"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/storages/593063"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let request = ReconcileRequest::new(desired(json!({"id": 593063})), DesiredState::Absent);
        let outcome = provider(&server).reconcile("storage", &request).await.unwrap();

        assert!(outcome.changed);
        assert!(outcome.resource.is_none());
        assert_eq!(
            mutations(&server).await,
            vec![
                "DELETE /storages/593063/attachments".to_string(),
                "DELETE /storages/593063".to_string(),
            ]
        );
    }

    /// Missing required fields are reported before the target server is looked up
    #[tokio::test]
    async fn test_missing_size_fails_before_server_lookup() {
        let server = MockServer::start().await;

        let request = ReconcileRequest::new(
            desired(json!({
                "project_id": 42,
                "region": "LT-Siauliai",
                "target_server_id": 383531
            })),
            DesiredState::Present,
        );
        let err = provider(&server)
            .reconcile("storage", &request)
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::Validation(msg) if msg.contains("size")));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    /// Deleting a volume needs its ID
    #[tokio::test]
    async fn test_absent_without_id_is_rejected() {
        let server = MockServer::start().await;

        let request =
            ReconcileRequest::new(desired(json!({"project_id": 42})), DesiredState::Absent);
        let err = provider(&server)
            .reconcile("storage", &request)
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::Validation(_)));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_with_valid_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .and(bearer_token("test-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"email": "ops@example.com"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        assert!(CherryProvider::connect(&config(&server)).await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_fails_fast_on_bad_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid token"})),
            )
            .mount(&server)
            .await;

        let err = CherryProvider::connect(&config(&server)).await.err().unwrap();
        assert!(matches!(
            err,
            CherryError::CloudError(CloudError::AuthenticationFailed(msg))
                if msg.contains("Invalid token")
        ));
    }
}
