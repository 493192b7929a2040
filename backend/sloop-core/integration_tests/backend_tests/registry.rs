use crate::backend_tests::helpers::{REQUEST_TIMEOUT, WAIT, connection_pair};

use sloop_core::services::{ConfigurationService, ConnectionService, LifecycleService, ServiceRegistry};

use models::{BindingConfiguration, BoundProject, ConfigurationScopeDto, SonarQubeConnectionConfig};

use std::sync::Arc;

use serde_json::json;
use tokio::time::timeout;

#[tokio::test]
async fn given_no_connection_when_service_requested_then_none() {
    let registry = ServiceRegistry::new();

    assert!(registry.try_get_service::<LifecycleService>().is_none());
    assert!(registry.current_connection_id().is_none());
}

/// **VALUE**: Verifies proxies are cached per connection.
#[tokio::test]
async fn given_current_connection_when_service_requested_twice_then_same_proxy_returned() {
    // GIVEN: A registry pointing at a live connection
    let (connection, _backend) = connection_pair(REQUEST_TIMEOUT);
    let registry = ServiceRegistry::new();
    registry.reset(Some(Arc::new(connection)));

    // WHEN: Asking for the same service twice
    let first = registry.try_get_service::<ConfigurationService>().unwrap();
    let second = registry.try_get_service::<ConfigurationService>().unwrap();

    // THEN: One cached proxy
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.cached_service_count(), 1);
}

/// **VALUE**: Verifies a reset never hands out a proxy bound to the previous connection.
///
/// **WHY THIS MATTERS**: Talking to a stale connection after a restart sends traffic to a
/// backend that is shutting down, or to nothing at all.
///
/// **BUG THIS CATCHES**: Would catch a cache keyed only by type surviving the connection swap
/// while the old connection still reports alive.
#[tokio::test]
async fn given_reset_to_new_connection_when_old_still_alive_then_old_proxy_never_returned() {
    // GIVEN: A proxy obtained on connection A
    let (connection_a, _backend_a) = connection_pair(REQUEST_TIMEOUT);
    let (connection_b, mut backend_b) = connection_pair(REQUEST_TIMEOUT);
    let connection_a = Arc::new(connection_a);
    let connection_b = Arc::new(connection_b);
    let registry = ServiceRegistry::new();
    registry.reset(Some(Arc::clone(&connection_a)));
    let on_a = registry.try_get_service::<ConnectionService>().unwrap();

    // WHEN: Resetting to B while A is still alive
    registry.reset(Some(Arc::clone(&connection_b)));
    let on_b = registry.try_get_service::<ConnectionService>().unwrap();

    // THEN: The proxy is new, bound to B, and its traffic goes to B
    assert!(connection_a.is_alive());
    assert!(!Arc::ptr_eq(&on_a, &on_b));
    assert_eq!(registry.current_connection_id(), Some(connection_b.id()));
    assert_eq!(registry.cached_service_count(), 1);

    let connections = [SonarQubeConnectionConfig {
        connection_id: "on-prem".to_string(),
        server_url: "https://sonar.example.com".to_string(),
        disable_notification: false,
    }];
    on_b.did_update_connections(&connections, &[]).unwrap();
    let params = backend_b
        .expect_notification("connection/didUpdateConnections")
        .await;
    assert_eq!(params["sonarQubeConnections"][0]["connectionId"], "on-prem");
    assert_eq!(params["sonarCloudConnections"], json!([]));
}

#[tokio::test]
async fn given_dead_connection_when_service_requested_then_none() {
    // GIVEN: A current connection whose backend exited
    let (connection, backend) = connection_pair(REQUEST_TIMEOUT);
    let connection = Arc::new(connection);
    let registry = ServiceRegistry::new();
    registry.reset(Some(Arc::clone(&connection)));
    backend.crash();
    timeout(WAIT, connection.closed()).await.unwrap();

    // WHEN / THEN: No proxy is handed out
    assert!(registry.try_get_service::<LifecycleService>().is_none());
}

#[tokio::test]
async fn given_reset_to_none_when_service_requested_then_none_and_cache_cleared() {
    let (connection, _backend) = connection_pair(REQUEST_TIMEOUT);
    let registry = ServiceRegistry::new();
    registry.reset(Some(Arc::new(connection)));
    registry.try_get_service::<LifecycleService>().unwrap();

    registry.reset(None);

    assert!(registry.try_get_service::<LifecycleService>().is_none());
    assert_eq!(registry.cached_service_count(), 0);
}

#[tokio::test]
async fn given_configuration_service_when_scope_added_then_camel_case_wire_format() {
    let (connection, mut backend) = connection_pair(REQUEST_TIMEOUT);
    let registry = ServiceRegistry::new();
    registry.reset(Some(Arc::new(connection)));
    let configuration = registry.try_get_service::<ConfigurationService>().unwrap();
    let binding = BindingConfiguration::bound(
        "ws",
        "Workspace",
        BoundProject {
            connection_id: "on-prem".to_string(),
            project_key: "acme:app".to_string(),
        },
    );

    configuration
        .did_add_configuration_scopes(&[ConfigurationScopeDto::from(&binding)])
        .unwrap();

    let params = backend
        .expect_notification("configuration/didAddConfigurationScopes")
        .await;
    let scope = &params["addedScopes"][0];
    assert_eq!(scope["id"], "ws");
    assert_eq!(scope["binding"]["connectionId"], "on-prem");
    assert_eq!(scope["binding"]["sonarProjectKey"], "acme:app");
}
