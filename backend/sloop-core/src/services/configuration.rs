use super::{RpcService, ServiceProxy};
use crate::error::transport::TransportError;

use models::{ConfigurationScopeDto, ScopeBindingDto};

use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddScopesParams<'a> {
    added_scopes: &'a [ConfigurationScopeDto],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveScopeParams<'a> {
    removed_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBindingParams<'a> {
    config_scope_id: &'a str,
    updated_binding: &'a ScopeBindingDto,
}

/// Configuration scope announcements (`configuration/*`).
pub struct ConfigurationService {
    proxy: ServiceProxy,
}

impl RpcService for ConfigurationService {
    const NAME: &'static str = "configuration";

    fn bind(proxy: ServiceProxy) -> Self {
        Self { proxy }
    }
}

impl ConfigurationService {
    pub fn did_add_configuration_scopes(
        &self,
        added_scopes: &[ConfigurationScopeDto],
    ) -> Result<(), TransportError> {
        self.proxy
            .notify("didAddConfigurationScopes", &AddScopesParams { added_scopes })
    }

    pub fn did_remove_configuration_scope(&self, removed_id: &str) -> Result<(), TransportError> {
        self.proxy
            .notify("didRemoveConfigurationScope", &RemoveScopeParams { removed_id })
    }

    pub fn did_update_binding(
        &self,
        config_scope_id: &str,
        updated_binding: &ScopeBindingDto,
    ) -> Result<(), TransportError> {
        self.proxy.notify(
            "didUpdateBinding",
            &UpdateBindingParams {
                config_scope_id,
                updated_binding,
            },
        )
    }
}
