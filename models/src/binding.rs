use serde::{Deserialize, Serialize};

/// Server project a configuration scope is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundProject {
    pub connection_id: String,
    pub project_key: String,
}

/// Snapshot of the host's currently open configuration scope.
///
/// A scope without a [`BoundProject`] runs in standalone mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConfiguration {
    pub scope_id: String,
    pub scope_name: String,
    pub project: Option<BoundProject>,
}

impl BindingConfiguration {
    pub fn standalone(scope_id: impl Into<String>, scope_name: impl Into<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            scope_name: scope_name.into(),
            project: None,
        }
    }

    pub fn bound(
        scope_id: impl Into<String>,
        scope_name: impl Into<String>,
        project: BoundProject,
    ) -> Self {
        Self {
            scope_id: scope_id.into(),
            scope_name: scope_name.into(),
            project: Some(project),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.project.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScopeBindingDto {
    pub connection_id: Option<String>,
    pub sonar_project_key: Option<String>,
    pub binding_suggestion_disabled: bool,
}

/// Wire form of a configuration scope declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationScopeDto {
    pub id: String,
    pub parent_id: Option<String>,
    pub bindable: bool,
    pub name: String,
    pub binding: ScopeBindingDto,
}

impl From<&BindingConfiguration> for ConfigurationScopeDto {
    fn from(configuration: &BindingConfiguration) -> Self {
        let (connection_id, sonar_project_key) = match &configuration.project {
            Some(project) => (
                Some(project.connection_id.clone()),
                Some(project.project_key.clone()),
            ),
            None => (None, None),
        };

        Self {
            id: configuration.scope_id.clone(),
            parent_id: None,
            bindable: true,
            name: configuration.scope_name.clone(),
            binding: ScopeBindingDto {
                connection_id,
                sonar_project_key,
                binding_suggestion_disabled: true,
            },
        }
    }
}
