use crate::{BindingConfiguration, BoundProject, ConfigurationScopeDto};

#[test]
fn given_standalone_configuration_when_converted_then_binding_is_empty() {
    // GIVEN: A scope with no bound project
    let configuration = BindingConfiguration::standalone("scope-1", "My Solution");

    // WHEN: Converting to the wire form
    let dto = ConfigurationScopeDto::from(&configuration);

    // THEN: Scope identity is kept and binding fields are unset
    assert_eq!(dto.id, "scope-1");
    assert_eq!(dto.name, "My Solution");
    assert!(dto.bindable);
    assert!(dto.binding.connection_id.is_none());
    assert!(dto.binding.sonar_project_key.is_none());
}

#[test]
fn given_bound_configuration_when_converted_then_carries_connection_and_project() {
    let configuration = BindingConfiguration::bound(
        "scope-1",
        "My Solution",
        BoundProject {
            connection_id: "sq-1".to_string(),
            project_key: "org:app".to_string(),
        },
    );

    let dto = ConfigurationScopeDto::from(&configuration);

    assert!(configuration.is_bound());
    assert_eq!(dto.binding.connection_id.as_deref(), Some("sq-1"));
    assert_eq!(dto.binding.sonar_project_key.as_deref(), Some("org:app"));
}
