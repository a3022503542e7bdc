//! Startup configuration failures abort composition before anything listens.

use crate::config::ConfigurationError;
use crate::credentials::DependencyKind;
use crate::e2e_tests::helpers::*;
use crate::environment::{MapEnv, RuntimeEnvironment};
use crate::testing::{TEST_AUDIENCE, TEST_ISSUER, TEST_KEY};

fn local_env() -> MapEnv {
    MapEnv::new()
        .with("GOOGLE_CLOUD_PROJECT", "charger-local")
        .with("CHARGER_JWT_ISSUER", TEST_ISSUER)
        .with("CHARGER_JWT_AUDIENCE", TEST_AUDIENCE)
        .with("CHARGER_JWT_KEY", TEST_KEY)
}

#[test]
fn test_each_jwt_field_is_required() {
    for (var, field) in [
        ("CHARGER_JWT_ISSUER", "issuer"),
        ("CHARGER_JWT_AUDIENCE", "audience"),
        ("CHARGER_JWT_KEY", "key"),
    ] {
        let result = compose(test_env().with(var, ""));
        assert_eq!(
            result.err(),
            Some(ConfigurationError::MissingJwtSettings(vec![field])),
            "{var} should be required"
        );
    }
}

#[test]
fn test_missing_project_id_aborts() {
    let env = local_env()
        .with("GOOGLE_CLOUD_PROJECT", "")
        .with("GOOGLE_SERVICE_ACCOUNT", r#"{"type":"service_account"}"#);
    assert_eq!(
        compose(env).err(),
        Some(ConfigurationError::MissingProjectId(DependencyKind::Database))
    );
}

#[test]
fn test_local_without_credentials_aborts() {
    assert_eq!(
        compose(local_env()).err(),
        Some(ConfigurationError::NoCredentials(DependencyKind::Database))
    );
}

#[test]
fn test_identity_credentials_are_resolved_separately() {
    // Database material is usable through the emulator; the identity provider has none.
    let env = local_env()
        .with("FIRESTORE_EMULATOR_HOST", UNREACHABLE_HOST)
        .with("GOOGLE_SERVICE_ACCOUNT", r#"{"type":"service_account"}"#);
    assert_eq!(
        compose(env).err(),
        Some(ConfigurationError::NoCredentials(
            DependencyKind::IdentityProvider
        ))
    );
}

#[test]
fn test_local_emulators_compose() {
    let env = local_env()
        .with("FIRESTORE_EMULATOR_HOST", UNREACHABLE_HOST)
        .with("FIREBASE_AUTH_EMULATOR_HOST", UNREACHABLE_HOST)
        .with("GOOGLE_SERVICE_ACCOUNT", r#"{"type":"service_account"}"#)
        .with("FIREBASE_SERVICE_ACCOUNT", r#"{"type":"service_account"}"#);

    let app = compose(env).expect("composes");
    assert_eq!(app.runtime, RuntimeEnvironment::Local);
    assert_eq!(
        app.services.identity.provider().project_id(),
        "charger-local"
    );
}

#[test]
fn test_managed_environment_ignores_local_material() {
    // Unusable local material would fail if it were ever read.
    let env = test_env()
        .with("GOOGLE_SERVICE_ACCOUNT", "not json")
        .with("GOOGLE_APPLICATION_CREDENTIALS", "/does/not/exist.json");

    let app = compose(env).expect("composes");
    assert_eq!(app.runtime, RuntimeEnvironment::Managed);
}

#[test]
fn test_invalid_port_aborts() {
    let result = compose(test_env().with("PORT", "not-a-port"));
    assert!(matches!(result, Err(ConfigurationError::InvalidValue { .. })));
}
