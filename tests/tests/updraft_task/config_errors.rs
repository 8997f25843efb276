use std::sync::Arc;

use rstest::*;
use updraft::{
    CodeSigningSettings, ConfigError, LoaderTask, UpdatesConfig, UpdatesError,
    store::LocalStore,
};
use updraft_test_utils::{
    EXPIRED_CERT, NO_CODE_SIGNING_CERT, NO_DIGITAL_SIGNATURE_CERT, NOT_YET_VALID_CERT, SIGNING_CERT,
};

fn build(config: UpdatesConfig) -> Result<LoaderTask, UpdatesError> {
    LoaderTask::new(config, Arc::new(LocalStore::in_memory()))
}

fn update_url() -> url::Url {
    "https://u.example.com/manifest".parse().unwrap()
}

#[rstest]
fn missing_update_url() {
    let result = build(UpdatesConfig::default());
    assert!(matches!(
        result,
        Err(UpdatesError::Config(ConfigError::MissingUpdateUrl))
    ));
}

#[rstest]
fn disabled_wins_over_missing_url() {
    let result = build(UpdatesConfig::default().with_enabled(false));
    assert!(matches!(
        result,
        Err(UpdatesError::Config(ConfigError::Disabled))
    ));
}

#[rstest]
fn url_without_host_has_no_scope_key() {
    let config = UpdatesConfig::new("file:///var/updates/manifest".parse().unwrap());
    assert!(matches!(
        build(config),
        Err(UpdatesError::Config(ConfigError::ScopeKey(_)))
    ));
}

#[rstest]
fn explicit_scope_key_is_used_as_is() {
    let task = build(UpdatesConfig::new(update_url()).with_scope_key("@acme/app")).unwrap();
    assert_eq!(task.scope_key(), "@acme/app");
}

#[rstest]
fn scope_key_defaults_to_url_origin() {
    let task = build(UpdatesConfig::new(update_url())).unwrap();
    assert_eq!(task.scope_key(), "https://u.example.com");
}

#[rstest]
#[case::no_code_signing_usage(NO_CODE_SIGNING_CERT)]
#[case::no_digital_signature_usage(NO_DIGITAL_SIGNATURE_CERT)]
#[case::expired(EXPIRED_CERT)]
#[case::not_yet_valid(NOT_YET_VALID_CERT)]
#[case::not_a_certificate("not a pem")]
fn unusable_certificate_is_rejected(#[case] pem: &str) {
    let config = UpdatesConfig::new(update_url()).with_code_signing(CodeSigningSettings::new(pem));
    assert!(matches!(
        build(config),
        Err(UpdatesError::Config(ConfigError::InvalidCodeSigning(_)))
    ));
}

#[rstest]
fn signing_certificate_is_accepted() {
    let config =
        UpdatesConfig::new(update_url()).with_code_signing(CodeSigningSettings::new(SIGNING_CERT));
    assert!(build(config).is_ok());
}
