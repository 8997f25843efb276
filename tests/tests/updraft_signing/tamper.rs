use rstest::*;
use updraft::signing::{
    CodeSigningConfiguration, CodeSigningMetadata, SignatureHeaderInfo, ValidationOutcome,
};
use updraft_test_utils::{SIGNING_CERT, SIGNING_KEY, sign};

const BODY: &[u8] =
    br#"{"id":"7e1c5ab2-8b6f-4f0e-9a51-3cf2c9a0b001","createdAt":"2024-06-01T00:00:00Z"}"#;

#[fixture]
fn configuration() -> CodeSigningConfiguration {
    CodeSigningConfiguration::new(SIGNING_CERT, CodeSigningMetadata::default(), false, false)
        .unwrap()
}

#[rstest]
fn untouched_body_verifies(configuration: CodeSigningConfiguration) {
    let header = SignatureHeaderInfo::new(sign(BODY, SIGNING_KEY), None, None);
    let result = configuration.validate(Some(&header), BODY, None).unwrap();
    assert!(result.is_valid());
}

#[rstest]
#[case::first(0)]
#[case::inside_id(10)]
#[case::middle(BODY.len() / 2)]
#[case::last(BODY.len() - 1)]
fn flipping_any_byte_invalidates(configuration: CodeSigningConfiguration, #[case] position: usize) {
    let header = SignatureHeaderInfo::new(sign(BODY, SIGNING_KEY), None, None);
    let mut tampered = BODY.to_vec();
    tampered[position] ^= 0x01;

    let result = configuration.validate(Some(&header), &tampered, None).unwrap();

    assert_eq!(result.outcome, ValidationOutcome::Invalid);
    assert!(result.project_information.is_none());
}

#[rstest]
fn signature_from_other_key_id_is_invalid(configuration: CodeSigningConfiguration) {
    let header = SignatureHeaderInfo::new(sign(BODY, SIGNING_KEY), Some("other".into()), None);
    let result = configuration.validate(Some(&header), BODY, None).unwrap();
    assert_eq!(result.outcome, ValidationOutcome::Invalid);
}
