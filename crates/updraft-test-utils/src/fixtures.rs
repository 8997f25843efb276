//! PEM fixtures generated with OpenSSL.
//!
//! | Constant | Contents |
//! |---|---|
//! | `SIGNING_CERT` / `SIGNING_KEY` | self-signed code-signing certificate and its PKCS#8 key |
//! | `PROJECT_CERT` | code-signing certificate bound to `PROJECT_ID` / `PROJECT_SCOPE_KEY`, same key |
//! | `NO_CODE_SIGNING_CERT` | lacks the code-signing extended key usage |
//! | `NO_DIGITAL_SIGNATURE_CERT` | lacks the digital-signature key usage |
//! | `ROOT_CERT` | CA root for chain validation |
//! | `LEAF_CERT` / `LEAF_KEY` | code-signing leaf issued by `ROOT_CERT` |
//! | `EXPIRED_CERT` | code-signing certificate valid only during 2020, `SIGNING_KEY` |
//! | `NOT_YET_VALID_CERT` | code-signing certificate valid from 2099, `SIGNING_KEY` |

pub const SIGNING_CERT: &str = include_str!("../fixtures/signing-cert.pem");
pub const SIGNING_KEY: &str = include_str!("../fixtures/signing-key.pem");
pub const PROJECT_CERT: &str = include_str!("../fixtures/project-cert.pem");
pub const NO_CODE_SIGNING_CERT: &str = include_str!("../fixtures/no-code-signing-cert.pem");
pub const NO_DIGITAL_SIGNATURE_CERT: &str =
    include_str!("../fixtures/no-digital-signature-cert.pem");
pub const ROOT_CERT: &str = include_str!("../fixtures/root-cert.pem");
pub const LEAF_CERT: &str = include_str!("../fixtures/leaf-cert.pem");
pub const LEAF_KEY: &str = include_str!("../fixtures/leaf-key.pem");
pub const EXPIRED_CERT: &str = include_str!("../fixtures/expired-cert.pem");
pub const NOT_YET_VALID_CERT: &str = include_str!("../fixtures/not-yet-valid-cert.pem");

pub const PROJECT_ID: &str = "285dc9ca-a25d-4f60-93be-36dc312266d7";
pub const PROJECT_SCOPE_KEY: &str = "@test/app";
