//! Credential providers.
//!
//! Full credential-resolution chains (profiles, IMDS, SSO and friends) are
//! deliberately out of scope; the signer expects an already-resolved
//! credential handed in through one of these narrow providers.

mod r#static;
pub use r#static::StaticCredentialProvider;

mod env;
pub use env::EnvCredentialProvider;
