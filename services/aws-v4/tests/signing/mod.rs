mod chunked_upload;
mod event_stream;
mod presigned;
mod standard;

use awssign_aws_v4::{Credential, RequestSigner};
use awssign_core::time::{parse_iso8601, DateTime};
use awssign_core::{Context, SignRequest};
use http::request::Parts;
use http::{Method, Request};
use std::time::Duration;

pub const ACCESS_KEY_ID: &str = "AKIDEXAMPLE";
pub const SECRET_ACCESS_KEY: &str = "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY";

pub fn init_signing_test() -> Context {
    let _ = env_logger::builder().is_test(true).try_init();
    Context::new()
}

pub fn test_credential() -> Credential {
    Credential::new(ACCESS_KEY_ID, SECRET_ACCESS_KEY)
}

pub fn test_time() -> DateTime {
    parse_iso8601("20150830T123600Z").expect("time must parse")
}

pub fn parts_for(method: Method, uri: &str) -> Parts {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(())
        .expect("request must build")
        .into_parts()
        .0
}

/// Sign `parts` in place with a fixed clock.
pub async fn sign(
    signer: &RequestSigner,
    parts: &mut Parts,
    cred: &Credential,
    expires_in: Option<Duration>,
) -> awssign_core::Result<()> {
    let ctx = init_signing_test();
    signer.sign_request(&ctx, parts, Some(cred), expires_in).await
}
