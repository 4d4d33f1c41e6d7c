use super::{parts_for, sign, test_credential, test_time};
use anyhow::Result;
use awssign_aws_v4::RequestSigner;
use awssign_core::SignRequest;
use http::header::HeaderName;
use http::{header, Method};
use pretty_assertions::assert_eq;
use test_case::test_case;

fn signer() -> RequestSigner {
    RequestSigner::new("service", "us-east-1").with_time(test_time())
}

fn authorization(parts: &http::request::Parts) -> String {
    parts.headers[header::AUTHORIZATION]
        .to_str()
        .expect("authorization must be a string")
        .to_string()
}

// From the AWS signature v4 test suite: get-vanilla.
#[tokio::test]
async fn test_get_vanilla() -> Result<()> {
    let mut parts = parts_for(Method::GET, "http://example.amazonaws.com/");
    sign(&signer(), &mut parts, &test_credential(), None).await?;

    assert_eq!(
        authorization(&parts),
        "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
         SignedHeaders=host;x-amz-date, \
         Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
    );
    assert_eq!(parts.headers["x-amz-date"].to_str()?, "20150830T123600Z");
    Ok(())
}

#[tokio::test]
async fn test_signature_independent_of_header_insertion_order() -> Result<()> {
    let mut forward = parts_for(Method::GET, "http://example.amazonaws.com/");
    forward.headers.insert("x-custom-a", "1".parse()?);
    forward.headers.insert("x-custom-b", "2".parse()?);
    sign(&signer(), &mut forward, &test_credential(), None).await?;

    let mut reversed = parts_for(Method::GET, "http://example.amazonaws.com/");
    reversed.headers.insert("x-custom-b", "2".parse()?);
    reversed.headers.insert("x-custom-a", "1".parse()?);
    sign(&signer(), &mut reversed, &test_credential(), None).await?;

    assert_eq!(authorization(&forward), authorization(&reversed));
    Ok(())
}

#[test_case("connection", "keep-alive"; "connection")]
#[test_case("expect", "100-continue"; "expect")]
#[test_case("user-agent", "curl/8.0"; "user agent")]
#[test_case("x-amzn-trace-id", "Root=1-abc"; "trace id")]
#[tokio::test]
async fn test_ignored_header_does_not_change_signature(name: &str, value: &str) -> Result<()> {
    let mut bare = parts_for(Method::GET, "http://example.amazonaws.com/");
    sign(&signer(), &mut bare, &test_credential(), None).await?;

    let mut noisy = parts_for(Method::GET, "http://example.amazonaws.com/");
    noisy
        .headers
        .insert(HeaderName::try_from(name)?, value.parse()?);
    sign(&signer(), &mut noisy, &test_credential(), None).await?;

    assert_eq!(authorization(&bare), authorization(&noisy));
    assert!(!authorization(&noisy).contains(name));
    Ok(())
}

#[tokio::test]
async fn test_repeated_header_signed_one_line_per_value() -> Result<()> {
    let mut parts = parts_for(Method::GET, "http://example.amazonaws.com/");
    parts.headers.append("my-header", "value2".parse()?);
    parts.headers.append("my-header", "value1".parse()?);
    sign(&signer(), &mut parts, &test_credential(), None).await?;

    assert_eq!(
        authorization(&parts),
        "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
         SignedHeaders=host;my-header;x-amz-date, \
         Signature=e792c676d4396a14889ed9558c7b2f3fc5e959ce1402d3dd06cb618d31f73808"
    );
    Ok(())
}

#[tokio::test]
async fn test_header_whitespace_compacted_only_in_signature() -> Result<()> {
    let mut compact = parts_for(Method::GET, "http://example.amazonaws.com/");
    compact.headers.insert("x-custom", "a b".parse()?);
    sign(&signer(), &mut compact, &test_credential(), None).await?;

    let mut sloppy = parts_for(Method::GET, "http://example.amazonaws.com/");
    sloppy.headers.insert("x-custom", "a  \t b".parse()?);
    sign(&signer(), &mut sloppy, &test_credential(), None).await?;

    assert_eq!(authorization(&compact), authorization(&sloppy));
    // Only the canonical form is compacted; the wire bytes stay as given.
    assert_eq!(sloppy.headers["x-custom"].to_str()?, "a  \t b");
    Ok(())
}

#[tokio::test]
async fn test_query_order_does_not_change_signature() -> Result<()> {
    let mut a = parts_for(
        Method::GET,
        "http://example.amazonaws.com/?prefix=CI/&list-type=2",
    );
    sign(&signer(), &mut a, &test_credential(), None).await?;

    let mut b = parts_for(
        Method::GET,
        "http://example.amazonaws.com/?list-type=2&prefix=CI/",
    );
    sign(&signer(), &mut b, &test_credential(), None).await?;

    assert_eq!(authorization(&a), authorization(&b));
    Ok(())
}

#[tokio::test]
async fn test_session_token_is_signed() -> Result<()> {
    let cred = test_credential().with_session_token("short-lived-token");
    let mut parts = parts_for(Method::GET, "http://example.amazonaws.com/");
    sign(&signer(), &mut parts, &cred, None).await?;

    assert_eq!(
        parts.headers["x-amz-security-token"].to_str()?,
        "short-lived-token"
    );
    assert!(authorization(&parts).contains("x-amz-security-token"));
    Ok(())
}

#[tokio::test]
async fn test_anonymous_request_is_untouched() -> Result<()> {
    let ctx = super::init_signing_test();
    let mut parts = parts_for(Method::GET, "http://example.amazonaws.com/");
    signer().sign_request(&ctx, &mut parts, None, None).await?;

    assert!(parts.headers.get(header::AUTHORIZATION).is_none());
    assert!(parts.headers.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_credential_whitespace_is_sanitized() -> Result<()> {
    use awssign_aws_v4::Credential;

    let mut clean = parts_for(Method::GET, "http://example.amazonaws.com/");
    sign(&signer(), &mut clean, &test_credential(), None).await?;

    let padded = Credential::new(" AKIDEXAMPLE ", " wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY\n");
    let mut signed = parts_for(Method::GET, "http://example.amazonaws.com/");
    sign(&signer(), &mut signed, &padded, None).await?;

    assert_eq!(authorization(&clean), authorization(&signed));
    Ok(())
}
