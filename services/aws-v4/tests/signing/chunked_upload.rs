use super::{parts_for, sign, test_credential, test_time};
use anyhow::Result;
use awssign_aws_v4::{
    compute_stream_content_length, ChunkSigningContext, ChunkedSigningStream, RequestSigner,
    AWS_CHUNKED_CONTENT_ENCODING, DEFAULT_CHUNK_SIZE, STREAMING_AWS4_HMAC_SHA256_PAYLOAD,
    X_AMZ_CONTENT_SHA_256, X_AMZ_DECODED_CONTENT_LENGTH,
};
use http::{header, Method};
use pretty_assertions::assert_eq;
use std::io::{Cursor, Read};

fn signer() -> RequestSigner {
    RequestSigner::new("s3", "us-east-1")
        .with_double_url_encode(false)
        .with_time(test_time())
}

/// Sign a chunked PUT the way an S3 client does: announce the streaming
/// payload in the headers, sign the request, then chain the chunk
/// signatures off the request signature.
#[tokio::test]
async fn test_chunked_upload_end_to_end() -> Result<()> {
    let payload = vec![b'a'; 300_000];
    let decoded_length = payload.len() as u64;
    let encoded_length =
        compute_stream_content_length(decoded_length, DEFAULT_CHUNK_SIZE as u64, None);

    let mut parts = parts_for(Method::PUT, "http://mybucket.s3.amazonaws.com/big-object");
    parts.headers.insert(
        X_AMZ_CONTENT_SHA_256,
        STREAMING_AWS4_HMAC_SHA256_PAYLOAD.parse()?,
    );
    parts.headers.insert(
        header::CONTENT_ENCODING,
        AWS_CHUNKED_CONTENT_ENCODING.parse()?,
    );
    parts.headers.insert(
        X_AMZ_DECODED_CONTENT_LENGTH,
        decoded_length.to_string().parse()?,
    );
    parts
        .headers
        .insert(header::CONTENT_LENGTH, encoded_length.to_string().parse()?);

    let cred = test_credential();
    sign(&signer(), &mut parts, &cred, None).await?;

    let ctx = ChunkSigningContext::from_signed_parts(&cred, "us-east-1", "s3", &parts.headers)?;
    let mut stream = ChunkedSigningStream::from_seekable(ctx, Cursor::new(payload))?;

    let mut encoded = Vec::new();
    stream.read_to_end(&mut encoded)?;

    // The announced Content-Length matches the bytes actually produced.
    assert_eq!(encoded.len() as u64, encoded_length);

    let body = String::from_utf8_lossy(&encoded);
    assert!(body.ends_with("\r\n\r\n"));
    assert!(body.contains("0;chunk-signature="));
    Ok(())
}

#[tokio::test]
async fn test_chunked_upload_replays_identically_after_reset() -> Result<()> {
    let payload = vec![b'b'; 10_000];

    let mut parts = parts_for(Method::PUT, "http://mybucket.s3.amazonaws.com/object");
    parts.headers.insert(
        X_AMZ_CONTENT_SHA_256,
        STREAMING_AWS4_HMAC_SHA256_PAYLOAD.parse()?,
    );
    let cred = test_credential();
    sign(&signer(), &mut parts, &cred, None).await?;

    let ctx = ChunkSigningContext::from_signed_parts(&cred, "us-east-1", "s3", &parts.headers)?;
    let mut stream =
        ChunkedSigningStream::new(ctx, Cursor::new(payload)).with_chunk_size(4096);

    let mut first = Vec::new();
    stream.read_to_end(&mut first)?;

    stream.reset()?;
    let mut second = Vec::new();
    stream.read_to_end(&mut second)?;

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_chunk_context_requires_signed_request() -> Result<()> {
    let parts = parts_for(Method::PUT, "http://mybucket.s3.amazonaws.com/object");

    // Unsigned request has no authorization header to seed from.
    assert!(ChunkSigningContext::from_signed_parts(
        &test_credential(),
        "us-east-1",
        "s3",
        &parts.headers
    )
    .is_err());
    Ok(())
}
