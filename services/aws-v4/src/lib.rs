//! AWS SigV4 signer.
//!
//! This crate implements the `AWS4-HMAC-SHA256` signing process on top of
//! `awssign-core`: canonical request construction, signing key derivation
//! with a process-wide cache, header signing and presigned URLs, the
//! `aws-chunked` payload transform used by S3 streaming uploads, and the
//! rolling event-stream frame signer.

mod constants;
pub use constants::{
    AWS_CHUNKED_CONTENT_ENCODING, STREAMING_AWS4_HMAC_SHA256_PAYLOAD, X_AMZ_CONTENT_SHA_256,
    X_AMZ_DATE, X_AMZ_DECODED_CONTENT_LENGTH, X_AMZ_SECURITY_TOKEN,
};

mod credential;
pub use credential::Credential;

mod provide_credential;
pub use provide_credential::{EnvCredentialProvider, StaticCredentialProvider};

mod canonical;
mod key;
pub use key::{generate_signing_key, SignerKey, SigningKeyCache};

mod sign_request;
pub use sign_request::{extract_seed_signature, hash_reader, RequestSigner};

mod chunked;
pub use chunked::{
    compute_stream_content_length, ChecksumTrailerLength, ChunkSigningContext,
    ChunkedSigningStream, DEFAULT_CHUNK_SIZE, DEFAULT_REPLAY_BUFFER_SIZE,
};

mod event_stream;
pub use event_stream::{
    EventFrameSigner, FrameHeader, FrameHeaderValue, SignedFrame, SignedFrameStream,
};
