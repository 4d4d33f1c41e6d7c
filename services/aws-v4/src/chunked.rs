//! `aws-chunked` payload signing.
//!
//! S3 accepts streaming uploads whose body is cut into chunks, each framed
//! with its own signature chained off the one before it:
//!
//! ```text
//! <hex-size>;chunk-signature=<64-hex>\r\n
//! <data>\r\n
//! ```
//!
//! The stream ends with a zero-length chunk carrying the last signature of
//! the chain. See
//! [Chunked upload](https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-streaming.html).

use crate::constants::AWS4_PAYLOAD_SIGNING_ALGORITHM;
use crate::key::generate_signing_key;
use crate::sign_request::extract_seed_signature;
use crate::Credential;
use awssign_core::hash::{hex_hmac_sha256, hex_sha256, EMPTY_STRING_SHA256};
use awssign_core::time::{format_date, format_iso8601, parse_iso8601, DateTime};
use awssign_core::{Error, Result};
use bytes::{Buf, BytesMut};
use http::HeaderMap;
use std::io;
use std::io::{Read, Seek, SeekFrom};

/// Default size of each signed chunk: 128 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;

/// Default replay buffer for non-seekable payloads: 256 KiB.
pub const DEFAULT_REPLAY_BUFFER_SIZE: usize = 256 * 1024;

const CHUNK_SIGNATURE_MARKER: &str = ";chunk-signature=";
const SIGNATURE_HEX_LEN: u64 = 64;
const CRLF_LEN: u64 = 2;

/// Everything needed to sign chunks of one upload.
///
/// The context itself is immutable; the rolling prior signature lives in
/// [`ChunkedSigningStream`] so a context can seed several attempts.
#[derive(Debug, Clone)]
pub struct ChunkSigningContext {
    signing_key: Vec<u8>,
    time: DateTime,
    scope: String,
    seed_signature: String,
}

impl ChunkSigningContext {
    /// Create a context from an already derived signing key.
    pub fn new(
        signing_key: Vec<u8>,
        time: DateTime,
        region: &str,
        service: &str,
        seed_signature: impl Into<String>,
    ) -> Self {
        Self {
            signing_key,
            time,
            scope: format!(
                "{}/{}/{}/aws4_request",
                format_date(time),
                region,
                service
            ),
            seed_signature: seed_signature.into(),
        }
    }

    /// Build a context from the headers of a freshly signed request.
    ///
    /// The seed signature comes out of the `Authorization` header and the
    /// signing instant out of `x-amz-date`, so the chunk chain is anchored
    /// to exactly the request S3 saw.
    pub fn from_signed_parts(
        cred: &Credential,
        region: &str,
        service: &str,
        headers: &HeaderMap,
    ) -> Result<Self> {
        let seed_signature = extract_seed_signature(headers)?;
        let date = headers
            .get(crate::constants::X_AMZ_DATE)
            .ok_or_else(|| Error::request_invalid("signed request has no x-amz-date header"))?
            .to_str()?;
        let time = parse_iso8601(date)?;

        Ok(Self::new(
            generate_signing_key(&cred.secret_access_key, time, region, service),
            time,
            region,
            service,
            seed_signature,
        ))
    }

    /// The signature the chunk chain starts from.
    pub fn seed_signature(&self) -> &str {
        &self.seed_signature
    }

    /// Sign one chunk, chaining off `prior_signature`.
    pub fn sign_chunk(&self, prior_signature: &str, data: &[u8]) -> String {
        // StringToSign:
        //
        // AWS4-HMAC-SHA256-PAYLOAD
        // 20130524T000000Z
        // 20130524/us-east-1/s3/aws4_request
        // <prior signature>
        // <sha256 of empty string>
        // <sha256 of chunk data>
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            AWS4_PAYLOAD_SIGNING_ALGORITHM,
            format_iso8601(self.time),
            self.scope,
            prior_signature,
            EMPTY_STRING_SHA256,
            hex_sha256(data),
        );

        hex_hmac_sha256(&self.signing_key, string_to_sign.as_bytes())
    }
}

/// The wire length of one signed chunk holding `data_len` payload bytes.
fn signed_chunk_length(data_len: u64) -> u64 {
    let hex_len = format!("{data_len:x}").len() as u64;
    hex_len
        + CHUNK_SIGNATURE_MARKER.len() as u64
        + SIGNATURE_HEX_LEN
        + CRLF_LEN
        + data_len
        + CRLF_LEN
}

/// Extra bytes a trailing checksum header adds to the encoded stream.
#[derive(Debug, Clone)]
pub struct ChecksumTrailerLength {
    /// Name of the trailing header, e.g. `x-amz-checksum-crc32`.
    pub header_name: String,
    /// Length of the encoded checksum value.
    pub checksum_len: u64,
}

impl ChecksumTrailerLength {
    /// Encoded length of the trailer line: `name:value\r\n`.
    pub fn encoded_len(&self) -> u64 {
        self.header_name.len() as u64 + 1 + self.checksum_len + CRLF_LEN
    }
}

/// Total `Content-Length` of an `aws-chunked` encoded stream.
///
/// S3 requires the encoded length up front, so it has to be computed from
/// the decoded length before any chunk is signed.
pub fn compute_stream_content_length(
    decoded_length: u64,
    chunk_size: u64,
    trailer: Option<&ChecksumTrailerLength>,
) -> u64 {
    let full_chunks = decoded_length / chunk_size;
    let remainder = decoded_length % chunk_size;

    let mut total = full_chunks * signed_chunk_length(chunk_size);
    if remainder > 0 {
        total += signed_chunk_length(remainder);
    }
    // Terminal zero-length chunk.
    total += signed_chunk_length(0);
    if let Some(trailer) = trailer {
        total += trailer.encoded_len();
    }

    total
}

trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Where the raw payload bytes come from.
///
/// Non-seekable payloads are shadow-buffered up to a limit so the stream
/// can be replayed after a transient failure; seekable payloads rewind
/// natively.
enum Source {
    Replay {
        inner: Box<dyn Read + Send>,
        buffer: Vec<u8>,
        pos: usize,
        limit: usize,
        overflowed: bool,
    },
    Seek {
        inner: Box<dyn ReadSeek>,
        start: u64,
    },
}

impl Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Replay {
                inner,
                buffer,
                pos,
                limit,
                overflowed,
            } => {
                if *pos < buffer.len() {
                    let n = (buffer.len() - *pos).min(buf.len());
                    buf[..n].copy_from_slice(&buffer[*pos..*pos + n]);
                    *pos += n;
                    return Ok(n);
                }

                let n = inner.read(buf)?;
                if !*overflowed {
                    if buffer.len() + n <= *limit {
                        buffer.extend_from_slice(&buf[..n]);
                        *pos = buffer.len();
                    } else {
                        // Past the limit the stream can no longer be replayed.
                        *overflowed = true;
                    }
                }
                Ok(n)
            }
            Source::Seek { inner, .. } => inner.read(buf),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        match self {
            Source::Replay {
                pos, overflowed, ..
            } => {
                if *overflowed {
                    return Err(Error::request_invalid(
                        "payload exceeded the replay buffer; stream cannot be reset",
                    ));
                }
                *pos = 0;
                Ok(())
            }
            Source::Seek { inner, start } => {
                inner.seek(SeekFrom::Start(*start))?;
                Ok(())
            }
        }
    }
}

/// An `io::Read` adapter that frames and signs a payload on the fly.
///
/// Reading from this stream yields the fully encoded `aws-chunked` body:
/// one signed frame per chunk of the underlying payload, then the terminal
/// zero-length frame.
pub struct ChunkedSigningStream {
    ctx: ChunkSigningContext,
    source: Source,
    chunk_size: usize,

    prior_signature: String,
    pending: BytesMut,
    chunk_buf: Vec<u8>,
    finished: bool,
}

impl ChunkedSigningStream {
    /// Wrap a non-seekable payload.
    ///
    /// Up to [`DEFAULT_REPLAY_BUFFER_SIZE`] bytes are shadow-buffered so
    /// [`reset`](Self::reset) can replay the stream.
    pub fn new(ctx: ChunkSigningContext, reader: impl Read + Send + 'static) -> Self {
        let prior_signature = ctx.seed_signature().to_string();
        Self {
            ctx,
            source: Source::Replay {
                inner: Box::new(reader),
                buffer: Vec::new(),
                pos: 0,
                limit: DEFAULT_REPLAY_BUFFER_SIZE,
                overflowed: false,
            },
            chunk_size: DEFAULT_CHUNK_SIZE,
            prior_signature,
            pending: BytesMut::new(),
            chunk_buf: Vec::new(),
            finished: false,
        }
    }

    /// Wrap a seekable payload, using native seeks for replay.
    pub fn from_seekable(
        ctx: ChunkSigningContext,
        mut reader: impl Read + Seek + Send + 'static,
    ) -> Result<Self> {
        let start = reader.stream_position()?;
        let prior_signature = ctx.seed_signature().to_string();
        Ok(Self {
            ctx,
            source: Source::Seek {
                inner: Box::new(reader),
                start,
            },
            chunk_size: DEFAULT_CHUNK_SIZE,
            prior_signature,
            pending: BytesMut::new(),
            chunk_buf: Vec::new(),
            finished: false,
        })
    }

    /// Set the payload bytes carried per signed chunk.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        debug_assert!(chunk_size > 0);
        self.chunk_size = chunk_size;
        self
    }

    /// Set the shadow-buffer limit for non-seekable payloads.
    pub fn with_replay_buffer_size(mut self, size: usize) -> Self {
        if let Source::Replay { limit, .. } = &mut self.source {
            *limit = size;
        }
        self
    }

    /// Rewind to the beginning of the encoded stream.
    ///
    /// Fails for non-seekable payloads that have outgrown the replay
    /// buffer.
    pub fn reset(&mut self) -> Result<()> {
        self.source.rewind()?;
        self.prior_signature = self.ctx.seed_signature().to_string();
        self.pending.clear();
        self.finished = false;
        Ok(())
    }

    /// Read up to one chunk of payload, filling `chunk_buf`.
    fn fill_chunk_buf(&mut self) -> io::Result<usize> {
        self.chunk_buf.resize(self.chunk_size, 0);
        let mut filled = 0;
        while filled < self.chunk_size {
            let n = self.source.read(&mut self.chunk_buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        self.chunk_buf.truncate(filled);
        Ok(filled)
    }

    fn produce_next_frame(&mut self) -> io::Result<()> {
        let len = self.fill_chunk_buf()?;
        let signature = self.ctx.sign_chunk(&self.prior_signature, &self.chunk_buf);

        self.pending.extend_from_slice(
            format!("{len:x}{CHUNK_SIGNATURE_MARKER}{signature}\r\n").as_bytes(),
        );
        self.pending.extend_from_slice(&self.chunk_buf);
        self.pending.extend_from_slice(b"\r\n");

        self.prior_signature = signature;
        if len == 0 {
            self.finished = true;
        }
        Ok(())
    }
}

impl Read for ChunkedSigningStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if !self.pending.has_remaining() {
            if self.finished {
                return Ok(0);
            }
            self.produce_next_frame()?;
        }

        let n = self.pending.remaining().min(buf.len());
        self.pending.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}
