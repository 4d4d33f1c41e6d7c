//! Event-stream frame signing.
//!
//! Bidirectional streaming APIs (S3 Select, Kinesis, Transcribe) wrap each
//! event in a signed frame. Every frame carries a `:date` timestamp header
//! and a `:chunk-signature` header whose value chains off the previous
//! frame's signature; the stream terminates with a signed empty frame.

use crate::constants::AWS4_PAYLOAD_SIGNING_ALGORITHM;
use crate::key::cached_signing_key;
use crate::Credential;
use awssign_core::hash::{hex_sha256, hmac_sha256};
use awssign_core::time::{format_date, format_iso8601, Clock};
use awssign_core::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

const HEADER_TYPE_BYTE_ARRAY: u8 = 6;
const HEADER_TYPE_TIMESTAMP: u8 = 8;

/// The value of one event-stream frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameHeaderValue {
    /// Millisecond Unix timestamp, wire type 8.
    Timestamp(i64),
    /// Length-prefixed opaque bytes, wire type 6.
    ByteArray(Bytes),
}

/// A single event-stream frame header.
///
/// Encoded as `[name_len u8][name][type u8][value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Header name, e.g. `:date`.
    pub name: String,
    /// Header value.
    pub value: FrameHeaderValue,
}

impl FrameHeader {
    /// A timestamp header holding `millis` milliseconds since the epoch.
    pub fn timestamp(name: &str, millis: i64) -> Self {
        Self {
            name: name.to_string(),
            value: FrameHeaderValue::Timestamp(millis),
        }
    }

    /// A byte-array header.
    pub fn byte_array(name: &str, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.to_string(),
            value: FrameHeaderValue::ByteArray(value.into()),
        }
    }

    /// Append the wire encoding of this header to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let name = self.name.as_bytes();
        if name.len() > u8::MAX as usize {
            return Err(Error::request_invalid(format!(
                "frame header name {} exceeds 255 bytes",
                self.name
            )));
        }
        buf.put_u8(name.len() as u8);
        buf.put_slice(name);

        match &self.value {
            FrameHeaderValue::Timestamp(millis) => {
                buf.put_u8(HEADER_TYPE_TIMESTAMP);
                buf.put_i64(*millis);
            }
            FrameHeaderValue::ByteArray(bytes) => {
                if bytes.len() > u16::MAX as usize {
                    return Err(Error::request_invalid(format!(
                        "frame header {} value exceeds 65535 bytes",
                        self.name
                    )));
                }
                buf.put_u8(HEADER_TYPE_BYTE_ARRAY);
                buf.put_u16(bytes.len() as u16);
                buf.put_slice(bytes);
            }
        }
        Ok(())
    }
}

/// One signed frame ready for the wire.
#[derive(Debug, Clone)]
pub struct SignedFrame {
    /// Frame headers: `:date` first, `:chunk-signature` last.
    pub headers: Vec<FrameHeader>,
    /// The event payload the frame carries.
    pub payload: Bytes,
    /// Hex signature of this frame, the prior for the next one.
    pub signature: String,
}

impl SignedFrame {
    /// Wire encoding of this frame's headers.
    pub fn encoded_headers(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        for header in &self.headers {
            header.encode(&mut buf)?;
        }
        Ok(buf.freeze())
    }
}

/// Signs event frames in sequence.
///
/// Frames must be signed in transmission order; the signer holds the rolling
/// prior signature, so signing takes `&mut self`.
#[derive(Debug)]
pub struct EventFrameSigner {
    credential: Credential,
    region: String,
    service: String,

    prior_signature: String,
    clock: Clock,
}

impl EventFrameSigner {
    /// Create a signer seeded with the signature of the initiating request.
    pub fn new(
        credential: Credential,
        region: &str,
        service: &str,
        seed_signature: impl Into<String>,
    ) -> Self {
        Self {
            credential,
            region: region.into(),
            service: service.into(),
            prior_signature: seed_signature.into(),
            clock: Clock::default(),
        }
    }

    /// Replace the clock that supplies each frame's timestamp.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The signature the next frame will chain off.
    pub fn prior_signature(&self) -> &str {
        &self.prior_signature
    }

    /// Sign the next frame of the stream.
    ///
    /// Long-lived streams may cross a UTC day boundary, so the scope and
    /// signing key are re-resolved from the clock on every frame.
    pub fn sign_frame(&mut self, payload: &[u8]) -> Result<SignedFrame> {
        let now = self.clock.now();
        let date_header = FrameHeader::timestamp(":date", now.timestamp_millis());

        let mut encoded_date = BytesMut::new();
        date_header.encode(&mut encoded_date)?;

        let scope = format!(
            "{}/{}/{}/aws4_request",
            format_date(now),
            self.region,
            self.service
        );
        // StringToSign:
        //
        // AWS4-HMAC-SHA256-PAYLOAD
        // 20220313T072004Z
        // 20220313/<region>/<service>/aws4_request
        // <prior signature>
        // <sha256 of the encoded :date header>
        // <sha256 of the payload>
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            AWS4_PAYLOAD_SIGNING_ALGORITHM,
            format_iso8601(now),
            scope,
            self.prior_signature,
            hex_sha256(&encoded_date),
            hex_sha256(payload),
        );

        let key = cached_signing_key(&self.credential, now, &self.region, &self.service);
        let raw_signature = hmac_sha256(&key, string_to_sign.as_bytes());
        let signature = hex::encode(&raw_signature);

        let frame = SignedFrame {
            headers: vec![
                date_header,
                FrameHeader::byte_array(":chunk-signature", raw_signature),
            ],
            payload: Bytes::copy_from_slice(payload),
            signature: signature.clone(),
        };

        self.prior_signature = signature;
        Ok(frame)
    }
}

/// Iterator adapter that signs every event of an underlying stream and
/// appends the terminating empty frame after the last one.
pub struct SignedFrameStream<I> {
    signer: EventFrameSigner,
    inner: I,
    terminated: bool,
}

impl<I> SignedFrameStream<I> {
    /// Wrap an iterator of event payloads.
    pub fn new(signer: EventFrameSigner, inner: I) -> Self {
        Self {
            signer,
            inner,
            terminated: false,
        }
    }
}

impl<I> Iterator for SignedFrameStream<I>
where
    I: Iterator<Item = Bytes>,
{
    type Item = Result<SignedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.terminated {
            return None;
        }
        match self.inner.next() {
            Some(payload) => Some(self.signer.sign_frame(&payload)),
            None => {
                self.terminated = true;
                Some(self.signer.sign_frame(&[]))
            }
        }
    }
}
