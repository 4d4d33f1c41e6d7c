use crate::canonical;
use crate::constants::{
    AWS4_SIGNING_ALGORITHM, PRESIGN_URL_MAX_EXPIRES_SECS, UNSIGNED_PAYLOAD, X_AMZ_CONTENT_SHA_256,
    X_AMZ_DATE, X_AMZ_SECURITY_TOKEN,
};
use crate::key::cached_signing_key;
use crate::Credential;
use async_trait::async_trait;
use awssign_core::hash::{hex_hmac_sha256, hex_sha256, hex_sha256_reader, EMPTY_STRING_SHA256};
use awssign_core::time::{format_date, format_iso8601, Clock, DateTime};
use awssign_core::{Context, Error, SignRequest, SigningRequest};
use http::request::Parts;
use http::{header, HeaderMap, HeaderValue};
use log::debug;
use std::fmt::Write;
use std::time::Duration;

/// RequestSigner that implements AWS SigV4.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
///
/// Produces an `Authorization` header by default, or a presigned URL when
/// an expiry is supplied to [`SignRequest::sign_request`].
#[derive(Debug)]
pub struct RequestSigner {
    service: String,
    region: String,

    double_url_encode: bool,
    content_sha256_header: bool,
    clock: Clock,
}

impl RequestSigner {
    /// Create a new signer for the given service and region.
    pub fn new(service: &str, region: &str) -> Self {
        Self {
            service: service.into(),
            region: region.into(),

            double_url_encode: true,
            content_sha256_header: false,
            clock: Clock::default(),
        }
    }

    /// Control whether the canonical path is percent-encoded twice.
    ///
    /// Every AWS service expects double encoding except S3, which signs the
    /// singly-encoded path.
    pub fn with_double_url_encode(mut self, enable: bool) -> Self {
        self.double_url_encode = enable;
        self
    }

    /// Always announce the payload hash through `x-amz-content-sha256`.
    ///
    /// S3 requires the header on every request; requests without an explicit
    /// hash are signed as `UNSIGNED-PAYLOAD`.
    pub fn with_content_sha256_header(mut self) -> Self {
        self.content_sha256_header = true;
        self
    }

    /// Replace the clock that supplies the signing instant.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    pub fn with_time(self, time: DateTime) -> Self {
        self.with_clock(Clock::fixed(time))
    }

    /// The payload hash that goes into the canonical request.
    ///
    /// An explicit `x-amz-content-sha256` header always wins. Without one,
    /// S3-style signers fall back to `UNSIGNED-PAYLOAD` and everything else
    /// signs the hash of the empty body.
    fn resolve_content_sha256(&self, headers: &HeaderMap) -> awssign_core::Result<String> {
        if let Some(v) = headers.get(X_AMZ_CONTENT_SHA_256) {
            return Ok(v.to_str()?.to_string());
        }
        if self.content_sha256_header {
            return Ok(UNSIGNED_PAYLOAD.to_string());
        }
        Ok(EMPTY_STRING_SHA256.to_string())
    }
}

#[async_trait]
impl SignRequest for RequestSigner {
    type Credential = Credential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Parts,
        credential: Option<&Self::Credential>,
        expires_in: Option<Duration>,
    ) -> awssign_core::Result<()> {
        // Anonymous requests pass through unsigned.
        let Some(cred) = credential else {
            return Ok(());
        };
        let cred = cred.sanitized();

        if let Some(expires) = expires_in {
            if expires.as_secs() == 0 {
                return Err(Error::request_invalid(
                    "presigned URL expiry must be positive",
                ));
            }
            if expires.as_secs() > PRESIGN_URL_MAX_EXPIRES_SECS {
                return Err(Error::request_invalid(format!(
                    "presigned URL expiry {}s exceeds the maximum of {}s (7 days)",
                    expires.as_secs(),
                    PRESIGN_URL_MAX_EXPIRES_SECS
                )));
            }
        }

        let now = self.clock.now();
        let mut signed_req = SigningRequest::build(req)?;

        let content_sha256 = self.resolve_content_sha256(&signed_req.headers)?;

        // Insert HOST header if not present.
        if signed_req.headers.get(header::HOST).is_none() {
            signed_req.headers.insert(
                header::HOST,
                signed_req.authority.as_str().parse().map_err(|e| {
                    Error::unexpected(format!("failed to parse authority as header value: {e}"))
                })?,
            );
        }

        if expires_in.is_none() {
            // Insert DATE header if not present.
            if signed_req.headers.get(X_AMZ_DATE).is_none() {
                let date_header = HeaderValue::try_from(format_iso8601(now))?;
                signed_req.headers.insert(X_AMZ_DATE, date_header);
            }

            if self.content_sha256_header
                && signed_req.headers.get(X_AMZ_CONTENT_SHA_256).is_none()
            {
                signed_req.headers.insert(
                    X_AMZ_CONTENT_SHA_256,
                    HeaderValue::from_str(&content_sha256)?,
                );
            }

            // Insert X_AMZ_SECURITY_TOKEN header if security token exists.
            if let Some(token) = &cred.session_token {
                let mut value = HeaderValue::from_str(token)?;
                // Set token value sensitive to avoid leaking.
                value.set_sensitive(true);

                signed_req.headers.insert(X_AMZ_SECURITY_TOKEN, value);
            }
        }

        let signed_headers = canonical::signed_header_names(&signed_req.headers);

        // Scope: "20220313/<region>/<service>/aws4_request"
        let scope = format!(
            "{}/{}/{}/aws4_request",
            format_date(now),
            self.region,
            self.service
        );
        debug!("calculated scope: {scope}");

        if let Some(expires) = expires_in {
            signed_req.query_push("X-Amz-Algorithm", AWS4_SIGNING_ALGORITHM);
            signed_req.query_push(
                "X-Amz-Credential",
                format!("{}/{}", cred.access_key_id, scope),
            );
            signed_req.query_push("X-Amz-Date", format_iso8601(now));
            signed_req.query_push("X-Amz-Expires", expires.as_secs().to_string());
            signed_req.query_push("X-Amz-SignedHeaders", signed_headers.join(";"));

            if let Some(token) = &cred.session_token {
                signed_req.query_push("X-Amz-Security-Token", token);
            }
        }
        canonical::encode_and_sort_query(&mut signed_req.query);

        let creq = canonical::canonical_request(
            &signed_req,
            &signed_headers,
            &content_sha256,
            self.double_url_encode,
        )?;
        debug!("calculated canonical request: {creq}");

        // StringToSign:
        //
        // AWS4-HMAC-SHA256
        // 20220313T072004Z
        // 20220313/<region>/<service>/aws4_request
        // <hashed_canonical_request>
        let string_to_sign = {
            let mut f = String::new();
            writeln!(f, "{AWS4_SIGNING_ALGORITHM}")?;
            writeln!(f, "{}", format_iso8601(now))?;
            writeln!(f, "{}", &scope)?;
            write!(f, "{}", hex_sha256(creq.as_bytes()))?;
            f
        };
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key = cached_signing_key(&cred, now, &self.region, &self.service);
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        if expires_in.is_some() {
            signed_req.query_push("X-Amz-Signature", signature);
        } else {
            let mut authorization = HeaderValue::from_str(&format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                AWS4_SIGNING_ALGORITHM,
                cred.access_key_id,
                scope,
                signed_headers.join(";"),
                signature
            ))?;
            authorization.set_sensitive(true);

            signed_req
                .headers
                .insert(header::AUTHORIZATION, authorization);
        }

        // Apply to the request.
        signed_req.apply(req)
    }
}

/// Hash a request payload into an `x-amz-content-sha256` value.
///
/// I/O failures while reading the payload surface as [`ErrorKind::Unexpected`]
/// with the underlying cause attached.
///
/// [`ErrorKind::Unexpected`]: awssign_core::ErrorKind::Unexpected
pub fn hash_reader(mut reader: impl std::io::Read) -> awssign_core::Result<String> {
    hex_sha256_reader(&mut reader)
}

/// Extract the seed signature from a freshly signed request.
///
/// Chunked uploads and event streams chain their per-part signatures off the
/// signature in the `Authorization` header of the initiating request.
pub fn extract_seed_signature(headers: &HeaderMap) -> awssign_core::Result<String> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| Error::request_invalid("request has no authorization header"))?
        .to_str()?;

    let signature = auth
        .rsplit_once("Signature=")
        .map(|(_, sig)| sig.trim())
        .ok_or_else(|| {
            Error::request_invalid("authorization header carries no Signature component")
        })?;

    if signature.len() != 64 || !signature.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::request_invalid(
            "authorization signature is not a 64-character hex digest",
        ));
    }

    Ok(signature.to_string())
}
