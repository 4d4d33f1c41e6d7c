//! Canonical request construction.
//!
//! Implements the canonical form described in
//! [Create a canonical request](https://docs.aws.amazon.com/general/latest/gr/sigv4-create-canonical-request.html):
//! header normalization, query encoding and the six-line canonical request
//! string that gets hashed into the string to sign.

use crate::constants::{AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET, HEADERS_TO_IGNORE};
use awssign_core::{Error, Result, SigningRequest};
use http::HeaderMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode};
use std::borrow::Cow;
use std::fmt::Write;

fn is_header_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0b' | '\x0c')
}

/// Collapse each interior run of whitespace into a single space.
///
/// Leading and trailing whitespace is left untouched; only runs strictly
/// between the first and last non-whitespace characters are folded.
pub(crate) fn compact_interior_whitespace(s: &str) -> Cow<'_, str> {
    let Some(start) = s.find(|c| !is_header_space(c)) else {
        return Cow::Borrowed(s);
    };
    let end = s
        .rfind(|c| !is_header_space(c))
        .map(|i| i + s[i..].chars().next().map(char::len_utf8).unwrap_or(1))
        .unwrap_or(s.len());

    let interior = &s[start..end];
    let needs_rewrite = {
        let mut prev_space = false;
        let mut rewrite = false;
        for c in interior.chars() {
            if is_header_space(c) {
                if prev_space || c != ' ' {
                    rewrite = true;
                    break;
                }
                prev_space = true;
            } else {
                prev_space = false;
            }
        }
        rewrite
    };
    if !needs_rewrite {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..start]);
    let mut prev_space = false;
    for c in interior.chars() {
        if is_header_space(c) {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out.push_str(&s[end..]);
    Cow::Owned(out)
}

/// Lowercased, byte-sorted names of all headers that take part in signing.
///
/// Hop-by-hop and proxy-mangled headers are excluded so that intermediaries
/// cannot break the signature.
pub(crate) fn signed_header_names(headers: &HeaderMap) -> Vec<String> {
    let mut names = headers
        .keys()
        .map(|k| k.as_str().to_lowercase())
        .filter(|k| !HEADERS_TO_IGNORE.contains(&k.as_str()))
        .collect::<Vec<_>>();
    names.sort();
    names.dedup();
    names
}

/// Canonical URI: the percent-decoded path re-encoded with the AWS set.
///
/// Every service except S3 encodes the path a second time, so that a
/// pre-encoded `%2F` survives as a literal rather than a path separator.
pub(crate) fn canonical_uri(path: &str, double_url_encode: bool) -> Result<String> {
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|e| Error::request_invalid(format!("request path is not valid utf-8: {e}")))?;

    let mut encoded = utf8_percent_encode(&decoded, &AWS_URI_ENCODE_SET).to_string();
    if double_url_encode {
        encoded = utf8_percent_encode(&encoded, &AWS_URI_ENCODE_SET).to_string();
    }
    Ok(encoded)
}

/// Percent-encode every query pair with the AWS set, then sort the encoded
/// tuples byte-wise. Sorting after encoding matches what services compare
/// against on their side.
pub(crate) fn encode_and_sort_query(query: &mut Vec<(String, String)>) {
    for (k, v) in query.iter_mut() {
        *k = utf8_percent_encode(k, &AWS_QUERY_ENCODE_SET).to_string();
        *v = utf8_percent_encode(v, &AWS_QUERY_ENCODE_SET).to_string();
    }
    query.sort();
}

/// Build the canonical request string.
///
/// The query in `req` must already be encoded and sorted via
/// [`encode_and_sort_query`]. Header values are whitespace-compacted only
/// inside the canonical form; the request keeps its original bytes.
pub(crate) fn canonical_request(
    req: &SigningRequest,
    signed_headers: &[String],
    content_sha256: &str,
    double_url_encode: bool,
) -> Result<String> {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    writeln!(f, "{}", req.method)?;
    writeln!(f, "{}", canonical_uri(&req.path, double_url_encode)?)?;
    writeln!(
        f,
        "{}",
        req.query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    )?;

    for name in signed_headers {
        // A repeated header contributes one line per value, in the order
        // the values were given.
        for value in req.headers.get_all(name.as_str()) {
            writeln!(
                f,
                "{}:{}",
                name,
                compact_interior_whitespace(value.to_str()?)
            )?;
        }
    }
    writeln!(f)?;
    writeln!(f, "{}", signed_headers.join(";"))?;
    write!(f, "{content_sha256}")?;

    Ok(f)
}
