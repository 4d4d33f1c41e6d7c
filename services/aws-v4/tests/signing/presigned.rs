// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use super::{parts_for, sign, test_credential, test_time};
use anyhow::Result;
use awssign_aws_v4::RequestSigner;
use http::{header, Method};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::time::Duration;
use test_case::test_case;

fn signer() -> RequestSigner {
    RequestSigner::new("s3", "us-east-1")
        .with_double_url_encode(false)
        .with_time(test_time())
}

fn query_map(parts: &http::request::Parts) -> HashMap<String, String> {
    form_urlencoded::parse(parts.uri.query().unwrap_or_default().as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[tokio::test]
async fn test_presigned_url_query_parameters() -> Result<()> {
    let mut parts = parts_for(Method::GET, "http://mybucket.s3.amazonaws.com/object.txt");
    sign(
        &signer(),
        &mut parts,
        &test_credential(),
        Some(Duration::from_secs(3600)),
    )
    .await?;

    let query = query_map(&parts);
    assert_eq!(query["X-Amz-Algorithm"], "AWS4-HMAC-SHA256");
    assert_eq!(
        query["X-Amz-Credential"],
        "AKIDEXAMPLE/20150830/us-east-1/s3/aws4_request"
    );
    assert_eq!(query["X-Amz-Date"], "20150830T123600Z");
    assert_eq!(query["X-Amz-Expires"], "3600");
    assert_eq!(query["X-Amz-SignedHeaders"], "host");

    let signature = &query["X-Amz-Signature"];
    assert_eq!(signature.len(), 64);
    assert!(signature.bytes().all(|b| b.is_ascii_hexdigit()));

    // Presigned URLs carry the signature in the query, not in headers.
    assert!(parts.headers.get(header::AUTHORIZATION).is_none());
    assert!(parts.headers.get("x-amz-date").is_none());
    Ok(())
}

#[tokio::test]
async fn test_presigned_url_with_session_token() -> Result<()> {
    let cred = test_credential().with_session_token("short-lived-token");
    let mut parts = parts_for(Method::GET, "http://mybucket.s3.amazonaws.com/object.txt");
    sign(&signer(), &mut parts, &cred, Some(Duration::from_secs(60))).await?;

    let query = query_map(&parts);
    assert_eq!(query["X-Amz-Security-Token"], "short-lived-token");
    // The token travels in the query, never as a header.
    assert!(parts.headers.get("x-amz-security-token").is_none());
    Ok(())
}

#[tokio::test]
async fn test_presigned_url_preserves_original_query() -> Result<()> {
    let mut parts = parts_for(
        Method::GET,
        "http://mybucket.s3.amazonaws.com/object.txt?versionId=abc123",
    );
    sign(
        &signer(),
        &mut parts,
        &test_credential(),
        Some(Duration::from_secs(3600)),
    )
    .await?;

    let query = query_map(&parts);
    assert_eq!(query["versionId"], "abc123");
    Ok(())
}

#[test_case(1, true; "one second")]
#[test_case(3600, true; "one hour")]
#[test_case(604_800, true; "exactly seven days")]
#[test_case(604_801, false; "seven days and one second")]
#[test_case(0, false; "zero")]
#[tokio::test]
async fn test_presigned_expiry_bounds(expires_secs: u64, accepted: bool) -> Result<()> {
    let mut parts = parts_for(Method::GET, "http://mybucket.s3.amazonaws.com/object.txt");
    let result = sign(
        &signer(),
        &mut parts,
        &test_credential(),
        Some(Duration::from_secs(expires_secs)),
    )
    .await;

    assert_eq!(result.is_ok(), accepted);
    if !accepted {
        assert_eq!(
            result.unwrap_err().kind(),
            awssign_core::ErrorKind::RequestInvalid
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_presigned_url_is_deterministic() -> Result<()> {
    let mut first = parts_for(Method::GET, "http://mybucket.s3.amazonaws.com/object.txt");
    sign(
        &signer(),
        &mut first,
        &test_credential(),
        Some(Duration::from_secs(3600)),
    )
    .await?;

    let mut second = parts_for(Method::GET, "http://mybucket.s3.amazonaws.com/object.txt");
    sign(
        &signer(),
        &mut second,
        &test_credential(),
        Some(Duration::from_secs(3600)),
    )
    .await?;

    assert_eq!(first.uri, second.uri);
    Ok(())
}
