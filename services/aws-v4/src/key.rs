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

//! Signing key derivation and caching.
//!
//! A SigV4 signing key is scoped to `(secret, date, region, service)` and is
//! valid for one UTC calendar day. Deriving it costs four HMAC invocations,
//! so keys are cached per credential scope and reused until the day rolls
//! over.

use crate::constants::AWS4_TERMINATOR;
use crate::Credential;
use awssign_core::hash::hmac_sha256;
use awssign_core::time::{days_since_epoch, format_date, DateTime};
use once_cell::sync::Lazy;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Number of credential scopes the process-wide cache keeps before evicting.
const DEFAULT_CACHE_CAPACITY: usize = 300;

static SIGNING_KEY_CACHE: Lazy<SigningKeyCache> =
    Lazy::new(|| SigningKeyCache::new(DEFAULT_CACHE_CAPACITY));

/// Derive a SigV4 signing key.
///
/// `kSigning = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")`
pub fn generate_signing_key(secret: &str, time: DateTime, region: &str, service: &str) -> Vec<u8> {
    let secret = format!("AWS4{secret}");
    let sign_date = hmac_sha256(secret.as_bytes(), format_date(time).as_bytes());
    let sign_region = hmac_sha256(sign_date.as_slice(), region.as_bytes());
    let sign_service = hmac_sha256(sign_region.as_slice(), service.as_bytes());
    hmac_sha256(sign_service.as_slice(), AWS4_TERMINATOR.as_bytes())
}

/// A derived signing key together with the UTC day it was derived for.
#[derive(Debug, Clone)]
pub struct SignerKey {
    key: Vec<u8>,
    days_since_epoch: i64,
}

impl SignerKey {
    /// Wrap a freshly derived key, recording the day it belongs to.
    pub fn new(key: Vec<u8>, time: DateTime) -> Self {
        Self {
            key,
            days_since_epoch: days_since_epoch(time),
        }
    }

    /// Whether this key may sign a request made at `time`.
    ///
    /// Keys never expire within their day; AWS scopes them to the UTC
    /// calendar date in the credential scope.
    pub fn is_valid_for(&self, time: DateTime) -> bool {
        days_since_epoch(time) == self.days_since_epoch
    }

    /// A copy of the key material.
    ///
    /// Callers receive their own buffer so cached bytes cannot be mutated
    /// through a returned reference.
    pub fn key(&self) -> Vec<u8> {
        self.key.clone()
    }
}

/// A bounded FIFO cache of signing keys, keyed by credential scope.
///
/// Eviction is strictly insertion-ordered: refreshing a key for a scope that
/// is already present does not move it to the back of the queue.
#[derive(Debug)]
pub struct SigningKeyCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, SignerKey>,
    order: VecDeque<String>,
}

impl SigningKeyCache {
    /// Create a cache holding at most `capacity` scopes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Look up the cached key for `scope`.
    pub fn get(&self, scope: &str) -> Option<SignerKey> {
        self.inner
            .lock()
            .expect("signing key cache poisoned")
            .entries
            .get(scope)
            .cloned()
    }

    /// Store a key for `scope`, evicting the oldest scope when full.
    ///
    /// Replacing an existing scope keeps its original position in the
    /// eviction queue.
    pub fn put(&self, scope: String, key: SignerKey) {
        let mut inner = self.inner.lock().expect("signing key cache poisoned");

        if inner.entries.insert(scope.clone(), key).is_none() {
            inner.order.push_back(scope);
            while inner.order.len() > self.capacity {
                if let Some(evicted) = inner.order.pop_front() {
                    inner.entries.remove(&evicted);
                }
            }
        }
    }

    /// Return the signing key for `scope` at `time`, deriving it with
    /// `generate` when absent or stale.
    pub fn get_or_derive(
        &self,
        scope: &str,
        time: DateTime,
        generate: impl FnOnce() -> Vec<u8>,
    ) -> Vec<u8> {
        if let Some(entry) = self.get(scope) {
            if entry.is_valid_for(time) {
                return entry.key();
            }
        }

        let key = generate();
        self.put(scope.to_string(), SignerKey::new(key.clone(), time));
        key
    }

    /// Number of scopes currently cached.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("signing key cache poisoned")
            .entries
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Signing key for `cred` from the process-wide cache, derived on miss.
pub(crate) fn cached_signing_key(
    cred: &Credential,
    time: DateTime,
    region: &str,
    service: &str,
) -> Vec<u8> {
    // Keyed on the secret so rotated credentials never reuse a stale key.
    let scope = format!("{}-{}-{}", cred.secret_access_key, region, service);
    SIGNING_KEY_CACHE.get_or_derive(&scope, time, || {
        generate_signing_key(&cred.secret_access_key, time, region, service)
    })
}
