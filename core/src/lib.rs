//! Core components for signing API requests.
//!
//! This crate provides the foundational types and traits for the awssign
//! ecosystem. Service crates build concrete signers on top of it; the
//! `awssign-aws-v4` crate is the AWS SigV4 implementation.
//!
//! ## Overview
//!
//! The crate is built around several key concepts:
//!
//! - **Context**: A container holding the environment implementation used
//!   while resolving credentials
//! - **Traits**: Abstract interfaces for credential loading
//!   (`ProvideCredential`) and request signing (`SignRequest`)
//! - **Signer**: The orchestrator that coordinates credential loading and
//!   request signing
//!
//! ## Utilities
//!
//! - [`hash`]: SHA-256 and HMAC-SHA256 primitives
//! - [`time`]: signing-time formatting and the [`time::Clock`] collaborator
//! - [`utils`]: data redaction for logs

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod time;
pub mod utils;

mod context;
pub use context::{Context, Env, NoopEnv, OsEnv, StaticEnv};

mod error;
pub use error::{Error, ErrorKind, Result};

mod api;
pub use api::{ProvideCredential, SignRequest, SigningCredential};
mod request;
pub use request::SigningRequest;
mod signer;
pub use signer::Signer;
