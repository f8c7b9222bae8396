//! # drivekit – Google Drive convenience wrapper
//!
//! Verb-level access to the Google Drive API v3 for transfer automation:
//! upload, clone, move, delete, share, and search, with quota-aware retries
//! and service-identity rotation underneath every call.
//!
//! ## Features
//!
//! - **Credentials** – bearer tokens, authorized-user blobs (refresh-token
//!   grant), service-account keys, and pooled identities rotated when a
//!   quota bucket runs dry
//! - **Resilient calls** – exponential backoff on rate limits, bounded
//!   attempt ceilings, attempt counts surfaced on errors
//! - **Tree replication** – recursive directory upload and remote subtree
//!   cloning with best-effort per-child failure handling
//! - **Resumable uploads** – chunked transfers with progress reporting,
//!   metadata-only creates for empty files
//! - **Sharing** – anyone-with-the-link permissions, share URLs derived
//!   without a network round trip
//! - **Search** – escaped name queries, most recently modified first
//!
//! The [`session::Session`] façade ties these together for one
//! authenticated actor.

pub mod types;
pub mod client;
pub mod auth;
pub mod links;
pub mod files;
pub mod folders;
pub mod uploads;
pub mod sharing;
pub mod search;
pub mod tree;
pub mod session;
