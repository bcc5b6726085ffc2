//! # Asilo (Authentication & Session Core)
//!
//! `asilo` turns a presented credential into a validated session for a
//! multi-tenant anonymous-reporting service. Several classes of principals
//! (admins, reviewers, custodians, and anonymous submitters identified only
//! by a secret receipt code) establish identity over an untrusted network.
//!
//! ## Tenant Model
//!
//! Tenants are isolated logical instances sharing one deployment. Principals
//! and policy are scoped per tenant; a principal may be associated with
//! several tenants, and principals of the primary tenant implicitly reach
//! every tenant.
//!
//! ## Timing Defense
//!
//! A process-wide failed-attempt counter drives an escalating pre-verification
//! delay, and every login-family response consumes a uniform floor latency so
//! fast rejections and slow verifications are indistinguishable on the wire.
//!
//! ## Sessions & Key Recovery
//!
//! Session identifiers are 32 random bytes and double as bearer secrets. The
//! login credential also derives the symmetric key that opens the identity's
//! at-rest encrypted private key; the decrypted material lives only in memory,
//! attached to the session, and is exposed exactly once, in the response that
//! created or refreshed the session.
//!
//! Storage, routing, rendering and mail delivery are external collaborators
//! consumed through the narrow contracts in [`directory`].

pub mod config;
pub mod directory;
pub mod error;
pub mod hashing;
pub mod keys;
pub mod login;
pub mod policy;
pub mod session;
pub mod timing;
pub mod two_factor;
pub mod types;
pub mod verifier;
