//! Services implementing the authentication pipeline.
//!
//! Each service coordinates between the repository layer and the
//! application. The login pipeline is an explicit, sequential composition
//! (rate limit → verify → record → classify → issue) rather than
//! persistence-layer callbacks, so ordering and atomicity stay visible and
//! testable.

pub mod audit;
pub mod classifier;
pub mod login;
pub mod rate_limit;
pub mod recorder;
pub mod token;

pub use audit::{AuditReport, AuditService};
pub use classifier::{AbuseClassifier, GeoResolver, NoopGeoResolver};
pub use login::{LoginService, LoginSuccess, Registration};
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use recorder::AttemptRecorder;
pub use token::{RefreshedSession, TokenService};

#[cfg(test)]
pub(crate) mod support;
