//! Typed access to the registration backend.
//!
//! [`Gateway`] is the seam both state machines depend on; [`HttpGateway`] is
//! the production implementation. The gateway packages failures and never
//! interprets them: a `success: false` body on a 2xx is returned as data, a
//! non-2xx status (or a body that is not JSON) is an [`ApiError`].

mod endpoints;
mod error;
mod http;
pub mod normalize;
mod types;

pub use endpoints::Endpoints;
pub use error::ApiError;
pub use http::HttpGateway;
pub use types::{
    Acknowledgement, Activity, LoginOutcome, Lookup, ParticipantRecord, Stats, Update,
    VerifyOutcome,
};

use secrecy::SecretString;
use std::future::Future;

pub trait Gateway: Send + Sync {
    /// Password step.
    fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> impl Future<Output = Result<LoginOutcome, ApiError>> + Send;

    /// Asks the backend to deliver a 6-digit code to the user's phone.
    fn request_code(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Acknowledgement, ApiError>> + Send;

    fn verify_code(
        &self,
        user_id: &str,
        code: &str,
    ) -> impl Future<Output = Result<VerifyOutcome, ApiError>> + Send;

    fn activities(&self) -> impl Future<Output = Result<Vec<Activity>, ApiError>> + Send;

    /// Cheap authenticated call used to validate a stored token.
    fn probe(&self) -> impl Future<Output = Result<(), ApiError>> + Send {
        async move { self.activities().await.map(|_| ()) }
    }

    fn find_participant(
        &self,
        id: &str,
        collection: Option<&str>,
    ) -> impl Future<Output = Result<Lookup, ApiError>> + Send;

    fn set_attendance(
        &self,
        id: &str,
        collection: &str,
        attended: bool,
    ) -> impl Future<Output = Result<Acknowledgement, ApiError>> + Send;

    fn registrations(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<Vec<ParticipantRecord>, ApiError>> + Send;

    fn stats(&self, collection: &str) -> impl Future<Output = Result<Stats, ApiError>> + Send;

    /// Changes to `collection` after `since` (milliseconds since the epoch).
    fn updates(
        &self,
        collection: &str,
        since: u64,
    ) -> impl Future<Output = Result<Vec<Update>, ApiError>> + Send;
}
