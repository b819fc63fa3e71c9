//! OAuth2 token service collaborator (§1, §4.8, §6): `client_credentials`
//! and `refresh_token` grants backed by a persistent token store. The core
//! only consumes `verify(bearer) -> {clientId} | expired | invalid`; this
//! module also owns the token-issuance HTTP handler and the store contract
//! because, unlike the DB gateway, the spec pins the exact store schema and
//! grant semantics (§4.8, §6) rather than treating it as a black box.

pub mod middleware;
pub mod oauth;
pub mod store;
pub mod sweeper;

pub use middleware::AuthenticatedClient;
pub use store::{PgTokenStore, TokenStore};
