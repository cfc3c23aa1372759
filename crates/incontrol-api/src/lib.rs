// incontrol-api: Async Rust client for the Peplink InControl2 API
//
// Two surfaces share one transport: the OAuth2 authorization-code flow
// (`OAuthClient`) and the bearer-authenticated REST tree under `/rest/`
// (`ApiConnection`). Everything above raw HTTP lives in `incontrol-core`.

pub mod connection;
pub mod error;
pub mod models;
pub mod oauth;
pub mod resources;
pub mod transport;

pub use connection::{ApiConnection, DEFAULT_RETRIES};
pub use error::Error;
pub use models::{
    DataEnvelope, DeviceMetadata, DeviceSummary, GroupRecord, LocationFix, OrgRecord, ResourceId,
    WanInterface,
};
pub use oauth::{OAuthClient, REFRESH_MARGIN_SECS, TokenRecord};
pub use transport::TransportConfig;

/// Base URL of the InControl2 REST tree.
pub const API_ENDPOINT: &str = "https://api.ic.peplink.com/rest/";

/// OAuth2 authorization endpoint (user-facing consent page).
pub const OAUTH_AUTHORIZE_URL: &str = "https://api.ic.peplink.com/api/oauth2/auth";

/// OAuth2 token endpoint (code exchange and refresh).
pub const OAUTH_TOKEN_URL: &str = "https://api.ic.peplink.com/api/oauth2/token";
