//! Vouchsafe API constants
//!
//! Endpoint bases, settings/cache keys, and the timing parameters for the
//! token and flow caches.

use std::time::Duration;

/// Default REST API base (all endpoint paths are appended to this)
pub const API_BASE: &str = "https://app.vouchsafe.id/api/v1";

/// Default dashboard base used for admin deep links
pub const DASHBOARD_BASE: &str = "https://app.vouchsafe.id";

/// Settings key holding the persisted credentials object
pub const CREDENTIALS_KEY: &str = "vouchsafe_credentials";

/// Cache key for the bearer token
pub const TOKEN_CACHE_KEY: &str = "vouchsafe_access_token";

/// Cache key for the flow list shown to admins
pub const FLOWS_CACHE_KEY: &str = "vouchsafe_flows";

/// Tokens are treated as expired this long before the server-side expiry.
pub const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(300);

/// The token cache entry never gets a shorter TTL than this.
pub const MIN_TOKEN_CACHE_TTL: Duration = Duration::from_secs(60);

/// Assumed server-side lifetime when `expires_at` can't be parsed.
pub const FALLBACK_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// How long a successful connection test keeps the flow list around.
pub const FLOWS_CACHE_TTL: Duration = Duration::from_secs(600);

/// Timeout for `/authenticate` and list calls
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for creating a verification
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
