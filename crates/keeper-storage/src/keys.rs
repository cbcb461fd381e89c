//! Storage key constants.

/// Storage keys used for the primary session
pub struct StorageKeys;

impl StorageKeys {
    /// Access token
    pub const SESSION_ACCESS_TOKEN: &'static str = "session_access_token";

    /// Refresh token
    pub const SESSION_REFRESH_TOKEN: &'static str = "session_refresh_token";

    /// Session metadata (JSON)
    pub const SESSION_META: &'static str = "session_meta";

    /// Every key the primary session occupies.
    pub const ALL_SESSION_KEYS: [&'static str; 3] = [
        Self::SESSION_ACCESS_TOKEN,
        Self::SESSION_REFRESH_TOKEN,
        Self::SESSION_META,
    ];
}
