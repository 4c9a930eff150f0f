//! Persisted key layout.
//!
//! Three disjoint namespaces share one backend: the end-user session (which
//! also owns the user record and its mirror fields), the administrator
//! session and the customer-service session.

/// Bearer token of the end-user session.
pub const AUTH_TOKEN: &str = "traderedge_auth_token";
/// Serialized `UserData` record.
pub const USER_DATA: &str = "traderedge_user_data";
/// Last time the user token was issued or refreshed.
pub const AUTH_TIMESTAMP: &str = "traderedge_auth_timestamp";
/// "true" while a user session is established.
pub const USER_AUTHENTICATED: &str = "traderedge_authenticated";
/// Time the user session was established.
pub const USER_LOGIN_TIME: &str = "traderedge_login_time";
/// Mirror of `UserData.plan`.
pub const MIRROR_PLAN: &str = "traderedge_user_plan";
/// Mirror of `UserData.userId`.
pub const MIRROR_USER_ID: &str = "traderedge_user_id";
/// Mirror of `UserData.email`.
pub const MIRROR_EMAIL: &str = "traderedge_user_email";

/// Keys written by a plain `save` of the user record.
pub const RECORD_KEYS: [&str; 4] = [USER_DATA, MIRROR_PLAN, MIRROR_USER_ID, MIRROR_EMAIL];

/// Keys owned by the store itself and purged by `clear`.
pub const STORE_OWNED_KEYS: [&str; 6] = [
    USER_DATA,
    MIRROR_PLAN,
    MIRROR_USER_ID,
    MIRROR_EMAIL,
    AUTH_TOKEN,
    AUTH_TIMESTAMP,
];

/// Key layout of a PIN-authenticated staff session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaffKeys {
    pub token: &'static str,
    pub username: &'static str,
    pub user_type: &'static str,
    pub login_time: &'static str,
    pub refresh_time: &'static str,
    pub authenticated: &'static str,
}

impl StaffKeys {
    /// All keys of the namespace, for logout.
    pub fn all(&self) -> [&'static str; 6] {
        [
            self.token,
            self.username,
            self.user_type,
            self.login_time,
            self.refresh_time,
            self.authenticated,
        ]
    }
}

/// Administrator namespace.
pub const ADMIN: StaffKeys = StaffKeys {
    token: "admin_token",
    username: "admin_username",
    user_type: "admin_user_type",
    login_time: "admin_login_time",
    refresh_time: "admin_refresh_time",
    authenticated: "admin_authenticated",
};

/// Customer-service namespace.
pub const CUSTOMER_SERVICE: StaffKeys = StaffKeys {
    token: "cs_token",
    username: "cs_username",
    user_type: "cs_user_type",
    login_time: "cs_login_time",
    refresh_time: "cs_refresh_time",
    authenticated: "cs_authenticated",
};

/// Namespace a persisted key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    User,
    Admin,
    CustomerService,
}

impl Namespace {
    /// Classify a key; `None` for keys outside the session namespaces.
    pub fn of_key(key: &str) -> Option<Self> {
        if key.starts_with("traderedge_") {
            Some(Namespace::User)
        } else if key.starts_with("admin_") {
            Some(Namespace::Admin)
        } else if key.starts_with("cs_") {
            Some(Namespace::CustomerService)
        } else {
            None
        }
    }
}
