//! Canonical cache key builders.
//!
//! Keys are namespaced by entity type and, where applicable, owner id.
//! Invalidation code and read paths must go through these so the two can
//! never disagree on a key.

/// Per-user booking list: `user:{id}:bookings`
pub fn user_bookings(owner_id: i64) -> String {
    format!("user:{}:bookings", owner_id)
}

/// Per-user profile: `user:{id}:profile`
pub fn user_profile(owner_id: i64) -> String {
    format!("user:{}:profile", owner_id)
}

/// Prefix covering every per-user entry for one owner
pub fn user_prefix(owner_id: i64) -> String {
    format!("user:{}:", owner_id)
}

/// Prefix covering every user's booking-list entries (bulk invalidation)
pub const ALL_USERS_PREFIX: &str = "user:";

/// Service catalog: `svc:catalog`
pub fn service_catalog() -> String {
    "svc:catalog".to_string()
}

/// Staff list: `staff:list`
pub fn staff_list() -> String {
    "staff:list".to_string()
}

/// Public reviews: `reviews:public`
pub fn public_reviews() -> String {
    "reviews:public".to_string()
}

/// Admin aggregate booking list: `admin:bookings`
pub fn admin_bookings() -> String {
    "admin:bookings".to_string()
}
