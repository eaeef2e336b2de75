//! Metric keys emitted by the authentication pipeline

/// Queued `track` calls that failed and were discarded
pub const TRACK_FAILED_COUNTER: &str = "smart_account_track_failed_total";

/// Wall time of the pre-execution authentication pass
pub const AUTHENTICATE_DURATION_HISTOGRAM: &str = "smart_account_authenticate_duration_seconds";

/// Wall time of the post-execution confirmation pass
pub const POST_CONFIRM_DURATION_HISTOGRAM: &str = "smart_account_post_confirm_duration_seconds";

/// Transactions routed to the legacy pipeline
pub const LEGACY_ROUTE_COUNTER: &str = "smart_account_legacy_route_total";

/// Transactions rejected because the unauthenticated gas ceiling was hit
pub const RESOURCE_EXHAUSTED_COUNTER: &str = "smart_account_resource_exhausted_total";
