/// Unit name constants to ensure consistency across the codebase.
/// These are the registry keys accepted by the CLI and the unit factory.
pub const JFR_UNIT: &str = "jfr";
pub const ENESCU_UNIT: &str = "enescu";
pub const ATENEUL_UNIT: &str = "ateneul";

// Qualified names reported by units; the orchestrator shortens them for error records
pub const JFR_QUALIFIED: &str = "scrapers.music.jfr";
pub const ENESCU_QUALIFIED: &str = "scrapers.music.enescu";
pub const ATENEUL_QUALIFIED: &str = "scrapers.music.ateneul";

// Source URLs
pub const JFR_URL: &str = "https://eventbook.ro/program/jazz-fan-rising";
pub const JFR_BASE_URL: &str = "https://eventbook.ro";
pub const ENESCU_BASE_URL: &str = "https://festivalenescu.ro";
pub const ENESCU_URL: &str = "https://festivalenescu.ro/ro/festivalul-george-enescu/concerte";
pub const ATENEUL_BASE_URL: &str = "https://oveit.com";
pub const ATENEUL_URL: &str = "https://oveit.com/hub/org/l7PDAr7y";

/// Get all registered unit names in registration order
pub fn get_supported_units() -> Vec<&'static str> {
    vec![JFR_UNIT, ENESCU_UNIT, ATENEUL_UNIT]
}

// Retry policy
pub const MAX_FETCH_ATTEMPTS: u32 = 3;
pub const BACKOFF_BASE_MS: u64 = 1_000;
pub const BACKOFF_MULTIPLIER: u32 = 2;
pub const BACKOFF_CAP_MS: u64 = 10_000;

/// Statuses the static path treats as transient
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

// Fetch defaults
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;
pub const MAX_REDIRECTS: usize = 10;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

// Interactive page driver
pub const SETTLE_WAIT_MS: u64 = 3_000;
pub const CLICK_WAIT_MS: u64 = 2_000;
pub const SCROLL_WAIT_MS: u64 = 2_000;
pub const CONVERGENCE_THRESHOLD: u32 = 3;

// Alerting
pub const ALERT_TRACE_LIMIT: usize = 1_500;
pub const DEFAULT_ALERT_FROM: &str = "GigRadar <alerts@gigradar.ro>";
pub const DEFAULT_RESEND_BASE_URL: &str = "https://api.resend.com";
pub const NOTIFY_EMAIL_VAR: &str = "NOTIFY_EMAIL";
pub const RESEND_API_KEY_VAR: &str = "RESEND_API_KEY";
