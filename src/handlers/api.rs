pub const SERVICE_BANNER: &str = "Voice Call Gateway is running";

/// Service banner
pub async fn banner() -> &'static str {
    SERVICE_BANNER
}

/// Liveness probe
pub async fn health_check() -> &'static str {
    "Healthy"
}
