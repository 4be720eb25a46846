use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub app_url: String,
    pub auth_url: String,
    pub auth_api_key: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub currency: String,
    pub webhook_tolerance_secs: i64,
    /// When set, a successful payment also confirms a PENDING booking.
    pub auto_confirm_on_payment: bool,
    pub completion_sweep_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "huntstay.db".to_string()),
            app_url: env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            auth_url: env::var("AUTH_URL").unwrap_or_default(),
            auth_api_key: env::var("AUTH_API_KEY").unwrap_or_default(),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "eur".to_string()),
            webhook_tolerance_secs: env::var("WEBHOOK_TOLERANCE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            auto_confirm_on_payment: env::var("AUTO_CONFIRM_ON_PAYMENT")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            completion_sweep_secs: env::var("COMPLETION_SWEEP_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        }
    }
}
