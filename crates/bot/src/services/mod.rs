pub mod rate_limiter;
pub mod telegram_service;
