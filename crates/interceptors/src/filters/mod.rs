pub mod authorization;
pub mod caching;
pub mod logging;

pub use authorization::AuthorizationFilter;
pub use caching::CachingHintFilter;
pub use logging::LoggingFilter;
