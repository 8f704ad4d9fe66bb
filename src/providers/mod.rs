pub mod caching;
pub mod exchange_rate;
pub mod util;
