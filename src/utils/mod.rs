pub mod exchange_rate;
pub mod http;
