pub mod price;
pub mod product;
pub mod rate;

pub use price::*;
pub use product::*;
pub use rate::*;

/// Source tag for rates fetched live from dolarapi.com
pub const RATE_SOURCE_DOLARAPI: &str = "dolarapi";
