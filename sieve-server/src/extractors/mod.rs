mod auth;
mod params;

pub use self::auth::*;
pub use self::params::*;
