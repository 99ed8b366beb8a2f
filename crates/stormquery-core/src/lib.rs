pub mod builder;
pub mod config;
pub mod errors;
pub mod model;
pub mod predicate;
pub mod query;
pub mod resolve;
pub mod util;

pub use builder::*;
pub use config::*;
pub use errors::*;
pub use model::*;
pub use predicate::*;
pub use query::*;
