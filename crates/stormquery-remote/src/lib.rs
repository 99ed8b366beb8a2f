pub mod assemble;
pub mod call;
pub mod client;
pub mod executor;
pub mod geometry;
pub mod mem;
pub mod metrics;
pub mod service;
pub mod traits;
pub mod vocab;

pub use client::ArcGisClient;
pub use mem::InMemoryFeatureService;
pub use service::FeatureQueryService;
pub use traits::*;
pub use vocab::{Clock, ManualClock, SystemClock, VocabularyCache};
