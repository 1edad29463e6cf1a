//! Video Library Module
//! Mission: Store short clips with tags, likes and comments

pub mod api;
pub mod models;
pub mod store;

pub use api::VideoState;
pub use store::VideoStore;
