//! Google adapter: service-account token minting and the Drive upload endpoints.

pub mod auth;
pub mod drive;

pub use auth::TokenMinter;
pub use drive::DriveClient;
