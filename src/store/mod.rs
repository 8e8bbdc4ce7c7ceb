//! Concurrent in-memory stores.
//!
//! Every store guards its own map with a `tokio::sync::RwLock` and never
//! exposes the map itself. Clones of a store share the same data.

/// Registered users.
pub mod user;

/// Laptop catalog and search.
pub mod laptop;

/// Laptop ratings.
pub mod rating;

/// Uploaded images.
pub mod image;

pub use image::{DiskImageStore, ImageAssembler, ImageInfo, MAX_IMAGE_SIZE};
pub use laptop::{is_qualified, memory_bits, LaptopStore};
pub use rating::{Rating, RatingStore};
pub use user::{User, UserStore};
