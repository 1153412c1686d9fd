//! Repository traits for metadata operations.

pub mod sessions;
pub mod songs;

pub use sessions::SessionRepo;
pub use songs::SongRepo;
