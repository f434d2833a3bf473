pub mod multipart;
pub mod reference_cache;
