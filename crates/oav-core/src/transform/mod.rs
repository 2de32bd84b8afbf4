//! Rewrites resolved OpenAPI constructs into the canonical schema tree.

pub mod content_type;
mod discriminator;
pub mod parameters;
pub mod path_key;
mod schema_normalizer;

pub use content_type::match_media_type;
pub use path_key::path_key;
pub use schema_normalizer::Normalizer;
