//! Remote catalog transports.
//!
//! The enricher only sees the [`CatalogProvider`] trait; the concrete
//! services (the AniList GraphQL catalog and the Chinese-title fallback
//! chain behind it) live in the submodules.

mod anilist;
mod chinese;
mod traits;

pub use anilist::AniListProvider;
pub use chinese::{ChineseTitleResolver, ChineseTitleSource};
pub use traits::{CatalogProvider, CatalogRecord, ProviderError};

/// User agent sent with every outbound catalog request.
pub const USER_AGENT: &str = concat!(
    "mediarack/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/mediarack/mediarack)"
);
