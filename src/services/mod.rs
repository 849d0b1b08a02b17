//! External collaborators of the engine: instrument catalog, favorites,
//! notification sinks and the market stream.

pub mod catalog;
pub mod favorites;
pub mod notifier;
pub mod stream;
pub mod telegram;

pub use catalog::{BybitCatalogClient, InstrumentCatalog};
pub use favorites::{FavoritesResolver, StaticFavorites};
pub use notifier::{LogNotifier, Notifier};
pub use telegram::TelegramNotifier;
