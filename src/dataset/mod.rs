pub mod loader;
pub mod store;
pub mod trainset;
pub mod types;

pub use loader::{load_path, load_reader};
pub use store::RatingStore;
pub use trainset::{InnerId, TrainSet};
pub use types::{ItemId, Rating, RatingScale, Score, UserId};
