pub mod combination;
pub mod counts;

pub use combination::{Combination, Dungeon};
pub use counts::EntityCounts;
