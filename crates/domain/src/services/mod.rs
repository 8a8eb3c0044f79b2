//! Pure business rules shared by the engine and its read models.

pub mod progression;

pub use progression::{
    evaluate_advancement, level_after_full_group, recompute_level, AdvancementDecision,
    OwnedGroupProgress, GROUP_CAPACITY, MAX_GROUP_NUMBER, MAX_LEVEL,
};
