//! Quest acceptance validation: ordered core checks, pluggable extended
//! requirement checks and a short-lived result cache.

pub mod cache;
pub mod checks;
pub mod extended;
pub mod validator;

pub use cache::{CacheKey, ValidationCache};
pub use checks::{CheckKind, CheckRecord, CheckState, PlayerProfile, PlayerSnapshot, ValidationResult};
pub use extended::{
    BadgeCheck, InventoryCheck, PartySizeCheck, RegionCheck, RequirementCheck, TemporalCheck,
};
pub use validator::Validator;
