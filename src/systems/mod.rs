mod behavior;
mod bookkeeping;
mod construction;
mod disaster;
mod economy;
mod environment;
mod population;

pub use behavior::BehaviorSystem;
pub use bookkeeping::BookkeepingSystem;
pub use construction::ConstructionSystem;
pub use disaster::DisasterSystem;
pub use economy::{compute_needs, EconomySystem};
pub use environment::EnvironmentSystem;
pub use population::{mutate_stats, PopulationSystem};
pub(crate) use population::sanitize_stats;
