// Order sizing, bracket planning and order submission
pub mod bracket;
pub mod normalizer;
pub mod orchestrator;

pub use bracket::{
    calculate_percentage_change, calculate_price_with_percentage, percentage_to_multiplier,
    should_reprice, BracketPolicy,
};
pub use normalizer::{adjust_to_lot_size, adjust_to_tick_size, validate_notional};
pub use orchestrator::OrderOrchestrator;
