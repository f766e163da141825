pub mod logger;

pub use logger::{record, ActionLog};
