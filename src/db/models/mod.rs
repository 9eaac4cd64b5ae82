pub mod history;

pub use history::{ActionType, HistoryEntry, HistoryStatus};
