//! Earshot Callouts - Callout history
//!
//! A small bounded record of recently spoken callouts, trimmed by age and by
//! distance from the user, used to avoid announcing the same thing twice.

pub mod history;

pub use history::CalloutHistory;
