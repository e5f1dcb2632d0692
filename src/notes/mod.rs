mod history;
mod models;

pub use history::NavigationHistory;
pub use models::*;
