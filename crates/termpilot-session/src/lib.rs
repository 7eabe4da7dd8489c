pub mod history;
pub mod session;
pub mod store;

pub use history::HistoryStore;
pub use session::{SessionInfo, SessionRecord, SessionStats};
pub use store::FileSessionStore;
