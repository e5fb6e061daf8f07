pub mod events;
pub mod session;
pub mod store;

pub use events::{Notice, NoticeLevel, StoreEvent};
pub use session::{AUTO_TITLE_MAX_CHARS, ChatSession, title_from_content};
pub use store::{ChatState, ChatStore};
