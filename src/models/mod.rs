pub mod event;
pub mod file;
pub mod link;

pub use event::ClickEvent;
pub use file::{FileKind, NewFile, StoredFile};
pub use link::{CreateLinkRequest, ExpiresIn, ShortLink};
