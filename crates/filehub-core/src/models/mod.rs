pub mod file;
pub mod listing;
pub mod user;

pub use file::{FileCategory, FileMetadataDto, FileRecord, NewFileRecord};
pub use listing::{FileEntry, ListPage, ListQuery, SortDirection, SortField, SortSpec};
pub use user::{NewUser, User};
