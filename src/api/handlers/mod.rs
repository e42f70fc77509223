pub mod admin;
pub mod announcements;
pub mod root;
