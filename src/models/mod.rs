//! Data models: thumbnail metadata records, upload notifications, and the
//! local object store's object metadata.

pub mod event;
pub mod object;
pub mod thumbnail;
