//! Server-rendered chat UI (maud + htmx).

pub mod analysis;
pub mod chat;
pub mod layout;

pub use layout::page;
