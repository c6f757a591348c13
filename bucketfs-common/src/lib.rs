pub mod backend;
pub mod content;
pub mod keys;
