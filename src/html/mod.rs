//! HTML post-processing stages.
//!
//! Each stage takes the owned [`Document`](crate::dom::Document) by `&mut`
//! and edits it in place; the string-level passes in [`finalize`] run after
//! serialization.

pub mod attrs;
pub mod finalize;
pub mod head;
pub mod inline;
pub mod unused;
