//! Feed-side helpers.

pub mod seen;

pub use seen::SeenNotesFilter;
