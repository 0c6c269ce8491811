//! Read entities definitions.

pub mod note;
