//! Flutter bridge crate for the allergy diary core.

pub mod api;
