//! Request DTOs for the document-backed entities.
//!
//! Each submodule contains the `Deserialize` create/update DTOs accepted by
//! the API and consumed by the repositories and room services.

pub mod item;
pub mod room;
pub mod shelf;
