//! Domain model structs and DTOs.
//!
//! - `FromRow` + `Serialize` entity structs matching database rows
//! - `Deserialize` request DTOs validated before insert

pub mod generation;
pub mod status;
