// SPDX-License-Identifier: MIT

//! Forms with derived and prefilled fields
//!
//! This module provides:
//! - `FieldDefinition` - the shape of one field, optionally derived or prefilled
//! - `FormState` - current values, recomputing derived fields on every edit

mod schema;
mod store;

pub use schema::{DerivedSpec, FieldDefinition, FieldType, FormDefinition, PrefillSpec};
pub use store::FormState;
