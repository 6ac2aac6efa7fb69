//! Schema-driven record forms.

pub mod builder;
pub mod type_family;

pub use builder::{FieldDefault, FormError, FormField, FormMode, build_form, payload_from_submission, row_map};
pub use type_family::{TypeFamily, classify};
