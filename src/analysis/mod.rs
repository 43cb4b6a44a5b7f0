//! Read-only analyses over a [`crate::syntax::SourceTree`].
//!
//! - [`BindingIndex`] - declared names with their references and reassignments
//! - [`find_declaration`] / [`find_declaration_by_name`] - standalone declaration statements
//! - [`try_safe_delete`] - removes a binding once it is provably unused
//! - [`Fingerprint`] - ordered fragment matching over printed code
//! - [`is_pure`] and friends - side-effect and literal predicates
//!
//! Everything here except the liveness helpers only reads the tree.

mod bindings;
mod declarations;
mod fingerprint;
mod liveness;
mod purity;

pub use bindings::{
    Binding, BindingIndex, ConstantViolation, DeclarationKind, FunctionFrame, Reference,
    ReferenceRole, ViolationKind,
};
pub use declarations::{find_declaration, find_declaration_by_name, DeclarationSite};
pub use fingerprint::Fingerprint;
pub use liveness::{try_safe_delete, try_safe_delete_all};
pub use purity::{
    index_value, is_literal, is_literal_composite, is_pure, js_number_key, number_value,
    prop_name_key, static_member_key, string_value,
};
