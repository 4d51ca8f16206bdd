// facsimile-derive: derive macros for facsimile's static deep clone
//
// Provides:
// - #[derive(DeepClone)] - Field-by-field fallible deep copy
// - #[derive(DeclaredFields)] - Compile-time field metadata per declaring type
//
// Example:
// ```
// use facsimile::{DeclaredFields, DeepClone};
//
// #[derive(DeepClone, DeclaredFields)]
// struct Base {
//     items: Rc<RefCell<Vec<u32>>>,
// }
//
// #[derive(DeepClone, DeclaredFields)]
// struct Derived {
//     #[deep_clone(parent)]
//     base: Base,
//     #[deep_clone(shallow)]
//     label: Arc<str>,
// }
// ```

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod attrs;
mod declared_fields;
mod deep_clone;

/// Derives `facsimile::DeepClone`.
///
/// Every field is copied with `DeepClone::deep_clone`, except:
/// - `#[deep_clone(shallow)]` fields, copied with `Clone::clone`
/// - the `#[deep_clone(parent)]` field, the embedded base, which is copied
///   before any other field
///
/// The first failing field aborts the copy.
///
/// # Example
///
/// ```ignore
/// #[derive(DeepClone)]
/// struct Session {
///     #[deep_clone(parent)]
///     base: Connection,
///     buffer: Rc<RefCell<Vec<u8>>>,
///     #[deep_clone(shallow)]
///     config: Arc<Config>,
/// }
/// ```
#[proc_macro_derive(DeepClone, attributes(deep_clone))]
pub fn derive_deep_clone(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    deep_clone::expand_deep_clone(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derives `facsimile::DeclaredFields` for a struct with named fields.
///
/// `OWN_FIELDS` lists every field except the `#[deep_clone(parent)]` one;
/// `fields()` appends the parent's fields after the struct's own.
#[proc_macro_derive(DeclaredFields, attributes(deep_clone))]
pub fn derive_declared_fields(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    declared_fields::expand_declared_fields(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
