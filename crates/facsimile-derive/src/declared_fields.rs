// #[derive(DeclaredFields)] implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DataStruct, DeriveInput, Fields, Result};

use crate::attrs::all_field_options;

/// Expands #[derive(DeclaredFields)].
///
/// Example expansion:
/// ```ignore
/// // Input:
/// #[derive(DeclaredFields)]
/// struct Derived {
///     #[deep_clone(parent)]
///     base: Base,
///     label: String,
/// }
///
/// // Output:
/// impl ::facsimile::DeclaredFields for Derived {
///     const CLASS_NAME: &'static str = "Derived";
///     const OWN_FIELDS: &'static [&'static str] = &["label"];
///
///     fn fields() -> ::std::vec::Vec<::facsimile::StaticField> {
///         let mut fields = <Self as ::facsimile::DeclaredFields>::own_fields();
///         fields.extend(<Base as ::facsimile::DeclaredFields>::fields());
///         fields
///     }
/// }
/// ```
pub fn expand_declared_fields(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(DataStruct {
            fields: fields @ Fields::Named(_),
            ..
        }) => fields,
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "DeclaredFields can only be derived for structs with named fields",
            ))
        }
    };

    let options = all_field_options(fields)?;
    let mut own = Vec::new();
    let mut parent = None;

    for (field, options) in fields.iter().zip(options) {
        if options.parent {
            parent = Some(&field.ty);
        } else if let Some(ident) = &field.ident {
            own.push(ident.unraw().to_string());
        }
    }

    let class_name = name.unraw().to_string();
    let fields_fn = parent.map(|parent| {
        quote! {
            fn fields() -> ::std::vec::Vec<::facsimile::StaticField> {
                let mut fields = <Self as ::facsimile::DeclaredFields>::own_fields();
                fields.extend(<#parent as ::facsimile::DeclaredFields>::fields());
                fields
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::facsimile::DeclaredFields for #name #ty_generics #where_clause {
            const CLASS_NAME: &'static str = #class_name;
            const OWN_FIELDS: &'static [&'static str] = &[#(#own),*];
            #fields_fn
        }
    })
}
