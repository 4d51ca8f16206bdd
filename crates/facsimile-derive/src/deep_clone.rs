// #[derive(DeepClone)] implementation
//
// Copies each field into a local binding (parent first, then declaration
// order) and rebuilds the value from those bindings.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_quote, Data, DataEnum, DeriveInput, Fields, Ident, Index, Member, Result};

use crate::attrs::{all_field_options, FieldOptions};

/// Expands #[derive(DeepClone)].
///
/// Example expansion:
/// ```ignore
/// // Input:
/// #[derive(DeepClone)]
/// struct Derived {
///     label: String,
///     #[deep_clone(parent)]
///     base: Base,
/// }
///
/// // Output:
/// impl ::facsimile::DeepClone for Derived {
///     fn deep_clone(&self) -> ::facsimile::FacsimileResult<Self> {
///         let __field_1 = ::facsimile::DeepClone::deep_clone(&self.base)?;
///         let __field_0 = ::facsimile::DeepClone::deep_clone(&self.label)?;
///         ::core::result::Result::Ok(Self { label: __field_0, base: __field_1 })
///     }
/// }
/// ```
pub fn expand_deep_clone(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(::facsimile::DeepClone));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(data) => {
            let sources: Vec<TokenStream> = data
                .fields
                .iter()
                .enumerate()
                .map(|(i, field)| {
                    let member = member(i, field.ident.as_ref());
                    quote! { &self.#member }
                })
                .collect();
            rebuild(&data.fields, &sources, quote! { Self })?
        }
        Data::Enum(data) => clone_enum(data)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                name,
                "DeepClone cannot be derived for unions",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics ::facsimile::DeepClone for #name #ty_generics #where_clause {
            fn deep_clone(&self) -> ::facsimile::FacsimileResult<Self> {
                #body
            }
        }
    })
}

fn clone_enum(data: &DataEnum) -> Result<TokenStream> {
    let mut arms = Vec::with_capacity(data.variants.len());

    for variant in &data.variants {
        let ident = &variant.ident;
        let bindings: Vec<Ident> = (0..variant.fields.len())
            .map(|i| format_ident!("__self_{}", i))
            .collect();
        let sources: Vec<TokenStream> = bindings.iter().map(|b| quote! { #b }).collect();

        let pattern = match &variant.fields {
            Fields::Named(named) => {
                let names = named.named.iter().map(|f| &f.ident);
                quote! { Self::#ident { #(#names: #bindings),* } }
            }
            Fields::Unnamed(_) => quote! { Self::#ident ( #(#bindings),* ) },
            Fields::Unit => quote! { Self::#ident },
        };
        let body = rebuild(&variant.fields, &sources, quote! { Self::#ident })?;
        arms.push(quote! { #pattern => { #body } });
    }

    if arms.is_empty() {
        return Ok(quote! { match *self {} });
    }

    Ok(quote! {
        match self {
            #(#arms)*
        }
    })
}

/// Copies every field from `sources` (expressions yielding `&FieldType`)
/// and rebuilds the value with `path`.
fn rebuild(fields: &Fields, sources: &[TokenStream], path: TokenStream) -> Result<TokenStream> {
    let options = all_field_options(fields)?;
    let targets: Vec<Ident> = (0..fields.len())
        .map(|i| format_ident!("__field_{}", i))
        .collect();

    // Parent first, then declaration order
    let mut order: Vec<usize> = (0..fields.len()).collect();
    order.sort_by_key(|&i| !options[i].parent);

    let copies = order.iter().map(|&i| {
        let target = &targets[i];
        let expr = copy_expr(options[i], &sources[i]);
        quote! { let #target = #expr; }
    });

    let constructor = match fields {
        Fields::Named(named) => {
            let names = named.named.iter().map(|f| &f.ident);
            quote! { #path { #(#names: #targets),* } }
        }
        Fields::Unnamed(_) => quote! { #path ( #(#targets),* ) },
        Fields::Unit => quote! { #path },
    };

    Ok(quote! {
        #(#copies)*
        ::core::result::Result::Ok(#constructor)
    })
}

fn copy_expr(options: FieldOptions, source: &TokenStream) -> TokenStream {
    if options.shallow {
        quote! { ::core::clone::Clone::clone(#source) }
    } else {
        quote! { ::facsimile::DeepClone::deep_clone(#source)? }
    }
}

fn member(index: usize, ident: Option<&Ident>) -> Member {
    match ident {
        Some(ident) => Member::Named(ident.clone()),
        None => Member::Unnamed(Index::from(index)),
    }
}
