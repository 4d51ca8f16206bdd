// #[deep_clone(...)] field attribute parsing

use syn::{Field, Fields, Result};

/// Options attached to one field
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldOptions {
    /// Embedded base: copied first, and the link DeclaredFields follows
    pub parent: bool,
    /// Copy with `Clone` instead of `DeepClone`
    pub shallow: bool,
}

/// Parses the `#[deep_clone(...)]` attributes of a field.
pub fn field_options(field: &Field) -> Result<FieldOptions> {
    let mut options = FieldOptions::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("deep_clone") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("parent") {
                options.parent = true;
                Ok(())
            } else if meta.path.is_ident("shallow") {
                options.shallow = true;
                Ok(())
            } else {
                Err(meta.error("expected `parent` or `shallow`"))
            }
        })?;
    }

    if options.parent && options.shallow {
        return Err(syn::Error::new_spanned(
            field,
            "a field cannot be both `parent` and `shallow`",
        ));
    }

    Ok(options)
}

/// Parses every field of a struct or variant, rejecting more than one parent.
pub fn all_field_options(fields: &Fields) -> Result<Vec<FieldOptions>> {
    let mut seen_parent = false;
    let mut all = Vec::with_capacity(fields.len());

    for field in fields {
        let options = field_options(field)?;
        if options.parent {
            if seen_parent {
                return Err(syn::Error::new_spanned(
                    field,
                    "only one field can be marked `#[deep_clone(parent)]`",
                ));
            }
            seen_parent = true;
        }
        all.push(options);
    }

    Ok(all)
}
