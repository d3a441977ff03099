use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use std::collections::HashSet;
use syn::ext::IdentExt;
use syn::{
    Data, DeriveInput, Fields, Ident, LitStr, Type, Visibility, parse_macro_input,
    spanned::Spanned,
};

#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct EntityOptions {
    name: Option<String>,
}

#[derive(Default)]
struct FieldOptions {
    key: bool,
    skip: bool,
    rename: Option<String>,
}

fn expand_entity(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Entity does not support generic structs",
        ));
    }

    let options = parse_entity_options(&input.attrs)?;

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Entity can only be derived for structs",
            ));
        }
    };

    let fields: Vec<syn::Field> = match data_struct.fields {
        Fields::Named(fields) => fields.named.into_iter().collect(),
        Fields::Unit => Vec::new(),
        Fields::Unnamed(_) => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Entity requires named fields",
            ));
        }
    };

    let mut key_field: Option<Ident> = None;
    let mut stored_names = HashSet::new();
    let mut descriptors = Vec::new();

    for field in fields {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Entity requires named fields"))?;
        let field_options = parse_field_options(&field.attrs)?;

        if field_options.key {
            if key_field.is_some() {
                return Err(syn::Error::new(
                    field.span(),
                    "#[entity(key)] can only be set on one field",
                ));
            }
            if !is_string(&field.ty) {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "#[entity(key)] field must be a String",
                ));
            }
            key_field = Some(ident.clone());
        }

        if field_options.skip || !matches!(field.vis, Visibility::Public(_)) {
            continue;
        }

        let stored_name = field_options
            .rename
            .unwrap_or_else(|| ident.unraw().to_string());
        if !stored_names.insert(stored_name.clone()) {
            return Err(syn::Error::new(
                ident.span(),
                format!("duplicate stored field name `{}`", stored_name),
            ));
        }

        let name_lit = LitStr::new(&stored_name, ident.span());
        descriptors.push(field_descriptor_tokens(&ident, &field.ty, &name_lit));
    }

    let type_name = options.name.unwrap_or_else(|| struct_name.unraw().to_string());
    let type_name_lit = LitStr::new(&type_name, struct_name.span());

    let identity_impl = key_field.map(|key| {
        quote! {
            impl ::hashstore::Identity for #struct_name {
                fn key(&self) -> &str {
                    &self.#key
                }

                fn set_key(&mut self, key: ::std::string::String) {
                    self.#key = key;
                }
            }
        }
    });

    Ok(quote! {
        impl ::hashstore::Entity for #struct_name {
            fn type_name() -> &'static str {
                #type_name_lit
            }

            fn fields() -> ::std::vec::Vec<::hashstore::FieldDescriptor<Self>> {
                ::std::vec![#(#descriptors),*]
            }
        }

        #identity_impl
    })
}

fn field_descriptor_tokens(ident: &Ident, ty: &Type, name: &LitStr) -> TokenStream2 {
    match unsupported_kind_tokens(ty) {
        Some(kind) => quote! {
            ::hashstore::FieldDescriptor::unsupported(#name, #kind)
        },
        None => quote! {
            ::hashstore::FieldDescriptor::new(
                #name,
                <#ty as ::hashstore::Primitive>::KIND,
                |entity: &Self| ::hashstore::Primitive::encode(&entity.#ident),
                |entity: &mut Self, raw: &str| {
                    entity.#ident = <#ty as ::hashstore::Primitive>::decode(raw)?;
                    ::std::option::Option::Some(())
                },
            )
        },
    }
}

/// `None` for primitive field types, otherwise the kind reported when the
/// field is encoded.
fn unsupported_kind_tokens(ty: &Type) -> Option<TokenStream2> {
    match ty {
        Type::Reference(_) | Type::Ptr(_) => {
            return Some(quote!(::hashstore::FieldKind::Pointer));
        }
        Type::Slice(_) | Type::Array(_) => {
            return Some(quote!(::hashstore::FieldKind::Slice));
        }
        Type::Group(group) => return unsupported_kind_tokens(&group.elem),
        Type::Paren(paren) => return unsupported_kind_tokens(&paren.elem),
        Type::Path(path) if path.qself.is_none() => {
            if let Some(segment) = path.path.segments.last() {
                let ident = segment.ident.to_string();
                let bare = segment.arguments.is_none();
                match ident.as_str() {
                    "String" | "bool" | "f32" | "f64" | "i8" | "i16" | "i32" | "i64"
                    | "isize" | "u8" | "u16" | "u32" | "u64" | "usize"
                        if bare =>
                    {
                        return None;
                    }
                    "Vec" | "VecDeque" => return Some(quote!(::hashstore::FieldKind::Slice)),
                    "HashMap" | "BTreeMap" => {
                        return Some(quote!(::hashstore::FieldKind::Map));
                    }
                    "Box" | "Rc" | "Arc" | "Option" => {
                        return Some(quote!(::hashstore::FieldKind::Pointer));
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }

    Some(quote!(::hashstore::FieldKind::Struct))
}

fn is_string(ty: &Type) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };
    path.qself.is_none()
        && path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "String" && segment.arguments.is_none())
}

fn parse_entity_options(attrs: &[syn::Attribute]) -> syn::Result<EntityOptions> {
    let mut options = EntityOptions { name: None };

    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                if lit.value().is_empty() {
                    return Err(meta.error("entity name cannot be empty"));
                }
                options.name = Some(lit.value());
                return Ok(());
            }

            Err(meta.error("Unsupported entity attribute. Supported: name = \"...\""))
        })?;
    }

    Ok(options)
}

fn parse_field_options(attrs: &[syn::Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("key") {
                options.key = true;
                return Ok(());
            }

            if meta.path.is_ident("skip") {
                options.skip = true;
                return Ok(());
            }

            if meta.path.is_ident("rename") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                if lit.value().is_empty() {
                    return Err(meta.error("renamed field cannot be empty"));
                }
                options.rename = Some(lit.value());
                return Ok(());
            }

            Err(meta.error(
                "Unsupported entity field attribute. Supported: key, skip, rename = \"...\"",
            ))
        })?;

        if options.skip && options.rename.is_some() {
            return Err(syn::Error::new(
                attr.span(),
                "#[entity(skip)] cannot define a stored name",
            ));
        }
    }

    Ok(options)
}
