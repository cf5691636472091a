use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Expr, Fields, Lit, LitStr, Meta, Type};

/// Derive the column list of a CSV input record.
///
/// For every named field this collects:
/// - the column header (honours `#[serde(rename = "...")]`)
/// - whether the column is required (`Option<T>` and `#[serde(default)]` fields are not)
/// - a description taken from the field's doc comment
///
/// and generates `fn csv_schema() -> &'static [CsvField]`. A `CsvField` type with
/// `name`, `required` and `description` fields must be in scope at the derive site.
#[proc_macro_derive(CsvSchema, attributes(serde))]
pub fn derive_csv_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct Column {
    header: String,
    required: bool,
    description: String,
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "CsvSchema requires a struct with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "CsvSchema only supports structs")),
    };

    let mut columns = Vec::with_capacity(named.len());
    for field in named {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "unnamed field"))?;
        let attrs = serde_attrs(&field.attrs)?;
        columns.push(Column {
            header: attrs.rename.unwrap_or_else(|| ident.to_string()),
            required: !attrs.has_default && !is_option(&field.ty),
            description: doc_comment(&field.attrs),
        });
    }

    let entries = columns.iter().map(|c| {
        let header = &c.header;
        let required = c.required;
        let description = &c.description;
        quote! {
            CsvField {
                name: #header,
                required: #required,
                description: #description,
            }
        }
    });

    Ok(quote! {
        impl #name {
            pub fn csv_schema() -> &'static [CsvField] {
                static COLUMNS: &[CsvField] = &[#(#entries),*];
                COLUMNS
            }
        }
    })
}

#[derive(Default)]
struct SerdeAttrs {
    rename: Option<String>,
    has_default: bool,
}

fn serde_attrs(attrs: &[syn::Attribute]) -> syn::Result<SerdeAttrs> {
    let mut out = SerdeAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                out.rename = Some(value.value());
            } else if meta.path.is_ident("default") {
                out.has_default = true;
                // `default = "path"` carries a value we don't need
                if meta.input.peek(syn::Token![=]) {
                    let _: LitStr = meta.value()?.parse()?;
                }
            } else if meta.input.peek(syn::Token![=]) {
                let _: Expr = meta.value()?.parse()?;
            }
            Ok(())
        })?;
    }
    Ok(out)
}

fn doc_comment(attrs: &[syn::Attribute]) -> String {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| match &a.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(expr) => match &expr.lit {
                    Lit::Str(s) => Some(s.value().trim().to_string()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .collect();
    lines.join(" ")
}

fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option"),
        _ => false,
    }
}
