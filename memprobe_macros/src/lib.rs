use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    Data, DeriveInput, Error, Fields, Index, Member, Result, Type, parse_macro_input, parse_quote,
};

/// Derives `memprobe::Inspect`, describing how a type's memory is probed.
///
/// Supported shapes: structs with named or tuple fields, unit structs,
/// fieldless enums (probed as primitives of their real width), and unions
/// (overlapping field projectors).
///
/// Container attributes:
/// - `#[inspect(reference)]`: the type is heap-indirected; fields of this
///   type probe as a single pointer, and the type itself reports heap
///   overhead.
/// - `#[inspect(opaque)]`: the type probes as one primitive unit and is
///   never descended into.
#[proc_macro_derive(Inspect, attributes(inspect))]
pub fn derive_inspect(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

struct ContainerAttrs {
    reference: bool,
    opaque: bool,
}

fn container_attrs(input: &DeriveInput) -> Result<ContainerAttrs> {
    let mut attrs = ContainerAttrs {
        reference: false,
        opaque: false,
    };

    for attr in &input.attrs {
        if !attr.path().is_ident("inspect") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("reference") {
                attrs.reference = true;
                Ok(())
            } else if meta.path.is_ident("opaque") {
                attrs.opaque = true;
                Ok(())
            } else {
                Err(meta.error("expected `reference` or `opaque`"))
            }
        })?;
    }

    if attrs.reference && attrs.opaque {
        return Err(Error::new_spanned(
            &input.ident,
            "`reference` and `opaque` are mutually exclusive",
        ));
    }

    Ok(attrs)
}

fn expand(input: DeriveInput) -> Result<TokenStream> {
    let attrs = container_attrs(&input)?;

    let kind = if attrs.opaque {
        quote! { ::memprobe::ShapeKind::Primitive }
    } else {
        match &input.data {
            Data::Struct(data) => {
                let fields = field_shapes(collect_fields(&data.fields));
                let heap = attrs.reference;
                quote! {
                    ::memprobe::ShapeKind::Struct {
                        heap: #heap,
                        fields: ::std::vec![#(#fields),*],
                    }
                }
            }
            Data::Union(data) => {
                if attrs.reference {
                    return Err(Error::new_spanned(
                        &input.ident,
                        "unions cannot be `reference` types",
                    ));
                }
                let members = data
                    .fields
                    .named
                    .iter()
                    .map(|f| (Member::Named(f.ident.clone().expect("named field")), f.ty.clone()))
                    .collect();
                let fields = field_shapes(members);
                quote! {
                    ::memprobe::ShapeKind::Struct {
                        heap: false,
                        fields: ::std::vec![#(#fields),*],
                    }
                }
            }
            Data::Enum(data) => {
                for variant in &data.variants {
                    if !matches!(variant.fields, Fields::Unit) {
                        return Err(Error::new_spanned(
                            variant,
                            "Inspect enums must be fieldless; mark the type `#[inspect(opaque)]` or restructure it",
                        ));
                    }
                }
                quote! { ::memprobe::ShapeKind::Primitive }
            }
        }
    };

    let name = &input.ident;
    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(::memprobe::Inspect));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::memprobe::Inspect for #name #ty_generics #where_clause {
            fn shape() -> ::memprobe::TypeShape {
                ::memprobe::TypeShape {
                    ident: ::memprobe::TypeIdent::of::<Self>(),
                    size: ::memprobe::instance_size::<Self>(),
                    align: ::core::mem::align_of::<Self>(),
                    kind: #kind,
                }
            }
        }
    })
}

fn collect_fields(fields: &Fields) -> Vec<(Member, Type)> {
    match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .map(|f| (Member::Named(f.ident.clone().expect("named field")), f.ty.clone()))
            .collect(),
        Fields::Unnamed(unnamed) => unnamed
            .unnamed
            .iter()
            .enumerate()
            .map(|(i, f)| (Member::Unnamed(Index::from(i)), f.ty.clone()))
            .collect(),
        Fields::Unit => Vec::new(),
    }
}

fn field_shapes(members: Vec<(Member, Type)>) -> Vec<TokenStream> {
    members
        .into_iter()
        .map(|(member, ty)| {
            let name = match &member {
                Member::Named(ident) => ident.to_string(),
                Member::Unnamed(index) => index.index.to_string(),
            };

            quote! {
                ::memprobe::FieldShape {
                    name: #name,
                    declared_in: ::core::any::type_name::<Self>(),
                    shape: <#ty as ::memprobe::Inspect>::shape,
                    project: {
                        let project: fn(*const u8) -> *const u8 = |base| unsafe {
                            (&raw const (*base.cast::<Self>()).#member).cast::<u8>()
                        };
                        project
                    },
                }
            }
        })
        .collect()
}
