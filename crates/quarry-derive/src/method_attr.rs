//! Implementation of the #[exposed_method] attribute macro

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{
    Attribute, Expr, ExprLit, FnArg, ItemFn, Lit, Meta, Pat, PathSegment, Result, ReturnType,
    Token, Type, punctuated::Punctuated,
};

#[derive(Debug, Default, PartialEq)]
struct MethodArgs {
    name: Option<String>,
    description: Option<String>,
    private: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Required,
    Optional,
    VarPositional,
    VarKeyword,
}

pub fn exposed_method_impl(args: Punctuated<Meta, Token![,]>, input: ItemFn) -> Result<TokenStream> {
    let args = parse_args(args)?;
    let sig = &input.sig;

    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "#[exposed_method] functions cannot be generic",
        ));
    }

    let fn_name = &sig.ident;
    let fn_vis = &input.vis;
    let member_name = fn_name.unraw().to_string();
    let struct_name = format_ident!("{}Method", capitalize(&member_name));

    let mut extractions = Vec::new();
    let mut call_args = Vec::new();
    let mut signature = Vec::new();
    let mut seen_var_positional = false;
    let mut seen_var_keyword = false;

    for input_arg in &sig.inputs {
        let pat_type = match input_arg {
            FnArg::Typed(pat_type) => pat_type,
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "#[exposed_method] only supports free functions",
                ));
            }
        };
        let Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
            return Err(syn::Error::new_spanned(
                &pat_type.pat,
                "parameters must be plain identifiers",
            ));
        };
        let ty = pat_type.ty.as_ref();
        if let Type::Reference(reference) = ty {
            return Err(syn::Error::new_spanned(
                reference,
                "parameters must be owned types",
            ));
        }

        let ident = &pat_ident.ident;
        let local = format_ident!("__arg_{}", ident.unraw());
        let param_name = ident.unraw().to_string();

        match param_kind(ty) {
            ParamKind::Required => {
                signature.push(quote! { .param(#param_name) });
                extractions.push(quote! { let #local: #ty = __args.get(#param_name)?; });
            }
            ParamKind::Optional => {
                signature.push(quote! {
                    .optional_param(#param_name, ::serde_json::Value::Null)
                });
                extractions.push(quote! { let #local: #ty = __args.get(#param_name)?; });
            }
            ParamKind::VarPositional => {
                if std::mem::replace(&mut seen_var_positional, true) {
                    return Err(syn::Error::new_spanned(ty, "only one VarArgs parameter is allowed"));
                }
                signature.push(quote! { .var_positional() });
                extractions.push(quote! { let #local: #ty = __args.var_args(); });
            }
            ParamKind::VarKeyword => {
                if std::mem::replace(&mut seen_var_keyword, true) {
                    return Err(syn::Error::new_spanned(ty, "only one KwArgs parameter is allowed"));
                }
                signature.push(quote! { .var_keyword() });
                extractions.push(quote! { let #local: #ty = __args.kw_args(); });
            }
        }
        call_args.push(local);
    }

    let (constructor, asyncness, await_token) = match sig.asyncness {
        Some(_) => (quote! { suspending }, quote! { async }, quote! { .await }),
        None => (quote! { blocking }, quote! {}, quote! {}),
    };

    let convert = if returns_result(&sig.output) {
        quote! {
            let __value = __output
                .map_err(::core::convert::Into::<::quarry_server::MethodError>::into)?;
            ::core::result::Result::Ok(::serde_json::to_value(__value)?)
        }
    } else {
        quote! {
            ::core::result::Result::Ok(::serde_json::to_value(__output)?)
        }
    };

    let exposed_as = args
        .name
        .filter(|name| *name != member_name)
        .map(|name| quote! { .exposed_as(#name) });
    let visibility = args.private.then(|| quote! { .private() });
    let description = args
        .description
        .or_else(|| doc_comment(&input.attrs))
        .map(|description| quote! { .describe(#description) });

    Ok(quote! {
        #input

        #[derive(Debug, Clone, Copy, Default)]
        #fn_vis struct #struct_name;

        impl #struct_name {
            #[allow(unused_variables, clippy::let_unit_value, clippy::unit_arg)]
            #asyncness fn invoke(__args: ::quarry_server::BoundArgs) -> ::quarry_server::MethodResult {
                #(#extractions)*
                let __output = #fn_name(#(#call_args),*) #await_token;
                #convert
            }
        }

        #[automatically_derived]
        impl ::core::convert::From<#struct_name> for ::quarry_server::ExposedMethod {
            fn from(_: #struct_name) -> Self {
                ::quarry_server::ExposedMethod::#constructor(#member_name, #struct_name::invoke)
                    #(#signature)*
                    #exposed_as
                    #visibility
                    #description
            }
        }
    })
}

fn parse_args(args: Punctuated<Meta, Token![,]>) -> Result<MethodArgs> {
    let mut parsed = MethodArgs::default();
    for arg in args {
        match arg {
            Meta::NameValue(nv) if nv.path.is_ident("name") => {
                parsed.name = Some(string_value(&nv.value)?);
            }
            Meta::NameValue(nv) if nv.path.is_ident("description") => {
                parsed.description = Some(string_value(&nv.value)?);
            }
            Meta::Path(path) if path.is_ident("private") => {
                parsed.private = true;
            }
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "expected `name = \"...\"`, `description = \"...\"` or `private`",
                ));
            }
        }
    }
    Ok(parsed)
}

fn string_value(expr: &Expr) -> Result<String> {
    if let Expr::Lit(ExprLit {
        lit: Lit::Str(s), ..
    }) = expr
    {
        return Ok(s.value());
    }
    Err(syn::Error::new_spanned(expr, "expected a string literal"))
}

/// Doc comment lines joined with newlines, if there are any
fn doc_comment(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => string_value(&nv.value).ok(),
            _ => None,
        })
        .map(|line| line.trim().to_string())
        .collect();

    let text = lines.join("\n").trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn last_segment(ty: &Type) -> Option<&PathSegment> {
    match ty {
        Type::Path(type_path) if type_path.qself.is_none() => type_path.path.segments.last(),
        _ => None,
    }
}

fn param_kind(ty: &Type) -> ParamKind {
    match last_segment(ty) {
        Some(segment) if segment.ident == "VarArgs" => ParamKind::VarPositional,
        Some(segment) if segment.ident == "KwArgs" => ParamKind::VarKeyword,
        Some(segment) if segment.ident == "Option" => ParamKind::Optional,
        _ => ParamKind::Required,
    }
}

fn returns_result(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => last_segment(ty)
            .is_some_and(|segment| segment.ident == "Result" || segment.ident == "MethodResult"),
        ReturnType::Default => false,
    }
}

fn capitalize(s: &str) -> String {
    // snake_case to PascalCase
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}
