use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Expr, ItemFn, LitStr, ReturnType, Token, Type};

/// Template literal followed by one expression per `{}` hole.
struct HtmlInput {
    template: LitStr,
    values: Vec<Expr>,
}

impl Parse for HtmlInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let template: LitStr = input.parse()?;
        let values = if input.is_empty() {
            Vec::new()
        } else {
            input.parse::<Token![,]>()?;
            Punctuated::<Expr, Token![,]>::parse_terminated(input)?
                .into_iter()
                .collect()
        };
        Ok(Self { template, values })
    }
}

/// Split template text at `{}` holes. `{{` and `}}` stand for literal braces.
fn split_fragments(text: &str) -> Result<Vec<String>, String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '{' => match chars.next() {
                Some('{') => current.push('{'),
                Some('}') => fragments.push(std::mem::take(&mut current)),
                _ => return Err("holes are written `{}`; use `{{` for a literal brace".into()),
            },
            '}' => match chars.next() {
                Some('}') => current.push('}'),
                _ => return Err("unmatched `}`; use `}}` for a literal brace".into()),
            },
            other => current.push(other),
        }
    }
    fragments.push(current);
    Ok(fragments)
}

/// Build a `TemplateDescription` from markup with `{}` holes.
///
/// ```ignore
/// html!("<p class=\"greeting {}\">Hello {}!</p>", mood, name)
/// ```
///
/// The static fragments are a `'static` slice, so every evaluation of one
/// call site shares the same compiled template.
#[proc_macro]
pub fn html(input: TokenStream) -> TokenStream {
    let HtmlInput { template, values } = parse_macro_input!(input as HtmlInput);
    let fragments = match split_fragments(&template.value()) {
        Ok(fragments) => fragments,
        Err(message) => return syn::Error::new(template.span(), message).to_compile_error().into(),
    };
    let holes = fragments.len() - 1;
    if holes != values.len() {
        let message = format!(
            "template has {holes} hole{} but {} value{} supplied",
            if holes == 1 { "" } else { "s" },
            values.len(),
            if values.len() == 1 { " was" } else { "s were" },
        );
        return syn::Error::new(template.span(), message)
            .to_compile_error()
            .into();
    }

    let expanded = quote! {
        ::weave_core::TemplateDescription::new(
            &[#(#fragments),*],
            ::std::vec![#(::weave_core::Value::from(#values)),*],
        )
    };
    expanded.into()
}

/// Turn a render function into a function returning its `ComponentDef`.
///
/// ```ignore
/// #[component("x-counter")]
/// fn counter(cx: &mut RenderScope<'_>) -> Result<TemplateDescription, RenderError> { ... }
///
/// runtime.define(counter())?;
/// ```
///
/// A render function returning a bare `TemplateDescription` is wrapped in `Ok`.
#[proc_macro_attribute]
pub fn component(attr: TokenStream, item: TokenStream) -> TokenStream {
    let tag = parse_macro_input!(attr as LitStr);
    let func = parse_macro_input!(item as ItemFn);
    match expand_component(&tag, func) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_component(tag: &LitStr, func: ItemFn) -> syn::Result<TokenStream2> {
    if !tag.value().contains('-') {
        return Err(syn::Error::new(
            tag.span(),
            "component tags need a `-`, like `x-counter`",
        ));
    }
    if func.sig.inputs.len() != 1 {
        return Err(syn::Error::new_spanned(
            &func.sig.inputs,
            "component functions take exactly one `&mut RenderScope` argument",
        ));
    }
    if !func.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &func.sig.generics,
            "component functions cannot be generic",
        ));
    }

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = func;
    let name = &sig.ident;
    let render_name = format_ident!("__{}_render", name);
    let inputs = &sig.inputs;
    let wraps_ok = returns_bare_description(&sig.output);
    let output = &sig.output;
    let render = if wraps_ok {
        quote! {
            move |scope: &mut ::weave_core::RenderScope<'_>| {
                ::std::result::Result::Ok(#render_name(scope))
            }
        }
    } else {
        quote!(#render_name)
    };

    Ok(quote! {
        #(#attrs)*
        #vis fn #name() -> ::weave_core::ComponentDef {
            fn #render_name(#inputs) #output #block
            ::weave_core::ComponentDef::new(#tag, #render)
        }
    })
}

fn returns_bare_description(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Path(path) => path
                .path
                .segments
                .last()
                .is_some_and(|segment| segment.ident == "TemplateDescription"),
            _ => false,
        },
        ReturnType::Default => false,
    }
}
