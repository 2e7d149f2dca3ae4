//! Test attribute for the lock crate.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, ItemFn};

/// Context test case procedural macro
///
/// Turns a plain function into a `#[test]` that:
/// - Installs the console logger (first test wins, the rest reuse it)
/// - Prints a colored header naming the test and its file
/// - Runs the body, then prints a colored success line
///
/// Attributes written on the function (`#[ignore]`, `#[should_panic]`, ...)
/// are moved onto the generated test. The crate under test must be
/// reachable as `::wlock`.
#[proc_macro_attribute]
pub fn context_test(_attr: TokenStream, input: TokenStream) -> TokenStream {
    let mut input_fn = parse_macro_input!(input as ItemFn);
    let fn_name = input_fn.sig.ident.clone();

    if let Some(arg) = input_fn.sig.inputs.first() {
        return syn::Error::new_spanned(arg, "context tests take no arguments")
            .to_compile_error()
            .into();
    }

    let attrs = core::mem::take(&mut input_fn.attrs);
    let body_name = format_ident!("__{}_body", fn_name);
    input_fn.sig.ident = body_name.clone();

    // Generate test wrapper with:
    // 1. Logger setup and test identification header
    // 2. Original body execution
    // 3. Success reporting (a panic skips it and fails the test)
    let output = quote! {
        #[test]
        #(#attrs)*
        fn #fn_name () {
            #[allow(unused)]
            #input_fn

            ::wlock::io::logging::init_for_tests();
            ::wlock::color_println!(::wlock::io::console::Color::Blue,
                "\nTesting > {} ({}) ...",
                stringify!(#fn_name),
                file!()
            );

            #body_name ();
            ::wlock::color_println!(::wlock::io::console::Color::Green,
                "========[Test passed!]========"
            );
        }
    };

    output.into()
}
