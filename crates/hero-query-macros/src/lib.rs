//! Procedural macros for hero-query.
//!
//! Provides the `query!` macro: SQL checked against the schema file at
//! compile time, with a row struct generated from the inferred column types.

use hero_query::validate::QueryResult;
use hero_query::{validate_query, RustType, Schema};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use std::path::PathBuf;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Expr, LitStr, Token};

/// Get the schema file path from environment or default.
fn get_schema_path() -> PathBuf {
    if let Ok(path) = std::env::var("HERO_QUERY_SCHEMA") {
        PathBuf::from(path)
    } else if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
        PathBuf::from(manifest_dir).join("schema.sql")
    } else {
        PathBuf::from("schema.sql")
    }
}

fn load_schema() -> Result<Schema, String> {
    let path = get_schema_path();

    if !path.exists() {
        return Err(format!(
            "Schema file not found: {}. Set HERO_QUERY_SCHEMA or create schema.sql in your crate root.",
            path.display()
        ));
    }

    Schema::from_file(&path).map_err(|e| format!("Failed to parse schema: {}", e))
}

/// `"SQL"` followed by zero or more comma-separated parameter expressions.
struct QueryInput {
    sql: LitStr,
    params: Vec<Expr>,
}

impl Parse for QueryInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let sql: LitStr = input.parse()?;
        let mut params = Vec::new();

        if input.parse::<Option<Token![,]>>()?.is_some() {
            let rest = Punctuated::<Expr, Token![,]>::parse_terminated(input)?;
            params.extend(rest);
        }

        Ok(QueryInput { sql, params })
    }
}

/// The `query!` macro validates SQL at compile time and generates typed code.
///
/// # Example
///
/// ```ignore
/// let heroes = query!(r#"SELECT "HeroName" FROM "Hero" WHERE "RaceId" = $1"#, 2)
///     .fetch_all(&db)
///     .await?;
/// ```
///
/// This will:
/// 1. Validate that the `Hero` table and its columns exist
/// 2. Check that one argument is given for `$1`
/// 3. Generate a row struct with `hero_name: String`
#[proc_macro]
pub fn query(input: TokenStream) -> TokenStream {
    let QueryInput { sql: sql_lit, params } = parse_macro_input!(input as QueryInput);
    let sql = sql_lit.value();

    let schema = match load_schema() {
        Ok(s) => s,
        Err(e) => {
            return syn::Error::new_spanned(sql_lit, e).to_compile_error().into();
        }
    };

    let result = match validate_query(&schema, &sql) {
        Ok(r) => r,
        Err(e) => {
            return syn::Error::new_spanned(sql_lit, format!("SQL validation error: {}", e))
                .to_compile_error()
                .into();
        }
    };

    if result.param_count != params.len() {
        return syn::Error::new_spanned(
            sql_lit,
            format!(
                "Expected {} parameters, got {}",
                result.param_count,
                params.len()
            ),
        )
        .to_compile_error()
        .into();
    }

    match generate_query_code(&sql, &result, &params) {
        Ok(generated) => generated.into(),
        Err(e) => syn::Error::new_spanned(sql_lit, e).to_compile_error().into(),
    }
}

/// Generate the code for a validated query.
fn generate_query_code(
    sql: &str,
    result: &QueryResult,
    params: &[Expr],
) -> Result<TokenStream2, String> {
    let mut fields = Vec::with_capacity(result.columns.len());
    let mut seen: Vec<(String, &str)> = Vec::with_capacity(result.columns.len());

    for col in &result.columns {
        let field = sanitize_field_name(&col.name);
        if let Some((_, first)) = seen.iter().find(|(f, _)| *f == field) {
            return Err(format!(
                "Output columns '{}' and '{}' both map to field `{}`; give one of them a different name with AS",
                first, col.name, field
            ));
        }
        seen.push((field.clone(), &col.name));

        let name = format_ident!("{}", field);
        let ty = rust_type_to_tokens(&col.rust_type)?;
        let column = &col.name;
        fields.push(quote! {
            #[sqlx(rename = #column)]
            pub #name: #ty
        });
    }

    let struct_name = format_ident!("QueryResult");

    Ok(quote! {
        {
            #[derive(Debug, ::sqlx::FromRow)]
            struct #struct_name {
                #(#fields),*
            }

            ::hero_query::Query::<#struct_name>::new(#sql)
                #(.bind(#params))*
        }
    })
}

/// Turn a column name like `HeroName` into a field name like `hero_name`.
fn sanitize_field_name(name: &str) -> String {
    let mut snake = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;

    for c in name.chars() {
        if c.is_uppercase() {
            if prev_lower {
                snake.push('_');
            }
            snake.extend(c.to_lowercase());
            prev_lower = false;
        } else if c.is_alphanumeric() {
            snake.push(c);
            prev_lower = c.is_lowercase() || c.is_numeric();
        } else {
            snake.push('_');
            prev_lower = false;
        }
    }

    match snake.as_str() {
        "type" | "match" | "ref" | "self" => format!("r#{}", snake),
        _ if snake.chars().next().is_some_and(|c| c.is_numeric()) => format!("_{}", snake),
        _ => snake,
    }
}

fn rust_type_to_tokens(ty: &RustType) -> Result<TokenStream2, String> {
    Ok(match ty {
        RustType::I16 => quote! { i16 },
        RustType::I32 => quote! { i32 },
        RustType::I64 => quote! { i64 },
        RustType::F32 => quote! { f32 },
        RustType::F64 => quote! { f64 },
        RustType::String => quote! { String },
        RustType::Bool => quote! { bool },
        RustType::Option(inner) => {
            let inner_tokens = rust_type_to_tokens(inner)?;
            quote! { Option<#inner_tokens> }
        }
        RustType::Custom(name) => {
            return Err(format!("Unsupported column type '{}'", name));
        }
    })
}
