//! Type mappings between SQL column types and Rust.

use std::fmt;

/// SQL column types understood by the schema provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    // Numeric types
    SmallInt, // int2
    Integer,  // int4
    BigInt,   // int8
    Real,     // float4
    Double,   // float8

    // Character types
    Text,
    Varchar(Option<u32>),

    Boolean,

    // Anything else is carried through by name
    Custom(String),
}

impl SqlType {
    /// Parse a SQL type name into a SqlType.
    pub fn from_sql_name(name: &str) -> Self {
        let name_lower = name.to_lowercase();

        match name_lower.trim() {
            "smallint" | "int2" => SqlType::SmallInt,
            "integer" | "int" | "int4" => SqlType::Integer,
            "bigint" | "int8" => SqlType::BigInt,
            "real" | "float4" => SqlType::Real,
            "double precision" | "double" | "float8" => SqlType::Double,
            "text" => SqlType::Text,
            "character varying" | "varchar" => SqlType::Varchar(None),
            "boolean" | "bool" => SqlType::Boolean,
            s if s.starts_with("character varying") || s.starts_with("varchar") => {
                SqlType::Varchar(parse_length(s))
            }
            other => SqlType::Custom(other.to_string()),
        }
    }

    /// Get the corresponding Rust type for this column type.
    ///
    /// Key columns are declared `integer` and decode as `i32` on both
    /// SQLite and PostgreSQL.
    pub fn to_rust_type(&self) -> RustType {
        match self {
            SqlType::SmallInt => RustType::I16,
            SqlType::Integer => RustType::I32,
            SqlType::BigInt => RustType::I64,
            SqlType::Real => RustType::F32,
            SqlType::Double => RustType::F64,
            SqlType::Text | SqlType::Varchar(_) => RustType::String,
            SqlType::Boolean => RustType::Bool,
            SqlType::Custom(name) => RustType::Custom(name.clone()),
        }
    }
}

/// Parse length from types like "varchar(255)".
fn parse_length(s: &str) -> Option<u32> {
    let start = s.find('(')?;
    let end = s.find(')')?;
    s[start + 1..end].trim().parse().ok()
}

/// Rust types generated for query result columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RustType {
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bool,

    // Optional wrapper (for nullable columns)
    Option(Box<RustType>),

    Custom(String),
}

impl RustType {
    /// Wrap this type in Option if it is not already optional.
    pub fn nullable(self) -> Self {
        match self {
            RustType::Option(_) => self,
            other => RustType::Option(Box::new(other)),
        }
    }

    /// Strip one level of Option.
    pub fn non_null(self) -> Self {
        match self {
            RustType::Option(inner) => *inner,
            other => other,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, RustType::Option(_))
    }

    /// Returns the Rust type path for code generation.
    pub fn type_path(&self) -> String {
        match self {
            RustType::I16 => "i16".to_string(),
            RustType::I32 => "i32".to_string(),
            RustType::I64 => "i64".to_string(),
            RustType::F32 => "f32".to_string(),
            RustType::F64 => "f64".to_string(),
            RustType::String => "String".to_string(),
            RustType::Bool => "bool".to_string(),
            RustType::Option(inner) => format!("Option<{}>", inner.type_path()),
            RustType::Custom(name) => name.clone(),
        }
    }
}

impl fmt::Display for RustType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_path())
    }
}
