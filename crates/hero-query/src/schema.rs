//! The heroes schema as data.
//!
//! Built from the `CREATE TABLE` statements in `schema.sql`. Records what
//! the query checker relies on: column types, nullability, primary keys,
//! and the foreign keys the heroes joins follow.

use crate::error::{Error, Result};
use crate::types::SqlType;
use sqlparser::ast::{
    CharacterLength, ColumnDef, ColumnOption, CreateTable, DataType, Expr, ForeignKeyConstraint,
    Ident, ObjectName, Statement, TableConstraint,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::path::Path;

/// DDL of the heroes fixture database.
pub const HEROES_SCHEMA_SQL: &str = include_str!("../schema.sql");

/// Tables in declaration order.
#[derive(Debug, Default)]
pub struct Schema {
    tables: Vec<Table>,
}

impl Schema {
    /// The heroes schema every query in this crate is written against.
    pub fn heroes() -> Result<Self> {
        Self::from_sql(HEROES_SCHEMA_SQL)
    }

    /// Parse `CREATE TABLE` statements; anything else in the script is ignored.
    ///
    /// Every foreign key must point at a declared table and column.
    pub fn from_sql(sql: &str) -> Result<Self> {
        let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
            .map_err(|e| Error::SchemaParse(e.to_string()))?;

        let mut schema = Schema::default();
        for statement in &statements {
            if let Statement::CreateTable(create) = statement {
                let table = Table::from_create_table(create)?;
                if schema.has_table(&table.name) {
                    return Err(Error::SchemaParse(format!(
                        "Table {} is declared twice",
                        table.name
                    )));
                }
                schema.tables.push(table);
            }
        }

        schema.resolve_foreign_keys()?;
        Ok(schema)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let sql = std::fs::read_to_string(path)?;
        Self::from_sql(&sql)
    }

    /// Case-insensitive, since unquoted identifiers fold.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    /// Foreign keys of `from` that point at `to`.
    pub fn references<'a>(&'a self, from: &str, to: &'a str) -> impl Iterator<Item = &'a ForeignKey> {
        self.get_table(from)
            .into_iter()
            .flat_map(|t| t.foreign_keys.iter())
            .filter(move |fk| fk.table.eq_ignore_ascii_case(to))
    }

    /// Fill in implicit target columns and check every target exists.
    fn resolve_foreign_keys(&mut self) -> Result<()> {
        let mut resolved = Vec::with_capacity(self.tables.len());

        for table in &self.tables {
            let mut keys = Vec::with_capacity(table.foreign_keys.len());
            for fk in &table.foreign_keys {
                let target = self.get_table(&fk.table).ok_or_else(|| {
                    Error::SchemaParse(format!(
                        "{}.{} references unknown table {}",
                        table.name, fk.column, fk.table
                    ))
                })?;

                // `REFERENCES "T"` without a column means T's primary key
                let column = if fk.referenced_column.is_empty() {
                    match target.primary_key().as_slice() {
                        [pk] => pk.name.clone(),
                        _ => {
                            return Err(Error::SchemaParse(format!(
                                "{}.{} references {} which has no single-column primary key",
                                table.name, fk.column, target.name
                            )))
                        }
                    }
                } else {
                    target
                        .get_column(&fk.referenced_column)
                        .map(|c| c.name.clone())
                        .ok_or_else(|| {
                            Error::SchemaParse(format!(
                                "{}.{} references unknown column {}.{}",
                                table.name, fk.column, target.name, fk.referenced_column
                            ))
                        })?
                };

                keys.push(ForeignKey {
                    column: fk.column.clone(),
                    table: target.name.clone(),
                    referenced_column: column,
                });
            }
            resolved.push(keys);
        }

        for (table, keys) in self.tables.iter_mut().zip(resolved) {
            table.foreign_keys = keys;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    fn from_create_table(create: &CreateTable) -> Result<Self> {
        let name = object_name(&create.name);
        let mut columns = Vec::with_capacity(create.columns.len());
        let mut foreign_keys = Vec::new();

        for def in &create.columns {
            let (column, reference) = Column::from_column_def(def);
            if let Some(fk) = reference {
                foreign_keys.push(ForeignKey::unresolved(&column.name, fk)?);
            }
            columns.push(column);
        }

        let mut table = Table {
            name,
            columns,
            foreign_keys,
        };

        // Composite keys of the join tables are only expressible here
        for constraint in &create.constraints {
            match constraint {
                TableConstraint::PrimaryKey(pk) => {
                    for part in &pk.columns {
                        if let Expr::Identifier(ident) = &part.column.expr {
                            table.column_mut(ident)?.mark_primary_key();
                        }
                    }
                }
                TableConstraint::ForeignKey(fk) => {
                    let [column] = fk.columns.as_slice() else {
                        return Err(Error::SchemaParse(format!(
                            "Composite foreign keys are not supported (table {})",
                            table.name
                        )));
                    };
                    let column = table.column_mut(column)?.name.clone();
                    table.foreign_keys.push(ForeignKey::unresolved(&column, fk)?);
                }
                _ => {}
            }
        }

        Ok(table)
    }

    fn column_mut(&mut self, ident: &Ident) -> Result<&mut Column> {
        let table = &self.name;
        self.columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(&ident.value))
            .ok_or_else(|| Error::UnknownColumn {
                table: table.clone(),
                column: ident.value.clone(),
            })
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Columns making up the primary key, in declaration order.
    pub fn primary_key(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_primary_key).collect()
    }

    /// The foreign key declared on `column`, if any.
    pub fn foreign_key(&self, column: &str) -> Option<&ForeignKey> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.column.eq_ignore_ascii_case(column))
    }
}

#[derive(Debug)]
pub struct Column {
    pub name: String,
    pub data_type: SqlType,
    pub nullable: bool,
    pub is_primary_key: bool,
}

impl Column {
    fn from_column_def(def: &ColumnDef) -> (Self, Option<&ForeignKeyConstraint>) {
        let mut column = Column {
            name: def.name.value.clone(),
            data_type: sql_type(&def.data_type),
            nullable: true,
            is_primary_key: false,
        };
        let mut reference = None;

        for option in &def.options {
            match &option.option {
                ColumnOption::NotNull => column.nullable = false,
                ColumnOption::Null => column.nullable = true,
                ColumnOption::PrimaryKey(_) => column.mark_primary_key(),
                ColumnOption::ForeignKey(fk) => reference = Some(fk),
                _ => {}
            }
        }

        (column, reference)
    }

    fn mark_primary_key(&mut self) {
        self.is_primary_key = true;
        self.nullable = false;
    }
}

/// `column` references `table.referenced_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub table: String,
    pub referenced_column: String,
}

impl ForeignKey {
    /// Target names as written; checked against the schema once every table is known.
    fn unresolved(column: &str, fk: &ForeignKeyConstraint) -> Result<Self> {
        let referenced_column = match fk.referred_columns.as_slice() {
            [] => String::new(),
            [target] => target.value.clone(),
            _ => {
                return Err(Error::SchemaParse(format!(
                    "Composite foreign key on {column} is not supported"
                )))
            }
        };

        Ok(ForeignKey {
            column: column.to_string(),
            table: object_name(&fk.foreign_table),
            referenced_column,
        })
    }
}

/// Last part of a possibly schema-qualified name; the heroes tables live in one schema.
fn object_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .filter_map(|part| part.as_ident())
        .last()
        .map(|i| i.value.clone())
        .unwrap_or_default()
}

fn sql_type(dt: &DataType) -> SqlType {
    match dt {
        DataType::SmallInt(_) => SqlType::SmallInt,
        DataType::Int(_) | DataType::Integer(_) => SqlType::Integer,
        DataType::BigInt(_) => SqlType::BigInt,
        DataType::Real => SqlType::Real,
        DataType::Double(_) | DataType::DoublePrecision => SqlType::Double,
        DataType::Text => SqlType::Text,
        DataType::Varchar(len) | DataType::CharacterVarying(len) => SqlType::Varchar(match len {
            Some(CharacterLength::IntegerLength { length, .. }) => u32::try_from(*length).ok(),
            Some(CharacterLength::Max) | None => None,
        }),
        DataType::Boolean | DataType::Bool => SqlType::Boolean,
        DataType::Custom(name, _) => SqlType::Custom(object_name(name)),
        other => SqlType::from_sql_name(&other.to_string()),
    }
}
