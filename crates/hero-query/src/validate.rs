//! Query validation against a schema.
//!
//! Only SELECT statements are accepted: every query this crate runs is a
//! read against pre-seeded data.

use crate::error::{Error, Result};
use crate::schema::{Column, Schema};
use crate::types::{RustType, SqlType};
use sqlparser::ast::{
    BinaryOperator, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments,
    JoinConstraint, JoinOperator, LimitClause, OrderByKind, Query, Select, SelectItem, SetExpr,
    Statement, TableFactor, TableWithJoins, Value,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::collections::HashMap;

/// Result of validating a query - contains the inferred column types.
#[derive(Debug)]
pub struct QueryResult {
    pub columns: Vec<QueryColumn>,
    /// Highest `$N` placeholder referenced anywhere in the statement.
    pub param_count: usize,
}

/// A column in the query result.
#[derive(Debug)]
pub struct QueryColumn {
    pub name: String,
    pub rust_type: RustType,
}

/// Validate a query against a schema and return the inferred types.
pub fn validate_query(schema: &Schema, sql: &str) -> Result<QueryResult> {
    let dialect = PostgreSqlDialect {};
    let statements =
        Parser::parse_sql(&dialect, sql).map_err(|e| Error::QueryParse(e.to_string()))?;

    if statements.len() != 1 {
        return Err(Error::InvalidQuery(
            "Expected exactly one statement".to_string(),
        ));
    }

    match &statements[0] {
        Statement::Query(query) => {
            let mut validator = Validator::new(schema);
            let columns = validator.query(query, None)?;
            Ok(QueryResult {
                columns,
                param_count: validator.max_placeholder,
            })
        }
        _ => Err(Error::InvalidQuery(
            "Only SELECT statements are supported".to_string(),
        )),
    }
}

/// Context for resolving column references.
///
/// Subqueries get a child context; lookups that miss fall back to the
/// enclosing query so correlated references resolve.
#[derive(Debug, Default)]
struct ResolveContext<'p> {
    /// Map from alias/table name -> table name in schema
    table_aliases: HashMap<String, String>,
    /// Tables that are LEFT JOINed (columns from these are nullable)
    left_joined_tables: Vec<String>,
    parent: Option<&'p ResolveContext<'p>>,
}

impl<'p> ResolveContext<'p> {
    fn child_of(parent: Option<&'p ResolveContext<'p>>) -> Self {
        Self {
            parent,
            ..Default::default()
        }
    }

    fn is_nullable_table(&self, alias: &str) -> bool {
        self.left_joined_tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(alias))
    }

    /// Resolve an alias to (table name, joined-nullable) in this scope or an outer one.
    fn lookup_alias(&self, alias: &str) -> Option<(&str, bool)> {
        let key = alias.to_lowercase();
        match self.table_aliases.get(&key) {
            Some(table) => Some((table.as_str(), self.is_nullable_table(&key))),
            None => self.parent.and_then(|p| p.lookup_alias(alias)),
        }
    }
}

struct Validator<'s> {
    schema: &'s Schema,
    max_placeholder: usize,
}

impl<'s> Validator<'s> {
    fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            max_placeholder: 0,
        }
    }

    /// Validate a (sub)query and return its projected columns.
    fn query(
        &mut self,
        query: &Query,
        parent: Option<&ResolveContext<'_>>,
    ) -> Result<Vec<QueryColumn>> {
        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select,
            _ => {
                return Err(Error::InvalidQuery(
                    "Only simple SELECT queries are supported".to_string(),
                ))
            }
        };

        let mut ctx = ResolveContext::child_of(parent);
        let columns = self.select_body(select, &mut ctx)?;

        if let Some(order_by) = &query.order_by {
            if let OrderByKind::Expressions(exprs) = &order_by.kind {
                for order_expr in exprs {
                    // ORDER BY may name an output column by its alias
                    if let Expr::Identifier(ident) = &order_expr.expr {
                        if columns.iter().any(|c| c.name.eq_ignore_ascii_case(&ident.value)) {
                            continue;
                        }
                    }
                    self.check_expr(&ctx, &order_expr.expr)?;
                }
            }
        }

        match &query.limit_clause {
            Some(LimitClause::LimitOffset {
                limit,
                offset,
                limit_by,
            }) => {
                if let Some(limit) = limit {
                    self.check_expr(&ctx, limit)?;
                }
                if let Some(offset) = offset {
                    self.check_expr(&ctx, &offset.value)?;
                }
                for expr in limit_by {
                    self.check_expr(&ctx, expr)?;
                }
            }
            Some(LimitClause::OffsetCommaLimit { offset, limit }) => {
                self.check_expr(&ctx, offset)?;
                self.check_expr(&ctx, limit)?;
            }
            None => {}
        }

        Ok(columns)
    }

    fn select_body(
        &mut self,
        select: &Select,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Vec<QueryColumn>> {
        // Resolve every table before checking ON clauses, which may refer to any of them
        for table_with_joins in &select.from {
            self.resolve_table_refs(table_with_joins, ctx)?;
        }

        for table_with_joins in &select.from {
            for join in &table_with_joins.joins {
                if let Some(JoinConstraint::On(on)) = join_constraint(&join.join_operator) {
                    self.check_expr(ctx, on)?;
                }
            }
        }

        let mut columns = Vec::new();

        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) => {
                    let (name, rust_type) = self.infer_expr_type(ctx, expr)?;
                    let name = match name {
                        Some(name) => name,
                        // Each backend names an unaliased expression differently
                        None if ctx.parent.is_none() => {
                            return Err(Error::InvalidQuery(format!(
                                "Select list item `{expr}` needs a name: add AS \"Name\""
                            )));
                        }
                        None => "?column?".to_string(),
                    };
                    columns.push(QueryColumn { name, rust_type });
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    let (_, rust_type) = self.infer_expr_type(ctx, expr)?;
                    columns.push(QueryColumn {
                        name: alias.value.clone(),
                        rust_type,
                    });
                }
                SelectItem::Wildcard(_) => {
                    let mut aliases: Vec<(&String, &String)> = ctx.table_aliases.iter().collect();
                    aliases.sort();
                    for (alias, table_name) in aliases {
                        self.push_table_columns(&mut columns, table_name, ctx.is_nullable_table(alias))?;
                    }
                }
                SelectItem::QualifiedWildcard(kind, _) => {
                    use sqlparser::ast::SelectItemQualifiedWildcardKind;
                    let table_alias = match kind {
                        SelectItemQualifiedWildcardKind::ObjectName(obj_name) => obj_name
                            .0
                            .first()
                            .and_then(|part| part.as_ident())
                            .map(|i| i.value.clone())
                            .ok_or_else(|| {
                                Error::InvalidQuery("Empty qualified wildcard".to_string())
                            })?,
                        SelectItemQualifiedWildcardKind::Expr(_) => {
                            return Err(Error::InvalidQuery(
                                "Expression wildcards not supported".to_string(),
                            ));
                        }
                    };

                    let (table_name, joined_nullable) = ctx
                        .lookup_alias(&table_alias)
                        .map(|(t, n)| (t.to_string(), n))
                        .ok_or_else(|| Error::UnknownTable(table_alias.clone()))?;
                    self.push_table_columns(&mut columns, &table_name, joined_nullable)?;
                }
            }
        }

        if let Some(selection) = &select.selection {
            self.check_expr(ctx, selection)?;
        }

        Ok(columns)
    }

    fn push_table_columns(
        &self,
        columns: &mut Vec<QueryColumn>,
        table_name: &str,
        joined_nullable: bool,
    ) -> Result<()> {
        let table = self
            .schema
            .get_table(table_name)
            .ok_or_else(|| Error::UnknownTable(table_name.to_string()))?;

        for col in &table.columns {
            columns.push(QueryColumn {
                name: col.name.clone(),
                rust_type: column_type(col, joined_nullable),
            });
        }
        Ok(())
    }

    /// Resolve table references from a FROM item and its joins.
    fn resolve_table_refs(
        &mut self,
        twj: &TableWithJoins,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<()> {
        self.resolve_table_factor(&twj.relation, ctx, false)?;

        for join in &twj.joins {
            let is_left_join = matches!(
                join.join_operator,
                JoinOperator::LeftOuter(_) | JoinOperator::LeftSemi(_) | JoinOperator::LeftAnti(_)
            );
            self.resolve_table_factor(&join.relation, ctx, is_left_join)?;
        }

        Ok(())
    }

    fn resolve_table_factor(
        &mut self,
        factor: &TableFactor,
        ctx: &mut ResolveContext<'_>,
        is_left_joined: bool,
    ) -> Result<()> {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let table_name = name
                    .0
                    .last()
                    .and_then(|part| part.as_ident())
                    .map(|i| i.value.clone())
                    .ok_or_else(|| Error::InvalidQuery("Empty table name".to_string()))?;

                let table = self
                    .schema
                    .get_table(&table_name)
                    .ok_or_else(|| Error::UnknownTable(table_name.clone()))?;

                let alias_name = alias
                    .as_ref()
                    .map(|a| a.name.value.clone())
                    .unwrap_or_else(|| table.name.clone());

                ctx.table_aliases
                    .insert(alias_name.to_lowercase(), table.name.clone());

                if is_left_joined {
                    ctx.left_joined_tables.push(alias_name.to_lowercase());
                }
                Ok(())
            }
            TableFactor::Derived { .. } => Err(Error::InvalidQuery(
                "Derived tables are not supported; use IN (SELECT ...) instead".to_string(),
            )),
            _ => Err(Error::InvalidQuery(
                "Unsupported table reference".to_string(),
            )),
        }
    }

    /// Check that every column an expression references exists, and note
    /// every placeholder it contains.
    ///
    /// Expressions not listed here are rejected rather than skipped, so a
    /// placeholder can never go uncounted.
    fn check_expr(&mut self, ctx: &ResolveContext<'_>, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
                self.infer_expr_type(ctx, expr)?;
            }
            Expr::Value(val) => self.note_value(&val.value),
            Expr::BinaryOp { left, right, .. }
            | Expr::IsDistinctFrom(left, right)
            | Expr::IsNotDistinctFrom(left, right) => {
                self.check_expr(ctx, left)?;
                self.check_expr(ctx, right)?;
            }
            Expr::UnaryOp { expr, .. }
            | Expr::Nested(expr)
            | Expr::IsNull(expr)
            | Expr::IsNotNull(expr)
            | Expr::IsTrue(expr)
            | Expr::IsNotTrue(expr)
            | Expr::IsFalse(expr)
            | Expr::IsNotFalse(expr)
            | Expr::Cast { expr, .. } => self.check_expr(ctx, expr)?,
            Expr::Like { expr, pattern, .. }
            | Expr::ILike { expr, pattern, .. }
            | Expr::SimilarTo { expr, pattern, .. } => {
                self.check_expr(ctx, expr)?;
                self.check_expr(ctx, pattern)?;
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.check_expr(ctx, expr)?;
                self.check_expr(ctx, low)?;
                self.check_expr(ctx, high)?;
            }
            Expr::InList { expr, list, .. } => {
                self.check_expr(ctx, expr)?;
                for item in list {
                    self.check_expr(ctx, item)?;
                }
            }
            Expr::Function(func) => self.check_function(ctx, func)?,
            Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                if let Some(operand) = operand {
                    self.check_expr(ctx, operand)?;
                }
                for when in conditions {
                    self.check_expr(ctx, &when.condition)?;
                    self.check_expr(ctx, &when.result)?;
                }
                if let Some(else_result) = else_result {
                    self.check_expr(ctx, else_result)?;
                }
            }
            Expr::InSubquery { expr, subquery, .. } => {
                self.check_expr(ctx, expr)?;
                self.single_column_subquery(ctx, subquery, "IN")?;
            }
            Expr::Subquery(subquery) => {
                self.single_column_subquery(ctx, subquery, "Scalar")?;
            }
            Expr::Exists { subquery, .. } => {
                self.query(subquery, Some(ctx))?;
            }
            other => {
                return Err(Error::InvalidQuery(format!(
                    "Unsupported expression: {other}"
                )));
            }
        }
        Ok(())
    }

    fn check_function(&mut self, ctx: &ResolveContext<'_>, func: &Function) -> Result<()> {
        match &func.args {
            FunctionArguments::List(list) => {
                for arg in &list.args {
                    let arg = match arg {
                        FunctionArg::Unnamed(arg)
                        | FunctionArg::Named { arg, .. }
                        | FunctionArg::ExprNamed { arg, .. } => arg,
                    };
                    if let FunctionArgExpr::Expr(e) = arg {
                        self.check_expr(ctx, e)?;
                    }
                }
            }
            FunctionArguments::Subquery(subquery) => {
                self.query(subquery, Some(ctx))?;
            }
            FunctionArguments::None => {}
        }

        if let Some(filter) = &func.filter {
            self.check_expr(ctx, filter)?;
        }
        Ok(())
    }

    fn single_column_subquery(
        &mut self,
        ctx: &ResolveContext<'_>,
        subquery: &Query,
        kind: &str,
    ) -> Result<()> {
        let columns = self.query(subquery, Some(ctx))?;
        if columns.len() != 1 {
            return Err(Error::InvalidQuery(format!(
                "{kind} subquery must select exactly one column, got {}",
                columns.len()
            )));
        }
        Ok(())
    }

    fn note_value(&mut self, value: &Value) {
        if let Value::Placeholder(p) = value {
            if let Some(n) = p.strip_prefix('$').and_then(|n| n.parse::<usize>().ok()) {
                self.max_placeholder = self.max_placeholder.max(n);
            }
        }
    }

    /// Infer the output name and type of a projected expression.
    ///
    /// Only bare column references have a name every backend agrees on.
    fn infer_expr_type(
        &mut self,
        ctx: &ResolveContext<'_>,
        expr: &Expr,
    ) -> Result<(Option<String>, RustType)> {
        match expr {
            Expr::Identifier(ident) => {
                let col_name = &ident.value;
                let (joined_nullable, col) = self.find_column_in_tables(ctx, col_name)?;
                Ok((Some(col.name.clone()), column_type(col, joined_nullable)))
            }
            Expr::CompoundIdentifier(idents) => {
                if idents.len() != 2 {
                    return Err(Error::InvalidQuery(format!(
                        "Expected table.column, got {} parts",
                        idents.len()
                    )));
                }

                let table_alias = &idents[0].value;
                let col_name = &idents[1].value;

                let (table_name, joined_nullable) = ctx
                    .lookup_alias(table_alias)
                    .ok_or_else(|| Error::UnknownTable(table_alias.clone()))?;

                let table = self
                    .schema
                    .get_table(table_name)
                    .ok_or_else(|| Error::UnknownTable(table_name.to_string()))?;

                let col = table
                    .get_column(col_name)
                    .ok_or_else(|| Error::UnknownColumn {
                        table: table.name.clone(),
                        column: col_name.clone(),
                    })?;

                Ok((Some(col.name.clone()), column_type(col, joined_nullable)))
            }
            Expr::Function(func) => {
                self.check_function(ctx, func)?;

                let func_name = func
                    .name
                    .0
                    .last()
                    .and_then(|part| part.as_ident())
                    .map(|i| i.value.to_lowercase())
                    .unwrap_or_default();

                let first_arg = self.first_arg_type(ctx, &func.args)?;
                let rust_type = match func_name.as_str() {
                    "count" => RustType::I64,
                    "min" | "max" => first_arg.unwrap_or(RustType::String).nullable(),
                    "coalesce" => first_arg.unwrap_or(RustType::String).non_null(),
                    "upper" | "lower" | "trim" => first_arg.unwrap_or(RustType::String),
                    _ => RustType::Custom(func_name),
                };

                Ok((None, rust_type))
            }
            Expr::Value(val) => {
                self.note_value(&val.value);
                let rust_type = match &val.value {
                    Value::Number(_, _) => RustType::I64,
                    Value::SingleQuotedString(_) => RustType::String,
                    Value::Boolean(_) => RustType::Bool,
                    Value::Null => RustType::String.nullable(),
                    _ => RustType::String,
                };
                Ok((None, rust_type))
            }
            Expr::Cast {
                expr, data_type, ..
            } => {
                self.check_expr(ctx, expr)?;
                let rust_type = SqlType::from_sql_name(&data_type.to_string()).to_rust_type();
                Ok((None, rust_type))
            }
            Expr::BinaryOp { left, op, right } => {
                self.check_expr(ctx, right)?;
                let (_, left_type) = self.infer_expr_type(ctx, left)?;
                let rust_type = match op {
                    BinaryOperator::Eq
                    | BinaryOperator::NotEq
                    | BinaryOperator::Lt
                    | BinaryOperator::LtEq
                    | BinaryOperator::Gt
                    | BinaryOperator::GtEq
                    | BinaryOperator::And
                    | BinaryOperator::Or => RustType::Bool,
                    _ => left_type,
                };
                Ok((None, rust_type))
            }
            Expr::Nested(inner) => {
                let (_, rust_type) = self.infer_expr_type(ctx, inner)?;
                Ok((None, rust_type))
            }
            Expr::Case {
                conditions,
                else_result,
                ..
            } => {
                self.check_expr(ctx, expr)?;
                let rust_type = match conditions.first() {
                    Some(when) => self.infer_expr_type(ctx, &when.result)?.1,
                    None => RustType::String,
                };
                // No ELSE means NULL when nothing matches
                if else_result.is_none() {
                    Ok((None, rust_type.nullable()))
                } else {
                    Ok((None, rust_type))
                }
            }
            other => {
                self.check_expr(ctx, other)?;
                Ok((None, RustType::String))
            }
        }
    }

    fn first_arg_type(
        &mut self,
        ctx: &ResolveContext<'_>,
        args: &FunctionArguments,
    ) -> Result<Option<RustType>> {
        match args {
            FunctionArguments::List(list) => {
                if let Some(FunctionArg::Unnamed(FunctionArgExpr::Expr(e))) = list.args.first() {
                    let (_, inner_type) = self.infer_expr_type(ctx, e)?;
                    return Ok(Some(inner_type));
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Find an unqualified column in the tables of the innermost scope that has it.
    fn find_column_in_tables(
        &self,
        ctx: &ResolveContext<'_>,
        col_name: &str,
    ) -> Result<(bool, &'s Column)> {
        let mut found: Option<(bool, &'s Column)> = None;

        for (alias, table_name) in &ctx.table_aliases {
            if let Some(table) = self.schema.get_table(table_name) {
                if let Some(col) = table.get_column(col_name) {
                    if found.is_some() {
                        return Err(Error::AmbiguousColumn(col_name.to_string()));
                    }
                    found = Some((ctx.is_nullable_table(alias), col));
                }
            }
        }

        match (found, ctx.parent) {
            (Some(hit), _) => Ok(hit),
            (None, Some(parent)) => self.find_column_in_tables(parent, col_name),
            (None, None) => Err(Error::UnknownColumn {
                table: "<unknown>".to_string(),
                column: col_name.to_string(),
            }),
        }
    }
}

fn column_type(col: &Column, joined_nullable: bool) -> RustType {
    let rust_type = col.data_type.to_rust_type();
    if col.nullable || joined_nullable {
        rust_type.nullable()
    } else {
        rust_type
    }
}

fn join_constraint(op: &JoinOperator) -> Option<&JoinConstraint> {
    match op {
        JoinOperator::Inner(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c) => Some(c),
        _ => None,
    }
}
