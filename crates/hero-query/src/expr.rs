//! Composable query expressions.
//!
//! A [`Select`] is a value: building one runs nothing. It becomes SQL only
//! when rendered, and a `Select` used as an `IN` predicate is rendered
//! inline into the outer statement, so the whole query reaches the
//! database as one round trip.

use std::fmt::Write as _;

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Int(i64),
    Text(String),
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<&String> for Param {
    fn from(value: &String) -> Self {
        Param::Text(value.clone())
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Param::Int(value.into())
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

/// Quote an identifier so mixed-case names survive on every backend.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// A table in the FROM clause, always aliased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
        }
    }

    /// A column of this table, qualified by the alias.
    pub fn col(&self, name: impl Into<String>) -> ColumnRef {
        ColumnRef {
            qualifier: self.alias.clone(),
            name: name.into(),
        }
    }

    fn render(&self, out: &mut String) {
        let _ = write!(out, "{} AS {}", quote_ident(&self.name), quote_ident(&self.alias));
    }
}

/// A qualified column reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub qualifier: String,
    pub name: String,
}

impl ColumnRef {
    fn render(&self, out: &mut String) {
        let _ = write!(out, "{}.{}", quote_ident(&self.qualifier), quote_ident(&self.name));
    }

    pub fn eq_col(self, other: ColumnRef) -> Condition {
        Condition::Eq(self, other)
    }

    /// Equality for nullable keys: a null on either side matches nothing.
    pub fn nullable_eq(self, other: ColumnRef) -> Condition {
        Condition::NullableEq(self, other)
    }

    pub fn eq_param(self, value: impl Into<Param>) -> Condition {
        Condition::EqParam(self, value.into())
    }

    /// Membership in the single column a subquery selects.
    pub fn in_subquery(self, subquery: Select) -> Condition {
        Condition::InSubquery(self, Box::new(subquery))
    }
}

/// Boolean conditions for ON and WHERE clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Plain equality between non-null keys.
    Eq(ColumnRef, ColumnRef),
    /// Rendered as `l IS NOT NULL AND r IS NOT NULL AND l = r`.
    NullableEq(ColumnRef, ColumnRef),
    EqParam(ColumnRef, Param),
    InSubquery(ColumnRef, Box<Select>),
    And(Vec<Condition>),
}

impl Condition {
    fn render(&self, out: &mut String, params: &mut Vec<Param>) {
        match self {
            Condition::Eq(left, right) => {
                left.render(out);
                out.push_str(" = ");
                right.render(out);
            }
            Condition::NullableEq(left, right) => {
                out.push('(');
                left.render(out);
                out.push_str(" IS NOT NULL AND ");
                right.render(out);
                out.push_str(" IS NOT NULL AND ");
                left.render(out);
                out.push_str(" = ");
                right.render(out);
                out.push(')');
            }
            Condition::EqParam(column, value) => {
                params.push(value.clone());
                column.render(out);
                let _ = write!(out, " = ${}", params.len());
            }
            Condition::InSubquery(column, subquery) => {
                column.render(out);
                out.push_str(" IN (");
                subquery.render(out, params);
                out.push(')');
            }
            Condition::And(conditions) => {
                for (i, condition) in conditions.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" AND ");
                    }
                    condition.render(out, params);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Join {
    table: TableRef,
    on: Condition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OrderBy {
    column: ColumnRef,
    descending: bool,
}

/// A SELECT statement under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    from: TableRef,
    joins: Vec<Join>,
    projection: Vec<ColumnRef>,
    filters: Vec<Condition>,
    order_by: Vec<OrderBy>,
}

impl Select {
    pub fn from(table: &TableRef) -> Self {
        Self {
            from: table.clone(),
            joins: Vec::new(),
            projection: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
        }
    }

    #[must_use]
    pub fn inner_join(mut self, table: &TableRef, on: Condition) -> Self {
        self.joins.push(Join {
            table: table.clone(),
            on,
        });
        self
    }

    /// Add a WHERE condition; multiple filters are ANDed.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filters.push(condition);
        self
    }

    #[must_use]
    pub fn project(mut self, columns: impl IntoIterator<Item = ColumnRef>) -> Self {
        self.projection.extend(columns);
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: ColumnRef) -> Self {
        self.order_by.push(OrderBy {
            column,
            descending: false,
        });
        self
    }

    #[must_use]
    pub fn order_by_desc(mut self, column: ColumnRef) -> Self {
        self.order_by.push(OrderBy {
            column,
            descending: true,
        });
        self
    }

    /// Render to SQL with `$N` placeholders and the parameters in bind order.
    pub fn to_sql(&self) -> (String, Vec<Param>) {
        let mut out = String::new();
        let mut params = Vec::new();
        self.render(&mut out, &mut params);
        (out, params)
    }

    fn render(&self, out: &mut String, params: &mut Vec<Param>) {
        out.push_str("SELECT ");
        if self.projection.is_empty() {
            out.push('*');
        }
        for (i, column) in self.projection.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            // Explicit output names; backends differ on what an unaliased column is called
            column.render(out);
            let _ = write!(out, " AS {}", quote_ident(&column.name));
        }

        out.push_str(" FROM ");
        self.from.render(out);

        for join in &self.joins {
            out.push_str(" INNER JOIN ");
            join.table.render(out);
            out.push_str(" ON ");
            join.on.render(out, params);
        }

        if !self.filters.is_empty() {
            out.push_str(" WHERE ");
            for (i, filter) in self.filters.iter().enumerate() {
                if i > 0 {
                    out.push_str(" AND ");
                }
                filter.render(out, params);
            }
        }

        if !self.order_by.is_empty() {
            out.push_str(" ORDER BY ");
            for (i, order) in self.order_by.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                order.column.render(out);
                out.push_str(if order.descending { " DESC" } else { " ASC" });
            }
        }
    }
}

/// SQL equality over nullable values: `None` (unknown) when either side is null.
///
/// Unlike `Option == Option`, two nulls are not equal.
pub fn sql_eq<T: PartialEq + ?Sized>(left: Option<&T>, right: Option<&T>) -> Option<bool> {
    match (left, right) {
        (Some(l), Some(r)) => Some(l == r),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::validate::validate_query;

    #[test]
    fn test_render_simple_select() {
        let race = TableRef::new("Race", "r");
        let (sql, params) = Select::from(&race)
            .project([race.col("RaceId"), race.col("RaceName")])
            .order_by(race.col("RaceId"))
            .to_sql();

        assert_eq!(
            sql,
            r#"SELECT "r"."RaceId" AS "RaceId", "r"."RaceName" AS "RaceName" FROM "Race" AS "r" ORDER BY "r"."RaceId" ASC"#
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_nullable_eq_guards_both_sides() {
        let hero = TableRef::new("Hero", "h");
        let location = TableRef::new("Location", "l");
        let (sql, _) = Select::from(&hero)
            .inner_join(&location, hero.col("LocationId").nullable_eq(location.col("LocationId")))
            .project([hero.col("HeroName")])
            .to_sql();

        assert!(sql.contains(
            r#"ON ("h"."LocationId" IS NOT NULL AND "l"."LocationId" IS NOT NULL AND "h"."LocationId" = "l"."LocationId")"#
        ));
    }

    #[test]
    fn test_subquery_params_are_numbered_in_order() {
        let hero = TableRef::new("Hero", "h");
        let hero_team = TableRef::new("HeroTeam", "ht");
        let team = TableRef::new("Team", "t");

        let members = Select::from(&hero_team)
            .inner_join(&team, hero_team.col("TeamId").eq_col(team.col("TeamId")))
            .filter(team.col("TeamName").eq_param("Avengers"))
            .project([hero_team.col("HeroId")]);

        let (sql, params) = Select::from(&hero)
            .filter(hero.col("HeroId").in_subquery(members))
            .filter(hero.col("HeroName").eq_param("Hulk"))
            .project([hero.col("HeroName")])
            .to_sql();

        assert!(sql.contains(r#""t"."TeamName" = $1)"#));
        assert!(sql.ends_with(r#""h"."HeroName" = $2"#));
        assert_eq!(
            params,
            vec![Param::from("Avengers"), Param::from("Hulk")]
        );
    }

    #[test]
    fn test_rendered_sql_passes_schema_check() {
        let schema = Schema::heroes().unwrap();
        let hero = TableRef::new("Hero", "h");
        let enemy = TableRef::new("Enemy", "e");
        let villain = TableRef::new("Villain", "v");

        let (sql, params) = Select::from(&hero)
            .inner_join(&enemy, hero.col("HeroId").eq_col(enemy.col("HeroId")))
            .inner_join(&villain, enemy.col("VillainId").eq_col(villain.col("VillainId")))
            .filter(hero.col("HeroName").eq_param("Hulk"))
            .project([villain.col("VillainName")])
            .order_by_desc(hero.col("HeroName"))
            .to_sql();

        let checked = validate_query(&schema, &sql).unwrap();
        assert_eq!(checked.columns.len(), 1);
        assert_eq!(checked.param_count, params.len());
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("Hero"), "\"Hero\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_sql_eq_is_three_valued() {
        assert_eq!(sql_eq(Some(&1), Some(&1)), Some(true));
        assert_eq!(sql_eq(Some(&1), Some(&2)), Some(false));
        assert_eq!(sql_eq::<i32>(None, Some(&1)), None);
        assert_eq!(sql_eq::<i32>(None, None), None);
    }
}
