//! The heroes queries.
//!
//! Each query is built as a [`Select`] first and executed second, so the
//! rendered SQL can be inspected without a database. Row order is always
//! pinned with ORDER BY; see the individual builders for the sort keys.

use crate::error::Result;
use crate::expr::{Select, TableRef};
use crate::runtime::Database;
use std::fmt;

/// Separator between rows of the single-line outputs.
pub const ROW_SEPARATOR: &str = ";";

/// Separator between rows of the multi-line outputs.
pub const LINE_SEPARATOR: &str = "\n";

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
#[sqlx(rename_all = "PascalCase")]
pub struct Race {
    pub race_id: i32,
    pub race_name: String,
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.race_id, self.race_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
#[sqlx(rename_all = "PascalCase")]
pub struct HeroLocation {
    pub hero_name: String,
    pub location_name: String,
}

impl fmt::Display for HeroLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.hero_name, self.location_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
#[sqlx(rename_all = "PascalCase")]
pub struct HeroName {
    pub hero_name: String,
}

impl fmt::Display for HeroName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hero_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
#[sqlx(rename_all = "PascalCase")]
pub struct HeroAbility {
    pub hero_name: String,
    pub ability_name: String,
}

impl fmt::Display for HeroAbility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.hero_name, self.ability_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
#[sqlx(rename_all = "PascalCase")]
pub struct VillainName {
    pub villain_name: String,
}

impl fmt::Display for VillainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.villain_name)
    }
}

/// Every race, in fixture order.
pub fn races_query() -> Select {
    let race = TableRef::new("Race", "r");

    Select::from(&race)
        .project([race.col("RaceId"), race.col("RaceName")])
        .order_by(race.col("RaceId"))
}

/// Heroes of one race with the place they live.
///
/// Heroes without a location drop out of the inner join: a null
/// `LocationId` matches no location, not even another null.
pub fn heroes_of_race_query(race_name: &str) -> Select {
    let hero = TableRef::new("Hero", "h");
    let location = TableRef::new("Location", "l");
    let race = TableRef::new("Race", "r");

    Select::from(&hero)
        .inner_join(
            &location,
            hero.col("LocationId").nullable_eq(location.col("LocationId")),
        )
        .inner_join(&race, hero.col("RaceId").eq_col(race.col("RaceId")))
        .filter(race.col("RaceName").eq_param(race_name))
        .project([hero.col("HeroName"), location.col("LocationName")])
        .order_by(hero.col("HeroId"))
}

/// Heroes that have the named ability.
pub fn heroes_with_ability_query(ability_name: &str) -> Select {
    let hero = TableRef::new("Hero", "h");
    let hero_ability = TableRef::new("HeroAbility", "ha");
    let ability = TableRef::new("Ability", "a");

    Select::from(&hero)
        .inner_join(&hero_ability, hero.col("HeroId").eq_col(hero_ability.col("HeroId")))
        .inner_join(
            &ability,
            hero_ability.col("AbilityId").eq_col(ability.col("AbilityId")),
        )
        .filter(ability.col("AbilityName").eq_param(ability_name))
        .project([hero.col("HeroName")])
        .order_by(hero.col("HeroId"))
}

/// Ids of heroes that have the named ability; meant to be used as a subquery.
pub fn hero_ids_with_ability(ability_name: &str) -> Select {
    let hero_ability = TableRef::new("HeroAbility", "sha");
    let ability = TableRef::new("Ability", "sa");

    Select::from(&hero_ability)
        .inner_join(
            &ability,
            hero_ability.col("AbilityId").eq_col(ability.col("AbilityId")),
        )
        .filter(ability.col("AbilityName").eq_param(ability_name))
        .project([hero_ability.col("HeroId")])
}

/// Every ability of every hero that has `ability_name`, sorted by hero then ability.
pub fn abilities_of_heroes_with_query(ability_name: &str) -> Select {
    let hero = TableRef::new("Hero", "h");
    let hero_ability = TableRef::new("HeroAbility", "ha");
    let ability = TableRef::new("Ability", "a");

    Select::from(&hero)
        .inner_join(&hero_ability, hero.col("HeroId").eq_col(hero_ability.col("HeroId")))
        .inner_join(
            &ability,
            hero_ability.col("AbilityId").eq_col(ability.col("AbilityId")),
        )
        .filter(hero.col("HeroId").in_subquery(hero_ids_with_ability(ability_name)))
        .project([hero.col("HeroName"), ability.col("AbilityName")])
        .order_by(hero.col("HeroName"))
        .order_by(ability.col("AbilityName"))
}

/// Ids of the members of the named team; meant to be used as a subquery.
pub fn hero_ids_in_team(team_name: &str) -> Select {
    let hero_team = TableRef::new("HeroTeam", "sht");
    let team = TableRef::new("Team", "st");

    Select::from(&hero_team)
        .inner_join(&team, hero_team.col("TeamId").eq_col(team.col("TeamId")))
        .filter(team.col("TeamName").eq_param(team_name))
        .project([hero_team.col("HeroId")])
}

/// Villains fought by members of the named team.
///
/// Sorted by the name of the hero who fought them, which is not part of the
/// output. Villains of the same hero keep `VillainId` order.
pub fn villains_fought_by_team_query(team_name: &str) -> Select {
    let hero = TableRef::new("Hero", "h");
    let enemy = TableRef::new("Enemy", "e");
    let villain = TableRef::new("Villain", "v");

    Select::from(&hero)
        .inner_join(&enemy, hero.col("HeroId").eq_col(enemy.col("HeroId")))
        .inner_join(&villain, enemy.col("VillainId").eq_col(villain.col("VillainId")))
        .filter(hero.col("HeroId").in_subquery(hero_ids_in_team(team_name)))
        .project([villain.col("VillainName")])
        .order_by(hero.col("HeroName"))
        .order_by(villain.col("VillainId"))
}

pub async fn list_races(db: &Database) -> Result<Vec<Race>> {
    races_query().into_query().fetch_all(db).await
}

pub async fn heroes_of_race(db: &Database, race_name: &str) -> Result<Vec<HeroLocation>> {
    heroes_of_race_query(race_name)
        .into_query()
        .fetch_all(db)
        .await
}

pub async fn heroes_with_ability(db: &Database, ability_name: &str) -> Result<Vec<HeroName>> {
    heroes_with_ability_query(ability_name)
        .into_query()
        .fetch_all(db)
        .await
}

/// Runs as one statement; the ability subquery is never fetched on its own.
pub async fn abilities_of_heroes_with(
    db: &Database,
    ability_name: &str,
) -> Result<Vec<HeroAbility>> {
    abilities_of_heroes_with_query(ability_name)
        .into_query()
        .fetch_all(db)
        .await
}

pub async fn villains_fought_by_team(db: &Database, team_name: &str) -> Result<Vec<VillainName>> {
    villains_fought_by_team_query(team_name)
        .into_query()
        .fetch_all(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::types::RustType;
    use crate::validate::validate_query;

    fn check(select: &Select) -> Vec<RustType> {
        let (sql, params) = select.to_sql();
        let result = validate_query(&Schema::heroes().unwrap(), &sql).unwrap();
        assert_eq!(result.param_count, params.len(), "{sql}");
        result.columns.into_iter().map(|c| c.rust_type).collect()
    }

    #[test]
    fn test_every_query_matches_schema() {
        assert_eq!(check(&races_query()), vec![RustType::I32, RustType::String]);
        assert_eq!(
            check(&heroes_of_race_query("Human")),
            vec![RustType::String, RustType::String]
        );
        assert_eq!(
            check(&heroes_with_ability_query("Accelerated Healing")),
            vec![RustType::String]
        );
        assert_eq!(
            check(&abilities_of_heroes_with_query("Accelerated Healing")),
            vec![RustType::String, RustType::String]
        );
        assert_eq!(
            check(&villains_fought_by_team_query("Avengers")),
            vec![RustType::String]
        );
    }

    #[test]
    fn test_subquery_is_inlined_not_executed() {
        let (sql, params) = abilities_of_heroes_with_query("Accelerated Healing").to_sql();

        assert_eq!(sql.matches("SELECT").count(), 2);
        assert!(sql.contains(r#""h"."HeroId" IN (SELECT "sha"."HeroId" AS "HeroId" FROM "HeroAbility" AS "sha""#));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_villains_sorted_by_hero_name() {
        let (sql, _) = villains_fought_by_team_query("Avengers").to_sql();
        assert!(sql.ends_with(r#"ORDER BY "h"."HeroName" ASC, "v"."VillainId" ASC"#));
    }

    #[test]
    fn test_location_join_is_null_safe() {
        let (sql, _) = heroes_of_race_query("Human").to_sql();
        assert!(sql.contains(r#""h"."LocationId" IS NOT NULL"#));
    }

    #[test]
    fn test_row_display() {
        let race = Race {
            race_id: 1,
            race_name: "Mutant".to_string(),
        };
        let pair = HeroAbility {
            hero_name: "Wolverine".to_string(),
            ability_name: "Longevity".to_string(),
        };

        assert_eq!(race.to_string(), "1,Mutant");
        assert_eq!(pair.to_string(), "Wolverine, Longevity");
    }
}
