//! Test support for hero-query.
//!
//! Provisions the heroes fixture database and compares formatted query
//! output with expected literals. Provisioning lives here, not in
//! `hero-query`, which only ever reads.

use hero_query::schema::HEROES_SCHEMA_SQL;
use hero_query::{check_eq, join, Database, DatabaseConfig};
use std::fmt::Display;

/// Fixture rows for the heroes schema.
pub const SEED_SQL: &str = include_str!("../fixtures/seed.sql");

/// Output of each heroes query over the fixture rows.
pub mod expected {
    pub const RACES: &str = "1,Mutant;2,Human";

    pub const HUMANS: &str =
        "Hulk,Canadian Rockies;Spider Man,New York, New York;Iron Man,New York, New York";

    pub const ACCELERATED_HEALING: &str = "Wolverine;Spider Man";

    pub const ABILITIES_OF_HEALERS: &str = "Spider Man, Accelerated Healing
Spider Man, Genius intellect
Spider Man, Spider-sense
Spider Man, Superhuman agility
Spider Man, Superhuman strength
Spider Man, Wall-crawling
Wolverine, Accelerated Healing
Wolverine, Adamantium skeleton
Wolverine, Expert martial artist
Wolverine, Longevity
Wolverine, Retractable claws
Wolverine, Super-human senses";

    pub const AVENGERS_VILLAINS: &str = r#"General Thaddeus "Thunderbolt" Ross
Abomination
The Leader
Mandarin
Obadiah Stane
Whiplash
Green Goblin
Doctor Octopus
Kingpin"#;
}

/// Create the schema and load the fixture rows.
pub async fn provision(db: &Database) -> hero_query::Result<()> {
    for script in [HEROES_SCHEMA_SQL, SEED_SQL] {
        let result = match (db.as_sqlite(), db.as_postgres()) {
            (Some(pool), _) => sqlx::raw_sql(script).execute(pool).await.map(|_| ()),
            (_, Some(pool)) => sqlx::raw_sql(script).execute(pool).await.map(|_| ()),
            (None, None) => Ok(()),
        };
        result.map_err(hero_query::Error::from_sqlx)?;
    }
    tracing::debug!(backend = db.backend(), "fixture database provisioned");
    Ok(())
}

/// A fresh, provisioned in-memory database; each call gets its own.
pub async fn connect() -> Database {
    hero_query::logging::init_test_logging();

    let db = Database::connect(&DatabaseConfig::default().url)
        .await
        .expect("Failed to open in-memory database");
    provision(&db).await.expect("Failed to provision fixtures");
    db
}

/// Connect to the configured database, which must already hold the fixtures.
pub async fn connect_configured() -> hero_query::Result<Database> {
    hero_query::logging::init_test_logging();

    let config = DatabaseConfig::from_env()?;
    let db = Database::connect(&config.url).await?;
    if config.is_sqlite() {
        provision(&db).await?;
    }
    Ok(db)
}

/// Join `rows` with `separator` and assert the result equals `expected` byte for byte.
#[track_caller]
pub fn assert_output<I>(rows: I, separator: &str, expected: &str)
where
    I: IntoIterator,
    I::Item: Display,
{
    let actual = join(rows, separator);
    if let Err(mismatch) = check_eq(&actual, expected) {
        panic!("{mismatch}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hero_query::Param;
    use hero_query_macros::query;

    #[test]
    fn test_query_preserves_sql() {
        let q = query!(r#"SELECT "RaceId", "RaceName" FROM "Race""#);
        assert_eq!(q.sql(), r#"SELECT "RaceId", "RaceName" FROM "Race""#);
        assert!(q.params().is_empty());
    }

    #[test]
    fn test_query_binds_params_in_order() {
        let team = "Avengers".to_string();
        let q = query!(
            r#"
            SELECT v."VillainName"
            FROM "Villain" v
            INNER JOIN "Enemy" e ON e."VillainId" = v."VillainId"
            WHERE e."HeroId" IN (
                SELECT ht."HeroId" FROM "HeroTeam" ht
                INNER JOIN "Team" t ON t."TeamId" = ht."TeamId"
                WHERE t."TeamName" = $1
            ) AND v."VillainId" > $2
            "#,
            team,
            3_i32
        );

        assert_eq!(
            q.params(),
            &[Param::Text("Avengers".to_string()), Param::Int(3)]
        );
    }

    #[test]
    fn test_assert_output_passes_on_match() {
        assert_output(["1,Mutant", "2,Human"], ";", "1,Mutant;2,Human");
    }

    #[test]
    #[should_panic(expected = "Output mismatch")]
    fn test_assert_output_panics_on_order() {
        assert_output(["2,Human", "1,Mutant"], ";", "1,Mutant;2,Human");
    }
}
