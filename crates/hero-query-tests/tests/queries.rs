//! The five heroes queries against the fixture database.
//!
//! Every test gets its own in-memory SQLite database, so they run in parallel.

use hero_query::heroes::{self, LINE_SEPARATOR, ROW_SEPARATOR};
use hero_query::{Database, Error, Schema};
use hero_query_tests::{assert_output, connect, expected};

#[tokio::test]
async fn test_list_races() {
    let db = connect().await;

    let races = heroes::list_races(&db).await.unwrap();

    assert_output(races, ROW_SEPARATOR, expected::RACES);
}

#[tokio::test]
async fn test_heroes_of_race_with_location() {
    let db = connect().await;

    let heroes = heroes::heroes_of_race(&db, "Human").await.unwrap();

    assert_output(heroes, ROW_SEPARATOR, expected::HUMANS);
}

#[tokio::test]
async fn test_heroes_with_ability() {
    let db = connect().await;

    let heroes = heroes::heroes_with_ability(&db, "Accelerated Healing")
        .await
        .unwrap();

    assert_output(heroes, ROW_SEPARATOR, expected::ACCELERATED_HEALING);
}

#[tokio::test]
async fn test_abilities_of_heroes_with_ability() {
    let db = connect().await;

    let rows = heroes::abilities_of_heroes_with(&db, "Accelerated Healing")
        .await
        .unwrap();

    assert_output(rows, LINE_SEPARATOR, expected::ABILITIES_OF_HEALERS);
}

#[tokio::test]
async fn test_villains_fought_by_team() {
    let db = connect().await;

    let villains = heroes::villains_fought_by_team(&db, "Avengers")
        .await
        .unwrap();

    assert_output(villains, LINE_SEPARATOR, expected::AVENGERS_VILLAINS);
}

#[tokio::test]
async fn test_queries_are_repeatable() {
    let db = connect().await;

    assert_eq!(
        heroes::list_races(&db).await.unwrap(),
        heroes::list_races(&db).await.unwrap()
    );
    assert_eq!(
        heroes::heroes_of_race(&db, "Human").await.unwrap(),
        heroes::heroes_of_race(&db, "Human").await.unwrap()
    );
    assert_eq!(
        heroes::heroes_with_ability(&db, "Accelerated Healing").await.unwrap(),
        heroes::heroes_with_ability(&db, "Accelerated Healing").await.unwrap()
    );
    assert_eq!(
        heroes::abilities_of_heroes_with(&db, "Accelerated Healing")
            .await
            .unwrap(),
        heroes::abilities_of_heroes_with(&db, "Accelerated Healing")
            .await
            .unwrap()
    );
    assert_eq!(
        heroes::villains_fought_by_team(&db, "Avengers").await.unwrap(),
        heroes::villains_fought_by_team(&db, "Avengers").await.unwrap()
    );
}

#[tokio::test]
async fn test_heroes_without_location_are_left_out() {
    let db = connect().await;

    // Daredevil is Human but has no location.
    let humans = heroes::heroes_of_race(&db, "Human").await.unwrap();
    assert!(humans.iter().all(|h| h.hero_name != "Daredevil"));

    // Silver Surfer has neither race nor location; the Mutant list only has Wolverine.
    let mutants = heroes::heroes_of_race(&db, "Mutant").await.unwrap();
    assert_output(mutants, ROW_SEPARATOR, "Wolverine,Canadian Rockies");
}

#[tokio::test]
async fn test_unknown_names_give_empty_output() {
    let db = connect().await;

    assert!(heroes::heroes_of_race(&db, "Kree").await.unwrap().is_empty());
    assert!(heroes::heroes_with_ability(&db, "Invisibility")
        .await
        .unwrap()
        .is_empty());
    assert!(heroes::abilities_of_heroes_with(&db, "Invisibility")
        .await
        .unwrap()
        .is_empty());
    assert!(heroes::villains_fought_by_team(&db, "Inhumans")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_queries_pass_runtime_schema_check() {
    let db = connect().await.checked(Schema::heroes().unwrap());

    assert_eq!(heroes::list_races(&db).await.unwrap().len(), 2);
    assert_eq!(
        heroes::villains_fought_by_team(&db, "Avengers")
            .await
            .unwrap()
            .len(),
        9
    );
}

#[tokio::test]
async fn test_missing_table_is_query_error() {
    hero_query::logging::init_test_logging();
    let db = Database::connect("sqlite::memory:").await.unwrap();

    let err = heroes::list_races(&db).await.unwrap_err();

    assert!(matches!(err, Error::Query(_)), "{err}");
    assert!(!err.is_connection());
}

#[tokio::test]
async fn test_unreachable_database_is_connection_error() {
    hero_query::logging::init_test_logging();

    let err = Database::connect("sqlite:/nonexistent/heroes.db?mode=ro")
        .await
        .unwrap_err();

    assert!(err.is_connection(), "{err}");
}
