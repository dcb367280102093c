//! Passing fewer arguments than the query has placeholders fails to compile.

use hero_query_macros::query;

fn main() {
    let _q = query!(r#"SELECT "HeroName" FROM "Hero" WHERE "RaceId" = $1 AND "LocationId" = $2"#, 2_i32);
}
