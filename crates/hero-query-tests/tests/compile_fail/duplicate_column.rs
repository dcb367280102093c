//! Two output columns that would become the same field fail to compile.

use hero_query_macros::query;

fn main() {
    let _q = query!(r#"SELECT h."HeroId", e."HeroId" FROM "Hero" h INNER JOIN "Enemy" e ON e."HeroId" = h."HeroId""#);
}
