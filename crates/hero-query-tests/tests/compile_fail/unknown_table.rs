//! Querying a table the schema does not define fails to compile.

use hero_query_macros::query;

fn main() {
    let _q = query!(r#"SELECT "Name" FROM "Sidekick""#);
}
