//! A computed column without a name fails to compile.

use hero_query_macros::query;

fn main() {
    let _q = query!(r#"SELECT COUNT(*) FROM "Villain""#);
}
