//! Only SELECT statements are accepted.

use hero_query_macros::query;

fn main() {
    let _q = query!(r#"DELETE FROM "Villain""#);
}
