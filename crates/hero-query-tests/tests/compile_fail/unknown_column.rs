//! Selecting a column the table does not have fails to compile.

use hero_query_macros::query;

fn main() {
    let _q = query!(r#"SELECT h."Power" FROM "Hero" h"#);
}
