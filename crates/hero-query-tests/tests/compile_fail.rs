//! Queries that do not match the heroes schema must fail to compile.

use std::path::PathBuf;

#[test]
fn compile_fail_tests() {
    let schema_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../hero-query/schema.sql");
    std::env::set_var("HERO_QUERY_SCHEMA", &schema_path);

    let t = trybuild::TestCases::new();
    t.compile_fail("tests/compile_fail/*.rs");
}
