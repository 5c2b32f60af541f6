//! Scenario: writing a key whose name nearly matches an existing one warns
//! about the overlap without blocking the write.

mod support;

use support::Harness;
use taskgraph_core::handlers;
use taskgraph_core::Category;

#[test]
fn similar_key_write_surfaces_a_warning() {
    let h = Harness::new();
    {
        let conn = h.store.writer();
        handlers::open(&conn, Some("knowledge"), None, "agent").unwrap();
    }

    {
        let conn = h.store.writer();
        handlers::knowledge_write(&conn, "knowledge", "auth-design", "use JWTs with short expiry", Category::General, None, "agent").unwrap();
    }

    let outcome = {
        let conn = h.store.writer();
        handlers::knowledge_write(&conn, "knowledge", "authdesign", "use JWTs with short expiry, rotate keys", Category::General, None, "agent").unwrap()
    };

    assert!(outcome.similar_keys.contains(&"auth-design".to_string()));

    let all = {
        let conn = h.store.reader();
        handlers::knowledge_read(&conn, "knowledge", None).unwrap()
    };
    assert_eq!(all.len(), 2);
}
