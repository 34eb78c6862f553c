//! Opaque identifier generation for nodes and versions.
//!
//! Collision probability is low enough that no duplicate ever occurs in
//! practice; callers rely on `(session, path)` uniqueness for correctness,
//! never on id uniqueness.

use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
