use rand::seq::IndexedRandom;
use sqlx::SqlitePool;

/// No 0/O/1/I: join codes get typed by hand.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub(crate) fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| *ALPHABET.choose(&mut rng).unwrap() as char)
        .collect()
}

/// Five attempts at a verified-unique 6-char code, then an unverified 8-char
/// fallback. The fallback is collision-improbable, not collision-proof; the
/// UNIQUE constraint on `rooms.code` is the last line of defense.
pub(crate) async fn generate_unique_code(db_pool: &SqlitePool) -> Result<String, sqlx::Error> {
    for _ in 0..5 {
        let code = generate_code(6);
        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM rooms WHERE code=?")
            .bind(&code)
            .fetch_optional(db_pool)
            .await?;
        if exists.is_none() {
            return Ok(code);
        }
    }
    Ok(generate_code(8))
}
