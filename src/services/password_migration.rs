use tracing::info;

use crate::error::Result;
use crate::store::PersonStore;
use crate::utils::crypto;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub hashed: usize,
    pub skipped: usize,
}

/// Replaces every stored password that is not yet a hash with its Argon2 hash.
/// Safe to run repeatedly.
pub async fn hash_plaintext_passwords(store: &dyn PersonStore) -> Result<MigrationReport> {
    let mut report = MigrationReport::default();

    for (person_id, stored) in store.list_stored_passwords().await? {
        if crypto::is_password_hash(&stored) {
            report.skipped += 1;
            continue;
        }
        let hashed = crypto::hash_password_off_thread(stored).await?;
        store.set_password_hash(person_id, &hashed).await?;
        info!(person_id, "Password hashed");
        report.hashed += 1;
    }

    Ok(report)
}
