//! Batch Validator
//!
//! Classifies one bounded batch of candidate identities against a project's
//! authoritative store in a single round trip. The caller owns batching and
//! applies the returned verdicts; nothing here touches the metadata store.

use std::collections::HashMap;

use crate::models::{InvalidReason, ValidationMode, Verdict};
use crate::stores::{AuthoritativeStore, StoreError};

/// Verdicts for one batch, aligned with the input identities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub verdicts: Vec<Verdict>,
    /// 0 when no key in the batch was queryable, otherwise 1
    pub store_queries: usize,
}

/// MediaWiki canonical user name: trimmed, underscores as spaces, first
/// character upper-cased
pub fn canonical_user_name(raw: &str) -> String {
    let name = raw.trim().replace('_', " ");
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Numeric id key, if the identity is a non-negative integer
fn parse_user_id(raw: &str) -> Option<i64> {
    let key = raw.trim();
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

pub struct BatchValidator {
    mode: ValidationMode,
}

impl BatchValidator {
    pub fn new(mode: ValidationMode) -> Self {
        Self { mode }
    }

    /// Classify `identities` against `store`
    ///
    /// **Algorithm:**
    /// 1. Build a lookup from key to input positions (duplicated keys share one entry)
    /// 2. Id mode: non-numeric identities are invalid at once and never queried
    /// 3. One query for all remaining keys
    /// 4. Matches become valid with the authoritative name
    /// 5. Keys left in the lookup become invalid
    ///
    /// A store error fails the whole batch: no verdicts are returned.
    pub async fn validate(
        &self,
        store: &dyn AuthoritativeStore,
        identities: &[&str],
    ) -> Result<BatchOutcome, StoreError> {
        let mut verdicts: Vec<Option<Verdict>> = vec![None; identities.len()];

        let store_queries = match self.mode {
            ValidationMode::ByUserId => {
                let mut pending: HashMap<i64, Vec<usize>> = HashMap::new();
                for (i, raw) in identities.iter().enumerate() {
                    match parse_user_id(raw) {
                        Some(id) => pending.entry(id).or_default().push(i),
                        None => verdicts[i] = Some(Verdict::Invalid(InvalidReason::UserId(raw.to_string()))),
                    }
                }

                if pending.is_empty() {
                    0
                } else {
                    let keys: Vec<i64> = pending.keys().copied().collect();
                    for found in store.find_by_ids(&keys).await? {
                        for i in pending.remove(&found.user_id).unwrap_or_default() {
                            verdicts[i] = Some(Verdict::Valid {
                                user_id: found.user_id,
                                user_name: found.user_name.clone(),
                            });
                        }
                    }
                    1
                }
            }
            ValidationMode::ByUserName => {
                let mut pending: HashMap<String, Vec<usize>> = HashMap::new();
                for (i, raw) in identities.iter().enumerate() {
                    let name = canonical_user_name(raw);
                    if name.is_empty() {
                        verdicts[i] = Some(Verdict::Invalid(InvalidReason::UserName(raw.to_string())));
                    } else {
                        pending.entry(name).or_default().push(i);
                    }
                }

                if pending.is_empty() {
                    0
                } else {
                    let keys: Vec<String> = pending.keys().cloned().collect();
                    for found in store.find_by_names(&keys).await? {
                        for i in pending.remove(&found.user_name).unwrap_or_default() {
                            verdicts[i] = Some(Verdict::Valid {
                                user_id: found.user_id,
                                user_name: found.user_name.clone(),
                            });
                        }
                    }
                    1
                }
            }
        };

        let verdicts = verdicts
            .into_iter()
            .zip(identities)
            .map(|(verdict, raw)| {
                verdict.unwrap_or_else(|| {
                    Verdict::Invalid(match self.mode {
                        ValidationMode::ByUserId => InvalidReason::UserId(raw.to_string()),
                        ValidationMode::ByUserName => InvalidReason::UserName(raw.to_string()),
                    })
                })
            })
            .collect();

        Ok(BatchOutcome {
            verdicts,
            store_queries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::AuthoritativeIdentity;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fixed account table that records every key set it is asked for
    struct FakeStore {
        accounts: Vec<AuthoritativeIdentity>,
        id_queries: Mutex<Vec<Vec<i64>>>,
        name_queries: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    impl FakeStore {
        fn new(accounts: &[(i64, &str)]) -> Self {
            Self {
                accounts: accounts
                    .iter()
                    .map(|(id, name)| AuthoritativeIdentity {
                        user_id: *id,
                        user_name: name.to_string(),
                    })
                    .collect(),
                id_queries: Mutex::new(Vec::new()),
                name_queries: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(&[])
            }
        }
    }

    #[async_trait]
    impl AuthoritativeStore for FakeStore {
        async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<AuthoritativeIdentity>, StoreError> {
            if self.fail {
                return Err(StoreError::Unavailable("down".into()));
            }
            self.id_queries.lock().unwrap().push(ids.to_vec());
            Ok(self.accounts.iter().filter(|a| ids.contains(&a.user_id)).cloned().collect())
        }

        async fn find_by_names(&self, names: &[String]) -> Result<Vec<AuthoritativeIdentity>, StoreError> {
            if self.fail {
                return Err(StoreError::Unavailable("down".into()));
            }
            self.name_queries.lock().unwrap().push(names.to_vec());
            Ok(self.accounts.iter().filter(|a| names.contains(&a.user_name)).cloned().collect())
        }
    }

    #[test]
    fn test_canonical_user_name() {
        assert_eq!(canonical_user_name("alice"), "Alice");
        assert_eq!(canonical_user_name("  some_user_name "), "Some user name");
        assert_eq!(canonical_user_name("Élan"), "Élan");
        assert_eq!(canonical_user_name("ßeta"), "SSeta");
        assert_eq!(canonical_user_name("   "), "");
    }

    #[tokio::test]
    async fn test_id_mode_match_overwrites_with_display_name() {
        let store = FakeStore::new(&[(42, "Jimbo")]);
        let validator = BatchValidator::new(ValidationMode::ByUserId);

        let outcome = validator.validate(&store, &["42", "7"]).await.unwrap();

        assert_eq!(
            outcome.verdicts,
            vec![
                Verdict::Valid { user_id: 42, user_name: "Jimbo".into() },
                Verdict::Invalid(InvalidReason::UserId("7".into())),
            ]
        );
        assert_eq!(outcome.store_queries, 1);
    }

    #[tokio::test]
    async fn test_id_mode_non_numeric_never_queried() {
        let store = FakeStore::new(&[(42, "Jimbo")]);
        let validator = BatchValidator::new(ValidationMode::ByUserId);

        let outcome = validator.validate(&store, &["abc", "42", "-3"]).await.unwrap();

        assert_eq!(outcome.verdicts[0], Verdict::Invalid(InvalidReason::UserId("abc".into())));
        assert!(outcome.verdicts[1].is_valid());
        assert_eq!(outcome.verdicts[2], Verdict::Invalid(InvalidReason::UserId("-3".into())));
        assert_eq!(*store.id_queries.lock().unwrap(), vec![vec![42]]);
    }

    #[tokio::test]
    async fn test_id_mode_all_malformed_skips_round_trip() {
        let store = FakeStore::new(&[]);
        let validator = BatchValidator::new(ValidationMode::ByUserId);

        let outcome = validator.validate(&store, &["abc", "x1"]).await.unwrap();

        assert_eq!(outcome.store_queries, 0);
        assert!(store.id_queries.lock().unwrap().is_empty());
        assert_eq!(outcome.verdicts[0].clone(), Verdict::Invalid(InvalidReason::UserId("abc".into())));
    }

    #[tokio::test]
    async fn test_name_mode_canonicalizes_and_shares_keys() {
        let store = FakeStore::new(&[(1, "Alice"), (2, "Some user")]);
        let validator = BatchValidator::new(ValidationMode::ByUserName);

        let outcome = validator
            .validate(&store, &["Alice", "alice", "some_user", "Nobody"])
            .await
            .unwrap();

        assert_eq!(outcome.verdicts[0], Verdict::Valid { user_id: 1, user_name: "Alice".into() });
        assert_eq!(outcome.verdicts[1], Verdict::Valid { user_id: 1, user_name: "Alice".into() });
        assert_eq!(outcome.verdicts[2], Verdict::Valid { user_id: 2, user_name: "Some user".into() });
        assert_eq!(outcome.verdicts[3], Verdict::Invalid(InvalidReason::UserName("Nobody".into())));

        let queries = store.name_queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].len(), 3);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let validator = BatchValidator::new(ValidationMode::ByUserName);

        let result = validator.validate(&FakeStore::failing(), &["Alice"]).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
