use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    context::RequestContext,
    error::{ResolveError, ResolveResult, format_error},
    store::QuarantineStore,
    types::{QuarantineInfo, QuarantineKey},
};

/// What a quarantine store failure does to a listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuarantinePolicy {
    /// The listing fails with an internal error.
    #[default]
    Strict,
    /// The failure is logged and rows are returned undecorated.
    Lenient,
}

/// A listing row that carries quarantine state.
pub trait Quarantined {
    /// Version component of the row's quarantine key.
    fn version_key(&self) -> &str;

    fn set_quarantine(&mut self, info: &QuarantineInfo);
}

/// Decorate `rows` with the quarantine state of `(artifact, row version, registry)`.
///
/// One batch lookup for the whole slice. Rows without an entry are left untouched,
/// selection and order never change.
pub async fn overlay<T: Quarantined>(
    ctx: &RequestContext,
    store: &dyn QuarantineStore,
    policy: QuarantinePolicy,
    artifact: &str,
    registry: &str,
    rows: &mut [T],
) -> ResolveResult<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let keys: Vec<QuarantineKey> = rows
        .iter()
        .map(|row| QuarantineKey::new(artifact, row.version_key(), registry))
        .collect();

    let found = match ctx.guard(store.batch_get_quarantine_info(&keys)).await {
        Ok(found) => found,
        Err(ResolveError::Internal(err)) if policy == QuarantinePolicy::Lenient => {
            warn!(
                artifact,
                registry,
                error = %format_error(&err),
                "Quarantine lookup failed, listing without quarantine state"
            );
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    debug!(artifact, registry, quarantined = found.len(), "Applied quarantine overlay");

    for (row, key) in rows.iter_mut().zip(&keys) {
        if let Some(info) = found.get(key) {
            row.set_quarantine(info);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use chrono::Utc;
    use test_log::test;

    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Row {
        name: String,
        reason: Option<String>,
    }

    impl Row {
        fn new(name: &str) -> Self {
            Self {
                name: name.into(),
                reason: None,
            }
        }
    }

    impl Quarantined for Row {
        fn version_key(&self) -> &str {
            &self.name
        }

        fn set_quarantine(&mut self, info: &QuarantineInfo) {
            self.reason = Some(info.reason.clone());
        }
    }

    #[derive(Default)]
    struct CountingStore {
        entries: HashMap<QuarantineKey, QuarantineInfo>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuarantineStore for CountingStore {
        async fn batch_get_quarantine_info(
            &self,
            keys: &[QuarantineKey],
        ) -> Result<HashMap<QuarantineKey, QuarantineInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(keys
                .iter()
                .filter_map(|k| self.entries.get(k).map(|i| (k.clone(), i.clone())))
                .collect())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl QuarantineStore for BrokenStore {
        async fn batch_get_quarantine_info(
            &self,
            _keys: &[QuarantineKey],
        ) -> Result<HashMap<QuarantineKey, QuarantineInfo>> {
            Err(anyhow!("quarantine database unavailable"))
        }
    }

    fn store() -> CountingStore {
        let mut store = CountingStore::default();
        store.entries.insert(
            QuarantineKey::new("nginx", "v1", "docker-local"),
            QuarantineInfo {
                reason: "CVE-2024-0001".into(),
                created_at: Utc::now(),
            },
        );
        store
    }

    #[test(tokio::test)]
    async fn decorates_matching_rows_with_one_lookup() -> Result<()> {
        let store = store();
        let ctx = RequestContext::default();
        let mut rows = vec![Row::new("v1"), Row::new("v2")];

        overlay(&ctx, &store, QuarantinePolicy::Strict, "nginx", "docker-local", &mut rows).await?;

        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rows[0].reason.as_deref(), Some("CVE-2024-0001"));
        assert_eq!(rows[1].reason, None);

        Ok(())
    }

    #[test(tokio::test)]
    async fn idempotent() -> Result<()> {
        let store = store();
        let ctx = RequestContext::default();

        let mut first = vec![Row::new("v1"), Row::new("v2")];
        let mut second = first.clone();
        let strict = QuarantinePolicy::Strict;
        overlay(&ctx, &store, strict, "nginx", "docker-local", &mut first).await?;
        overlay(&ctx, &store, strict, "nginx", "docker-local", &mut second).await?;

        assert_eq!(first, second);

        Ok(())
    }

    #[test(tokio::test)]
    async fn empty_listing_skips_lookup() -> Result<()> {
        let store = store();
        let mut rows: Vec<Row> = vec![];

        overlay(
            &RequestContext::default(),
            &store,
            QuarantinePolicy::Strict,
            "nginx",
            "docker-local",
            &mut rows,
        )
        .await?;

        assert_eq!(store.calls.load(Ordering::SeqCst), 0);

        Ok(())
    }

    #[test(tokio::test)]
    async fn failures_follow_policy() {
        let ctx = RequestContext::default();
        let mut rows = vec![Row::new("v1")];

        let strict =
            overlay(&ctx, &BrokenStore, QuarantinePolicy::Strict, "nginx", "r", &mut rows).await;
        assert!(matches!(strict, Err(ResolveError::Internal(_))));

        let lenient =
            overlay(&ctx, &BrokenStore, QuarantinePolicy::Lenient, "nginx", "r", &mut rows).await;
        assert!(lenient.is_ok());
        assert_eq!(rows[0].reason, None);
    }

    #[test]
    fn policy_serde() {
        let policy: QuarantinePolicy = serde_json::from_str(r#""lenient""#).unwrap();
        assert_eq!(policy, QuarantinePolicy::Lenient);
        assert_eq!(QuarantinePolicy::default(), QuarantinePolicy::Strict);
    }
}
