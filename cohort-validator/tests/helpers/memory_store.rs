//! In-memory authoritative stores
//!
//! Count round trips, record the key sets queried, fail on demand, and
//! optionally park each query until the test releases it.

use async_trait::async_trait;
use cohort_validator::directory::{ProjectDirectory, StaticDirectorySource, StoreLocation};
use cohort_validator::stores::{
    AuthoritativeIdentity, AuthoritativeStore, StoreConnector, StoreError, StoreRegistry,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

/// Parks queries until released
pub struct Gate {
    entered: Notify,
    release: Semaphore,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
        })
    }

    /// Wait until a query is parked at the gate
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let `n` parked or future queries through
    pub fn release(&self, n: usize) {
        self.release.add_permits(n);
    }

    async fn pass(&self) {
        self.entered.notify_one();
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    accounts: Vec<AuthoritativeIdentity>,
    queries: AtomicUsize,
    id_keys: Mutex<Vec<Vec<i64>>>,
    name_keys: Mutex<Vec<Vec<String>>>,
    failing: AtomicBool,
    gate: Option<Arc<Gate>>,
}

impl MemoryStore {
    pub fn new(accounts: &[(i64, &str)]) -> Self {
        Self {
            accounts: accounts
                .iter()
                .map(|(id, name)| AuthoritativeIdentity {
                    user_id: *id,
                    user_name: name.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Accounts 1..=n named "User 1".."User n"
    pub fn numbered(n: i64) -> Self {
        Self {
            accounts: (1..=n)
                .map(|id| AuthoritativeIdentity {
                    user_id: id,
                    user_name: format!("User {}", id),
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Round trips served (including failed ones)
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn id_keys(&self) -> Vec<Vec<i64>> {
        self.id_keys.lock().unwrap().clone()
    }

    pub fn name_keys(&self) -> Vec<Vec<String>> {
        self.name_keys.lock().unwrap().clone()
    }

    async fn enter(&self) -> Result<(), StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthoritativeStore for MemoryStore {
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<AuthoritativeIdentity>, StoreError> {
        self.enter().await?;
        self.id_keys.lock().unwrap().push(ids.to_vec());
        Ok(self
            .accounts
            .iter()
            .filter(|a| ids.contains(&a.user_id))
            .cloned()
            .collect())
    }

    async fn find_by_names(&self, names: &[String]) -> Result<Vec<AuthoritativeIdentity>, StoreError> {
        self.enter().await?;
        self.name_keys.lock().unwrap().push(names.to_vec());
        Ok(self
            .accounts
            .iter()
            .filter(|a| names.contains(&a.user_name))
            .cloned()
            .collect())
    }
}

/// Hands out the registered store for a project; anything else fails to connect
pub struct MemoryConnector {
    stores: HashMap<String, Arc<MemoryStore>>,
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(
        &self,
        project: &str,
        _location: &StoreLocation,
    ) -> Result<Arc<dyn AuthoritativeStore>, StoreError> {
        match self.stores.get(project) {
            Some(store) => Ok(Arc::clone(store) as Arc<dyn AuthoritativeStore>),
            None => Err(StoreError::Connect(format!("no store for {}", project))),
        }
    }
}

/// Registry whose directory lists `stores` plus `directory_only` projects
pub fn test_registry(stores: &[(&str, Arc<MemoryStore>)], directory_only: &[&str]) -> Arc<StoreRegistry> {
    let projects: Vec<String> = stores
        .iter()
        .map(|(p, _)| p.to_string())
        .chain(directory_only.iter().map(|p| p.to_string()))
        .collect();
    let directory = ProjectDirectory::new(Box::new(StaticDirectorySource::new(projects, "localhost")));
    let connector = MemoryConnector {
        stores: stores
            .iter()
            .map(|(p, s)| (p.to_string(), Arc::clone(s)))
            .collect(),
    };
    Arc::new(StoreRegistry::new(directory, Box::new(connector)))
}
