//! In-memory store of operator-managed VPCs
//!
//! Populated from a tag-filtered search at startup and kept current by
//! `VpcService` on every create and delete. Pre-created VPCs never enter it.

use crate::models::Vpc;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// VPCs indexed by path
#[derive(Debug, Default)]
pub struct VpcStore {
    vpcs: RwLock<HashMap<String, Vpc>>,
}

impl VpcStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole store content
    pub fn replace_all(&self, vpcs: Vec<Vpc>) {
        let mut guard = self.vpcs.write().unwrap_or_else(PoisonError::into_inner);
        guard.clear();
        guard.extend(vpcs.into_iter().map(|v| (v.path.clone(), v)));
    }

    pub fn apply(&self, vpc: Vpc) {
        self.vpcs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(vpc.path.clone(), vpc);
    }

    pub fn remove(&self, path: &str) -> Option<Vpc> {
        self.vpcs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
    }

    pub fn get(&self, path: &str) -> Option<Vpc> {
        self.vpcs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn list(&self) -> Vec<Vpc> {
        self.vpcs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// VPCs whose namespace tag is `ns`
    pub fn by_namespace(&self, ns: &str) -> Vec<Vpc> {
        self.filter(|v| v.namespace() == Some(ns))
    }

    /// The VPC created for the NetworkInfo with this UID
    pub fn by_cr_uid(&self, uid: &str) -> Option<Vpc> {
        self.filter(|v| v.cr_uid() == Some(uid)).into_iter().next()
    }

    fn filter(&self, predicate: impl Fn(&Vpc) -> bool) -> Vec<Vpc> {
        self.vpcs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|v| predicate(v))
            .cloned()
            .collect()
    }
}
