//! Namespace watch handling: configuration bindings and shared VPC namespaces

use super::Reconciler;
use crds::{ANNOTATION_SHARED_VPC_NAMESPACE, ANNOTATION_VPC_NETWORK_CONFIG};
use k8s_openapi::api::core::v1::Namespace;
use tracing::{debug, info};

fn annotation<'a>(ns: &'a Namespace, key: &str) -> Option<&'a str> {
    ns.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

impl Reconciler {
    /// Record the Namespace's configuration binding and shared VPC owner.
    ///
    /// Returns true if the binding changed.
    pub fn sync_namespace(&self, ns: &Namespace) -> bool {
        let Some(name) = ns.metadata.name.as_deref() else {
            return false;
        };
        self.gateway
            .register_shared_namespace(name, annotation(ns, ANNOTATION_SHARED_VPC_NAMESPACE));
        match annotation(ns, ANNOTATION_VPC_NETWORK_CONFIG) {
            Some(config) => self.registry.register_namespace_binding(name, config),
            None => self.registry.remove_namespace_binding(name),
        }
    }

    /// Handle a created or updated Namespace. Returns the number of
    /// NetworkInfo objects re-enqueued.
    pub async fn handle_namespace_apply(&self, ns: &Namespace) -> usize {
        if !self.sync_namespace(ns) {
            return 0;
        }
        let name = ns.metadata.name.as_deref().unwrap_or_default();
        info!("VPC network configuration binding of namespace {} changed", name);
        self.enqueue_namespace(name).await
    }

    pub fn handle_namespace_delete(&self, ns: &Namespace) {
        let Some(name) = ns.metadata.name.as_deref() else {
            return;
        };
        debug!("Namespace {} deleted, dropping its bindings", name);
        self.registry.remove_namespace_binding(name);
        self.gateway.register_shared_namespace(name, None);
    }
}

#[cfg(test)]
#[path = "namespace_handler_test.rs"]
mod namespace_handler_test;
