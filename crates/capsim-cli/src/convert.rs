//! Conversion from Kubernetes API objects to the simulation model.

use std::collections::BTreeMap;

use capsim_core::{canonical_amount, Container, CoreError, Node, ResourceList, Workload, WorkloadUid};
use k8s_openapi::api::core::v1::{Node as K8sNode, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use thiserror::Error;

/// Errors converting API objects.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The object has no name.
    #[error("{kind} without metadata.name")]
    MissingName {
        /// Object kind.
        kind: &'static str,
    },

    /// A resource quantity could not be converted.
    #[error("{object}: {source}")]
    Resource {
        /// The object carrying the quantity.
        object: String,
        /// The underlying error.
        #[source]
        source: CoreError,
    },

    /// The object carries an unusable UID.
    #[error("{object}: {source}")]
    Uid {
        /// The object carrying the UID.
        object: String,
        /// The underlying error.
        #[source]
        source: capsim_core::IdError,
    },
}

fn resource_list(
    object: &str,
    quantities: Option<&BTreeMap<String, Quantity>>,
) -> Result<ResourceList, ConvertError> {
    let mut list = ResourceList::new();
    for (name, quantity) in quantities.into_iter().flatten() {
        let amount = canonical_amount(name, &quantity.0).map_err(|source| ConvertError::Resource {
            object: object.to_string(),
            source,
        })?;
        list.insert(name.clone(), amount);
    }
    Ok(list)
}

/// Convert a Kubernetes node.
///
/// Allocatable resources fall back to the declared capacity when the node
/// does not report them.
///
/// # Errors
///
/// Returns an error if the node has no name or a malformed quantity.
pub fn node_from_k8s(node: &K8sNode) -> Result<Node, ConvertError> {
    let name = node
        .metadata
        .name
        .clone()
        .ok_or(ConvertError::MissingName { kind: "node" })?;
    let status = node.status.as_ref();

    let capacity = resource_list(&name, status.and_then(|s| s.capacity.as_ref()))?;
    let mut allocatable = resource_list(&name, status.and_then(|s| s.allocatable.as_ref()))?;
    if allocatable.is_empty() {
        allocatable = capacity.clone();
    }

    let mut converted = Node::new(name, allocatable);
    if !capacity.is_empty() {
        converted.capacity = capacity;
    }
    converted.uid.clone_from(&node.metadata.uid);
    converted.labels = node.metadata.labels.clone().unwrap_or_default();
    converted.unschedulable = node
        .spec
        .as_ref()
        .and_then(|s| s.unschedulable)
        .unwrap_or(false);
    Ok(converted)
}

/// Convert a Kubernetes pod.
///
/// Pods without a UID receive a freshly generated one. A pod with
/// `spec.nodeName` set is returned as bound to that node.
///
/// # Errors
///
/// Returns an error if the pod has no name, an empty UID or a malformed
/// resource request.
pub fn workload_from_pod(pod: &Pod) -> Result<Workload, ConvertError> {
    let name = pod
        .metadata
        .name
        .clone()
        .ok_or(ConvertError::MissingName { kind: "pod" })?;
    let namespace = pod
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| "default".to_string());
    let object = format!("{namespace}/{name}");
    let uid = match &pod.metadata.uid {
        Some(uid) => WorkloadUid::new(uid.clone()).map_err(|source| ConvertError::Uid {
            object: object.clone(),
            source,
        })?,
        None => WorkloadUid::generate(),
    };

    let mut workload = Workload::new(uid, name, namespace);
    workload.labels = pod.metadata.labels.clone().unwrap_or_default();

    if let Some(spec) = &pod.spec {
        for container in &spec.containers {
            let requests = resource_list(
                &object,
                container.resources.as_ref().and_then(|r| r.requests.as_ref()),
            )?;
            workload.containers.push(Container::new(&container.name, requests));
        }
        workload.node_selector = spec.node_selector.clone().unwrap_or_default();
        if let Some(host) = &spec.node_name {
            workload.bind(host);
        }
    }
    Ok(workload)
}

/// Whether a pod occupies node capacity: bound and neither succeeded nor failed.
#[must_use]
pub fn is_running(pod: &Pod) -> bool {
    let bound = pod
        .spec
        .as_ref()
        .is_some_and(|spec| spec.node_name.is_some());
    let finished = pod
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| matches!(phase, "Succeeded" | "Failed"));
    bound && !finished
}
