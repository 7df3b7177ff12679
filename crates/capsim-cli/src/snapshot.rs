//! Loading cluster snapshots and workload templates.
//!
//! A snapshot is the set of nodes plus the pods already running on them. It
//! comes either from JSON files (a bare array or a `List` object with `items`)
//! or from a live cluster. Workload templates describe the candidate pods of a
//! run: each entry is replicated `num` times.

use std::fs;
use std::path::{Path, PathBuf};

use capsim_core::{Node, Workload, WorkloadUid};
use k8s_openapi::api::core::v1::{Node as K8sNode, Pod};
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig, KubeconfigError};
use kube::{Client, Config};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::convert::{self, ConvertError};

/// Label stamped on every simulated workload, naming its template.
pub const SIMULATION_NAME_LABEL: &str = "SimulationName";

/// File name of exported nodes.
pub const NODES_FILE: &str = "nodes.json";

/// File name of exported running pods.
pub const PODS_FILE: &str = "pods.json";

/// Errors loading snapshots or templates.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Reading or writing a file failed.
    #[error("{path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file did not contain the expected JSON.
    #[error("{path}: {source}")]
    Json {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// An object could not be converted.
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// The kubeconfig could not be loaded.
    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] KubeconfigError),

    /// The API server request failed.
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),
}

/// A result type using `SnapshotError`.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Either a bare JSON array or a `List` object.
#[derive(Deserialize)]
#[serde(untagged)]
enum Items<T> {
    List { items: Vec<T> },
    Array(Vec<T>),
}

impl<T> Items<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::List { items } | Self::Array(items) => items,
        }
    }
}

/// One entry of a workload template file.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadTemplate {
    /// Template name, recorded in the `SimulationName` label.
    pub name: String,
    /// Number of copies to simulate.
    pub num: u64,
    /// The pod to replicate.
    pub pod: Pod,
}

/// How UIDs of expanded workloads are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UidMode {
    /// A fresh random UID per copy.
    Random,
    /// A UID derived from the template name and copy index.
    Deterministic,
}

/// Raw API objects as read from a cluster or snapshot files.
#[derive(Debug, Clone, Default)]
pub struct RawSnapshot {
    /// All nodes.
    pub nodes: Vec<K8sNode>,
    /// Pods that occupy capacity.
    pub pods: Vec<Pod>,
}

/// A snapshot converted to the simulation model.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    /// All nodes.
    pub nodes: Vec<Node>,
    /// Workloads already bound to a node.
    pub running: Vec<Workload>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn read_items<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    Ok(read_json::<Items<T>>(path)?.into_vec())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, data).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl RawSnapshot {
    /// Read nodes and, optionally, running pods from files.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed.
    pub fn from_files(nodes: &Path, pods: Option<&Path>) -> Result<Self> {
        let nodes = read_items(nodes)?;
        let pods = match pods {
            Some(path) => read_items(path)?,
            None => Vec::new(),
        };
        Ok(Self { nodes, pods })
    }

    /// List nodes and the running pods of `namespace` from the API server.
    ///
    /// # Errors
    ///
    /// Returns an error if either list request fails.
    pub async fn fetch(client: Client, namespace: &str) -> Result<Self> {
        let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
        let pods = pods
            .list(&ListParams::default().fields("status.phase=Running"))
            .await?
            .items;
        debug!(count = pods.len(), namespace, "Listed running pods");

        let nodes: Api<K8sNode> = Api::all(client);
        let nodes = nodes.list(&ListParams::default()).await?.items;
        debug!(count = nodes.len(), "Listed nodes");

        Ok(Self { nodes, pods })
    }

    /// Write the snapshot as `nodes.json` and `pods.json` under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a file cannot be written.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|source| SnapshotError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        write_json(&dir.join(NODES_FILE), &self.nodes)?;
        write_json(&dir.join(PODS_FILE), &self.pods)?;
        info!(
            nodes = self.nodes.len(),
            pods = self.pods.len(),
            dir = %dir.display(),
            "Exported cluster snapshot"
        );
        Ok(())
    }

    /// Convert to the simulation model, keeping only pods that occupy a node.
    ///
    /// # Errors
    ///
    /// Returns an error if any object cannot be converted.
    pub fn into_cluster(self) -> Result<ClusterSnapshot> {
        let nodes = self
            .nodes
            .iter()
            .map(convert::node_from_k8s)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let total = self.pods.len();
        let running = self
            .pods
            .iter()
            .filter(|pod| convert::is_running(pod))
            .map(convert::workload_from_pod)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if running.len() < total {
            debug!(
                skipped = total - running.len(),
                "Ignored pods that do not occupy a node"
            );
        }

        Ok(ClusterSnapshot { nodes, running })
    }
}

/// Build a client from an explicit kubeconfig, or the default configuration.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
pub async fn connect(kubeconfig: Option<&Path>) -> Result<Client> {
    let Some(path) = kubeconfig else {
        return Ok(Client::try_default().await?);
    };
    let kubeconfig = Kubeconfig::read_from(path)?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
    Ok(Client::try_from(config)?)
}

/// Read workload templates from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_templates(path: &Path) -> Result<Vec<WorkloadTemplate>> {
    read_json(path)
}

/// Expand templates into candidate workloads, in template order.
///
/// Each copy gets its UID as its name, a `SimulationName` label naming the
/// template (replacing the template's own labels) and the given namespace.
///
/// # Errors
///
/// Returns an error if a template pod cannot be converted.
pub fn expand_templates(
    templates: &[WorkloadTemplate],
    namespace: &str,
    uids: UidMode,
) -> Result<Vec<Workload>> {
    let mut workloads = Vec::new();
    for template in templates {
        let mut pod = template.pod.clone();
        if pod.metadata.name.is_none() {
            pod.metadata.name = Some(template.name.clone());
        }
        let base = convert::workload_from_pod(&pod)?;

        for index in 0..template.num {
            let uid = match uids {
                UidMode::Random => WorkloadUid::generate(),
                UidMode::Deterministic => WorkloadUid::deterministic(&template.name, index),
            };
            let mut workload = base.clone();
            workload.name = uid.as_str().to_string();
            workload.uid = uid;
            workload.namespace = namespace.to_string();
            workload.labels.clear();
            workload
                .labels
                .insert(SIMULATION_NAME_LABEL.to_string(), template.name.clone());
            workloads.push(workload);
        }
    }
    Ok(workloads)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    const NODES: &str = r#"{
        "kind": "NodeList",
        "items": [
            {"metadata": {"name": "n1"}, "status": {"allocatable": {"cpu": "2", "memory": "4Gi"}}},
            {"metadata": {"name": "n2"}, "status": {"allocatable": {"cpu": "1", "memory": "2Gi"}}}
        ]
    }"#;

    const PODS: &str = r#"[
        {"metadata": {"name": "a", "uid": "a"}, "spec": {"nodeName": "n1", "containers": []},
         "status": {"phase": "Running"}},
        {"metadata": {"name": "b", "uid": "b"}, "spec": {"nodeName": "n1", "containers": []},
         "status": {"phase": "Succeeded"}}
    ]"#;

    const TEMPLATES: &str = r#"[
        {"name": "web", "num": 2, "pod": {
            "metadata": {"labels": {"app": "web"}},
            "spec": {"nodeSelector": {"disk": "ssd"}, "containers": [
                {"name": "app", "resources": {"requests": {"cpu": "500m", "memory": "128Mi"}}}
            ]}
        }},
        {"name": "batch", "num": 1, "pod": {
            "spec": {"containers": [{"name": "job", "resources": {"requests": {"cpu": "1"}}}]}
        }}
    ]"#;

    #[test]
    fn reads_lists_and_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = write(dir.path(), "nodes.json", NODES);
        let pods = write(dir.path(), "pods.json", PODS);

        let raw = RawSnapshot::from_files(&nodes, Some(&pods)).unwrap();
        assert_eq!(raw.nodes.len(), 2);
        assert_eq!(raw.pods.len(), 2);

        let cluster = raw.into_cluster().unwrap();
        assert_eq!(cluster.nodes[1].allocatable.cpu_millis(), 1000);
        assert_eq!(cluster.running.len(), 1);
        assert_eq!(cluster.running[0].node_name.as_deref(), Some("n1"));
    }

    #[test]
    fn pods_file_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = write(dir.path(), "nodes.json", NODES);
        let cluster = RawSnapshot::from_files(&nodes, None)
            .unwrap()
            .into_cluster()
            .unwrap();
        assert!(cluster.running.is_empty());
    }

    #[test]
    fn errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(dir.path(), "bad.json", "{not json");
        let err = RawSnapshot::from_files(&bad, None).unwrap_err();
        assert!(matches!(err, SnapshotError::Json { .. }));
        assert!(err.to_string().contains("bad.json"));

        let missing = dir.path().join("missing.json");
        let err = load_templates(&missing).unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }));
    }

    #[test]
    fn templates_expand_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "podspec.json", TEMPLATES);
        let templates = load_templates(&path).unwrap();

        let workloads = expand_templates(&templates, "sim", UidMode::Random).unwrap();
        assert_eq!(workloads.len(), 3);
        assert_ne!(workloads[0].uid, workloads[1].uid);

        for workload in &workloads {
            assert_eq!(workload.name, workload.uid.as_str());
            assert_eq!(workload.namespace, "sim");
            assert_eq!(workload.labels.len(), 1);
            assert!(!workload.is_assigned());
        }
        assert_eq!(workloads[0].labels[SIMULATION_NAME_LABEL], "web");
        assert_eq!(workloads[0].node_selector["disk"], "ssd");
        assert_eq!(workloads[0].total_requests().cpu_millis(), 500);
        assert_eq!(workloads[2].labels[SIMULATION_NAME_LABEL], "batch");
        assert_eq!(workloads[2].total_requests().cpu_millis(), 1000);
    }

    #[test]
    fn deterministic_uids_are_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "podspec.json", TEMPLATES);
        let templates = load_templates(&path).unwrap();

        let first = expand_templates(&templates, "default", UidMode::Deterministic).unwrap();
        let second = expand_templates(&templates, "default", UidMode::Deterministic).unwrap();
        let uids = |w: &[Workload]| w.iter().map(|w| w.uid.clone()).collect::<Vec<_>>();
        assert_eq!(uids(&first), uids(&second));
        assert_eq!(first[0].uid, WorkloadUid::deterministic("web", 0));
    }

    #[test]
    fn export_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = write(dir.path(), "in-nodes.json", NODES);
        let pods = write(dir.path(), "in-pods.json", PODS);
        let raw = RawSnapshot::from_files(&nodes, Some(&pods)).unwrap();

        let out = dir.path().join("export");
        raw.write_to(&out).unwrap();

        let reread = RawSnapshot::from_files(&out.join(NODES_FILE), Some(&out.join(PODS_FILE)))
            .unwrap()
            .into_cluster()
            .unwrap();
        assert_eq!(reread.nodes.len(), 2);
        assert_eq!(reread.running.len(), 1);
    }
}
