use k8s_openapi::api::apps::v1::StatefulSet;
use kube::{
    Api,
    api::{Patch, PatchParams},
    client::Client,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Error;
use lft_common::annotations;

/// The apiserver caps annotation payloads; refuse appends it would reject.
pub const MAX_JOURNAL_BYTES: usize = 256 * 1024;

/// One replayable topology mutation. The tag and field names are the wire
/// format stored under the `lft/operations` annotation; insertion order is
/// meaningful.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "op")]
pub enum Operation {
    #[serde(rename = "connect")]
    Connect {
        peer: String,
        interface_name: String,
        peer_interface_name: String,
    },
    #[serde(rename = "setIp")]
    SetIp {
        ip: String,
        mask: u8,
        interface: String,
    },
    #[serde(rename = "setDefaultGateway")]
    SetDefaultGateway { gateway_ip: String, iface_peer: String },
    #[serde(rename = "setController")]
    SetController {
        controller_ip: String,
        controller_port: u16,
        protocol: String,
    },
    #[serde(rename = "initController")]
    InitController {
        ip: String,
        port: u16,
        app_path: String,
    },
    #[serde(rename = "connectToInternet")]
    ConnectToInternet {
        ip: String,
        mask: u8,
        node_iface: String,
        host_iface: String,
    },
}

impl Operation {
    pub fn tag(&self) -> &'static str {
        match self {
            Operation::Connect { .. } => "connect",
            Operation::SetIp { .. } => "setIp",
            Operation::SetDefaultGateway { .. } => "setDefaultGateway",
            Operation::SetController { .. } => "setController",
            Operation::InitController { .. } => "initController",
            Operation::ConnectToInternet { .. } => "connectToInternet",
        }
    }
}

/// Decode an annotation value into operations, preserving order. Entries
/// with an unrecognized tag are returned separately so the caller can log
/// and skip them; they never abort the decode.
pub fn decode_operations(raw: &str) -> Result<(Vec<Operation>, Vec<String>), Error> {
    let values: Vec<serde_json::Value> = serde_json::from_str(raw)?;
    let mut operations = Vec::with_capacity(values.len());
    let mut skipped = Vec::new();
    for value in values {
        match serde_json::from_value::<Operation>(value.clone()) {
            Ok(operation) => operations.push(operation),
            Err(_) => skipped.push(
                value
                    .get("op")
                    .and_then(|tag| tag.as_str())
                    .unwrap_or("<missing tag>")
                    .to_string(),
            ),
        }
    }
    Ok((operations, skipped))
}

pub fn encode_operations(operations: &[Operation]) -> Result<String, Error> {
    Ok(serde_json::to_string(operations)?)
}

/// Ordered, durable operation log bound to one workload's metadata. The
/// owning node facade is the single writer; the reconciler only reads.
pub struct Journal {
    api: Api<StatefulSet>,
    name: String,
}

impl Journal {
    pub fn new(client: Client, namespace: &str, name: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append one operation: read the current annotation, push, and
    /// merge-patch the result back. Entries this build does not understand
    /// are carried through untouched.
    pub async fn append(&self, operation: &Operation) -> Result<(), Error> {
        let raw = self.raw_annotation().await?;
        let mut values: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
        values.push(serde_json::to_value(operation)?);
        let encoded = serde_json::to_string(&values)?;
        if encoded.len() > MAX_JOURNAL_BYTES {
            return Err(Error::JournalFull {
                name: self.name.clone(),
                size: encoded.len(),
            });
        }
        let patch = json!({
            "metadata": { "annotations": { annotations::OPERATIONS: encoded } }
        });
        self.api
            .patch(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    /// Read the full ordered journal, plus any tags this build cannot
    /// dispatch (logged and skipped by the caller).
    pub async fn read(&self) -> Result<(Vec<Operation>, Vec<String>), Error> {
        let raw = self.raw_annotation().await?;
        decode_operations(&raw)
    }

    async fn raw_annotation(&self) -> Result<String, Error> {
        let workload = self.api.get(&self.name).await?;
        Ok(workload
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(annotations::OPERATIONS))
            .cloned()
            .unwrap_or_else(|| "[]".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Operation> {
        vec![
            Operation::Connect {
                peer: "h2-0".to_string(),
                interface_name: "h1-eth0".to_string(),
                peer_interface_name: "h2-eth0".to_string(),
            },
            Operation::SetIp {
                ip: "10.0.0.1".to_string(),
                mask: 24,
                interface: "h1-eth0".to_string(),
            },
        ]
    }

    #[test]
    fn round_trip_preserves_order() {
        let encoded = encode_operations(&sample()).unwrap();
        let (decoded, skipped) = decode_operations(&encoded).unwrap();
        assert_eq!(decoded, sample());
        assert!(skipped.is_empty());
    }

    #[test]
    fn empty_annotation_is_an_empty_journal() {
        let (decoded, skipped) = decode_operations("[]").unwrap();
        assert!(decoded.is_empty());
        assert!(skipped.is_empty());
    }

    #[test]
    fn wire_tags_match_the_annotation_format() {
        let encoded = encode_operations(&sample()).unwrap();
        let values: Vec<serde_json::Value> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(values[0]["op"], "connect");
        assert_eq!(values[0]["peer"], "h2-0");
        assert_eq!(values[0]["interface_name"], "h1-eth0");
        assert_eq!(values[0]["peer_interface_name"], "h2-eth0");
        assert_eq!(values[1]["op"], "setIp");
        assert_eq!(values[1]["mask"], 24);
        assert_eq!(values[1]["interface"], "h1-eth0");
    }

    #[test]
    fn gateway_and_controller_tags_round_trip() {
        let operations = vec![
            Operation::SetDefaultGateway {
                gateway_ip: "192.168.100.1".to_string(),
                iface_peer: "eth1".to_string(),
            },
            Operation::SetController {
                controller_ip: "10.1.0.5".to_string(),
                controller_port: 6653,
                protocol: "tcp".to_string(),
            },
            Operation::InitController {
                ip: "10.1.0.5".to_string(),
                port: 6653,
                app_path: "ryu.app.simple_switch_13".to_string(),
            },
            Operation::ConnectToInternet {
                ip: "192.168.100.1".to_string(),
                mask: 24,
                node_iface: "eth1".to_string(),
                host_iface: "h1br".to_string(),
            },
        ];
        let encoded = encode_operations(&operations).unwrap();
        let values: Vec<serde_json::Value> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(values[0]["op"], "setDefaultGateway");
        assert_eq!(values[0]["iface_peer"], "eth1");
        assert_eq!(values[1]["op"], "setController");
        assert_eq!(values[2]["op"], "initController");
        assert_eq!(values[3]["op"], "connectToInternet");
        let (decoded, _) = decode_operations(&encoded).unwrap();
        assert_eq!(decoded, operations);
    }

    #[test]
    fn unknown_tag_is_skipped_not_fatal() {
        let raw = r#"[
            {"op": "connect", "peer": "h2-0", "interface_name": "a", "peer_interface_name": "b"},
            {"op": "teleport", "where": "far"},
            {"op": "setIp", "ip": "10.0.0.1", "mask": 24, "interface": "a"}
        ]"#;
        let (decoded, skipped) = decode_operations(raw).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].tag(), "setIp");
        assert_eq!(skipped, vec!["teleport".to_string()]);
    }

    #[test]
    fn missing_tag_is_reported() {
        let raw = r#"[{"peer": "h2-0"}]"#;
        let (decoded, skipped) = decode_operations(raw).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(skipped, vec!["<missing tag>".to_string()]);
    }
}
