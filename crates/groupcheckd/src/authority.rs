use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use authorizer::{decide, Verdict};
use cred_resolver::SystemAccess;
use decision_log::{DecisionEntry, DecisionSink};
use policy_store::PolicyStore;
use subject_codec::decode_subject;

/// Bus name the service claims.
pub const BUS_NAME: &str = "org.freedesktop.PolicyKit1";
/// Object path the authority lives at.
pub const OBJECT_PATH: &str = "/org/freedesktop/PolicyKit1/Authority";
/// Interface the methods and properties belong to.
pub const INTERFACE: &str = "org.freedesktop.PolicyKit1.Authority";

pub const BACKEND_NAME: &str = "groupcheck";

pub(crate) const ERR_INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";
const ERR_UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";

// ---------------------------------------------------------------------------
// Wire envelope
// ---------------------------------------------------------------------------

/// Message envelope exchanged with the transport.
///
/// Bodies are free-form JSON mirroring the PolicyKit method signatures; the
/// responder only fixes the outer shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BusMessage {
    /// An inbound method call on the authority interface.
    #[serde(rename = "call")]
    MethodCall {
        id: String,
        member: String,
        #[serde(default)]
        body: Value,
    },

    /// A successful method return.
    #[serde(rename = "reply")]
    MethodReply {
        id: String,
        #[serde(default)]
        body: Value,
    },

    /// A protocol-level failure of the call itself; carries no verdict.
    #[serde(rename = "error")]
    Error {
        id: String,
        name: String,
        message: String,
    },
}

/// Arguments of `CheckAuthorization(subject, action_id, details, flags,
/// cancellation_id)`. The subject stays an opaque value here; the recursive
/// decoder in subject-codec validates it.
#[derive(Debug, Deserialize)]
struct CheckAuthorizationArgs {
    subject: Value,
    action_id: String,
    #[serde(default)]
    #[allow(dead_code)]
    details: HashMap<String, String>,
    #[serde(default)]
    #[allow(dead_code)]
    flags: u32,
    #[serde(default)]
    #[allow(dead_code)]
    cancellation_id: String,
}

#[derive(Debug, Deserialize)]
struct CancelArgs {
    #[serde(default)]
    cancellation_id: String,
}

#[derive(Debug, Deserialize)]
struct EnumerateActionsArgs {
    #[serde(default)]
    #[allow(dead_code)]
    locale: String,
}

#[derive(Debug, Deserialize)]
struct GetPropertyArgs {
    interface: String,
    property: String,
}

/// One element of the `EnumerateActions` reply. Only the id and the
/// "authorization always required" flags carry meaning; the descriptive
/// fields are deliberately empty.
#[derive(Debug, Serialize)]
struct ActionDescription {
    action_id: String,
    description: String,
    message: String,
    vendor_name: String,
    vendor_url: String,
    icon_name: String,
    implicit_any: u32,
    implicit_inactive: u32,
    implicit_active: u32,
    annotations: HashMap<String, String>,
}

impl ActionDescription {
    fn for_action(action_id: &str) -> Self {
        Self {
            action_id: action_id.to_string(),
            description: String::new(),
            message: String::new(),
            vendor_name: String::new(),
            vendor_url: String::new(),
            icon_name: String::new(),
            implicit_any: 1,
            implicit_inactive: 1,
            implicit_active: 1,
            annotations: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Authority
// ---------------------------------------------------------------------------

/// The outward-facing method and property handlers.
///
/// Stateless across calls: each inbound method call is fully processed
/// within one `handle_call` invocation, in the order the transport delivers
/// them.
pub struct Authority {
    store: Arc<PolicyStore>,
    system: Arc<dyn SystemAccess>,
    decisions: DecisionSink,
}

impl Authority {
    pub fn new(store: Arc<PolicyStore>, system: Arc<dyn SystemAccess>, decisions: DecisionSink) -> Self {
        Self {
            store,
            system,
            decisions,
        }
    }

    /// Dispatch one inbound message from `peer` and produce the reply.
    pub async fn handle_call(&self, peer: &str, msg: BusMessage) -> BusMessage {
        let (id, member, body) = match msg {
            BusMessage::MethodCall { id, member, body } => (id, member, body),
            BusMessage::MethodReply { id, .. } | BusMessage::Error { id, .. } => {
                return invalid_args(id, "expected a method call");
            }
        };

        match member.as_str() {
            "CheckAuthorization" => self.check_authorization(peer, id, body).await,
            "CancelCheckAuthorization" => self.cancel_check_authorization(id, body),
            "EnumerateActions" => self.enumerate_actions(id, body),
            "Get" => self.get_property(id, body),
            other => {
                warn!(peer, member = other, "unknown method");
                BusMessage::Error {
                    id,
                    name: ERR_UNKNOWN_METHOD.to_string(),
                    message: format!("no such method on {INTERFACE}: {other}"),
                }
            }
        }
    }

    async fn check_authorization(&self, peer: &str, id: String, body: Value) -> BusMessage {
        let args: CheckAuthorizationArgs = match serde_json::from_value(body) {
            Ok(args) => args,
            Err(err) => return invalid_args(id, &format!("bad CheckAuthorization arguments: {err}")),
        };

        // A rejected subject fails the call itself; no verdict is produced.
        let subject = match decode_subject(&args.subject) {
            Ok(subject) => subject,
            Err(err) => return invalid_args(id, &err.to_string()),
        };

        // From here on every failure resolves to a denial, never an error.
        let allowed = decide(&subject, &args.action_id, &self.store, self.system.as_ref());

        info!(
            peer,
            subject = %subject,
            action_id = %args.action_id,
            allowed,
            "{subject} {}allowed to do action-id {}",
            if allowed { "" } else { "NOT " },
            args.action_id,
        );

        self.decisions
            .record(
                DecisionEntry::new(subject.to_string(), &args.action_id, allowed).with_peer(peer),
            )
            .await;

        BusMessage::MethodReply {
            id,
            body: serde_json::to_value(Verdict::from_decision(allowed))
                .unwrap_or(Value::Null),
        }
    }

    /// Always acknowledged, never effective: evaluation is synchronous and
    /// cannot be interrupted once started.
    fn cancel_check_authorization(&self, id: String, body: Value) -> BusMessage {
        let args: CancelArgs = serde_json::from_value(body).unwrap_or(CancelArgs {
            cancellation_id: String::new(),
        });
        info!(cancellation_id = %args.cancellation_id, "cancellation acknowledged (no effect)");
        BusMessage::MethodReply {
            id,
            body: Value::Object(serde_json::Map::new()),
        }
    }

    fn enumerate_actions(&self, id: String, body: Value) -> BusMessage {
        let _args: EnumerateActionsArgs = match serde_json::from_value(body) {
            Ok(args) => args,
            Err(err) => return invalid_args(id, &format!("bad EnumerateActions arguments: {err}")),
        };

        let mut ids: Vec<&str> = self.store.action_ids().collect();
        ids.sort_unstable();

        let actions: Vec<ActionDescription> =
            ids.into_iter().map(ActionDescription::for_action).collect();

        BusMessage::MethodReply {
            id,
            body: serde_json::json!({ "actions": actions }),
        }
    }

    fn get_property(&self, id: String, body: Value) -> BusMessage {
        let args: GetPropertyArgs = match serde_json::from_value(body) {
            Ok(args) => args,
            Err(err) => return invalid_args(id, &format!("bad Get arguments: {err}")),
        };

        if args.interface != INTERFACE {
            return invalid_args(id, &format!("no such interface: {}", args.interface));
        }

        let value = match args.property.as_str() {
            "BackendName" => Value::String(BACKEND_NAME.to_string()),
            "BackendVersion" => Value::String(env!("CARGO_PKG_VERSION").to_string()),
            // No temporary-authorization support.
            "BackendFeatures" => Value::from(0u32),
            other => return invalid_args(id, &format!("no such property: {other}")),
        };

        BusMessage::MethodReply {
            id,
            body: serde_json::json!({ "value": value }),
        }
    }
}

fn invalid_args(id: String, message: &str) -> BusMessage {
    BusMessage::Error {
        id,
        name: ERR_INVALID_ARGS.to_string(),
        message: message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
