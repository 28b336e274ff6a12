// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node identifiers and the conditional-edge function.

use ino_core::{RunState, Status};
use serde::{Deserialize, Serialize};

/// The nodes of the sales-email graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    /// Entry: derive the initial idempotency key, short-circuit on a prior
    /// terminal success.
    CheckIdempotency,
    /// Load the master-data snapshot.
    LoadMasterdata,
    /// Match the sender to a contact.
    MatchContact,
    /// Decide whether the message is a contract mail.
    DetectContractSignal,
    /// Resolve the customer for the run.
    MatchCustomer,
    /// Contract-recognition chat-flow.
    CallDifyContract,
    /// Order-payload chat-flow.
    CallDifyOrderPayload,
    /// ERP order submission.
    CallGateway,
    /// Artifact persistence and idempotency-key promotion.
    UploadPdf,
    /// Salesperson notification.
    NotifySales,
    /// Terminal: status resolution, candidates, run-record write.
    Finalize,
}

/// Nodes a manual-review decision may resume at.
pub const RESUME_WHITELIST: &[NodeId] = &[
    NodeId::MatchCustomer,
    NodeId::UploadPdf,
    NodeId::CallDifyContract,
    NodeId::CallDifyOrderPayload,
    NodeId::CallGateway,
];

impl NodeId {
    /// Canonical node name (matches the serialized representation).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckIdempotency => "check_idempotency",
            Self::LoadMasterdata => "load_masterdata",
            Self::MatchContact => "match_contact",
            Self::DetectContractSignal => "detect_contract_signal",
            Self::MatchCustomer => "match_customer",
            Self::CallDifyContract => "call_dify_contract",
            Self::CallDifyOrderPayload => "call_dify_order_payload",
            Self::CallGateway => "call_gateway",
            Self::UploadPdf => "upload_pdf",
            Self::NotifySales => "notify_sales",
            Self::Finalize => "finalize",
        }
    }

    /// Parse a node name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "check_idempotency" => Some(Self::CheckIdempotency),
            "load_masterdata" => Some(Self::LoadMasterdata),
            "match_contact" => Some(Self::MatchContact),
            "detect_contract_signal" => Some(Self::DetectContractSignal),
            "match_customer" => Some(Self::MatchCustomer),
            "call_dify_contract" => Some(Self::CallDifyContract),
            "call_dify_order_payload" => Some(Self::CallDifyOrderPayload),
            "call_gateway" => Some(Self::CallGateway),
            "upload_pdf" => Some(Self::UploadPdf),
            "notify_sales" => Some(Self::NotifySales),
            "finalize" => Some(Self::Finalize),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn prior_success(state: &RunState) -> bool {
    state.final_status == Some(Status::Success)
        && state.erp_result.as_ref().is_some_and(|e| e.ok)
}

fn upload_ok(state: &RunState) -> bool {
    state.file_upload.as_ref().is_some_and(|f| f.ok)
}

fn customer_ok(state: &RunState) -> bool {
    state.matched_customer.as_ref().is_some_and(|m| m.ok)
}

/// The successor of `current` given the state after its delta was applied.
/// `None` ends the walk. Pure function; resume re-enters the same edges.
#[must_use]
pub fn next_node(current: NodeId, state: &RunState) -> Option<NodeId> {
    use NodeId::*;
    match current {
        CheckIdempotency => Some(if prior_success(state) {
            Finalize
        } else {
            LoadMasterdata
        }),
        // A failed load marks the run FAILED; go straight to finalize.
        LoadMasterdata => Some(if state.masterdata.is_none() {
            Finalize
        } else {
            MatchContact
        }),
        MatchContact => Some(match &state.matched_contact {
            Some(m) if !m.ok => NotifySales,
            _ => DetectContractSignal,
        }),
        DetectContractSignal => Some(match &state.contract_signals {
            Some(s) if !s.is_contract_mail => Finalize,
            _ => MatchCustomer,
        }),
        MatchCustomer => Some(CallDifyContract),
        CallDifyContract => Some(CallDifyOrderPayload),
        CallDifyOrderPayload => Some(CallGateway),
        CallGateway => Some(UploadPdf),
        UploadPdf => Some(after_upload(state)),
        NotifySales => Some(Finalize),
        Finalize => None,
    }
}

// After upload the walk usually proceeds to notification. Two exceptions:
// an idempotency short-circuit set a terminal status, and a resume entered
// at upload_pdf before the chat-flow steps ran (the upload then feeds the
// recognition step exactly once).
fn after_upload(state: &RunState) -> NodeId {
    if state.final_status.is_some() {
        return NodeId::Finalize;
    }
    if state.contract_result.is_none()
        && upload_ok(state)
        && customer_ok(state)
        && state.pdf_attachment.is_some()
    {
        return NodeId::CallDifyContract;
    }
    NodeId::NotifySales
}
