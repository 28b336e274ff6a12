// SPDX-License-Identifier: MIT OR Apache-2.0
//! Decide whether the message is a contract mail.
//!
//! Two policies: `passthrough` accepts everything; `strict` requires the
//! contract keyword plus a PDF attachment, selecting the PDF when it is
//! unambiguous and routing multi-PDF messages to manual review.

use crate::GraphContext;
use ino_config::SignalPolicy;
use ino_core::{ContractSignalResult, ErrorInfo, RunState, StateDelta, codes};
use serde_json::json;

pub(crate) async fn run(ctx: &GraphContext, state: &RunState) -> StateDelta {
    if ctx.config.signal_policy == SignalPolicy::Passthrough {
        return StateDelta {
            contract_signals: Some(ContractSignalResult {
                ok: true,
                is_contract_mail: true,
                pdf_attachment_id: None,
                errors: vec![],
            }),
            ..Default::default()
        };
    }

    let keyword = &ctx.config.contract_keyword;
    let subject = state.email_event.subject.to_lowercase();
    let body = state.email_event.body_text.to_lowercase();
    let has_keyword = subject.contains(keyword.as_str()) || body.contains(keyword.as_str());

    let pdfs = state.email_event.pdf_attachments();

    if !has_keyword || pdfs.is_empty() {
        let code = if has_keyword {
            codes::PDF_NOT_FOUND
        } else {
            codes::NOT_CONTRACT_MAIL
        };
        return StateDelta {
            contract_signals: Some(ContractSignalResult {
                ok: false,
                is_contract_mail: false,
                pdf_attachment_id: None,
                errors: vec![ErrorInfo::new(
                    code,
                    "not a contract mail or no pdf attachment found",
                )],
            }),
            ..Default::default()
        };
    }

    if pdfs.len() > 1 {
        // Contract mail, but a human has to pick the document.
        let mut delta = StateDelta {
            contract_signals: Some(ContractSignalResult {
                ok: false,
                is_contract_mail: true,
                pdf_attachment_id: None,
                errors: vec![ErrorInfo::with_details(
                    codes::MULTI_PDF_ATTACHMENTS,
                    format!(
                        "multiple pdf attachments found ({}), manual selection required",
                        pdfs.len()
                    ),
                    json!({"pdf_count": pdfs.len()}),
                )],
            }),
            ..Default::default()
        };
        delta.errors.push(ErrorInfo::with_details(
            codes::MULTI_PDF_ATTACHMENTS,
            "multiple pdf attachments, manual selection required",
            json!({"pdf_count": pdfs.len()}),
        ));
        return delta;
    }

    let primary = pdfs[0].clone();
    StateDelta {
        contract_signals: Some(ContractSignalResult {
            ok: true,
            is_contract_mail: true,
            pdf_attachment_id: Some(primary.attachment_id.clone()),
            errors: vec![],
        }),
        pdf_attachment: Some(primary),
        ..Default::default()
    }
}
