use serde_json::{json, Value};

use crate::state::SharedState;

/// Build the capability document served at every well-known alias (§6.3,
/// §6.4). `message/send` pricing falls back to `price_per_task` when no
/// explicit payment block is configured.
pub fn capability_document(state: &SharedState) -> Value {
    let args = &state.config.args;

    let mut doc = json!({
        "name": args.agent_name,
        "description": args.agent_description,
        "version": env!("CARGO_PKG_VERSION"),
        "protocolVersion": "0.2",
        "skills": [
            {
                "id": "message/send",
                "name": "message/send",
                "description": "Submit a prompt and receive a completed or pending artifact.",
                "pricing": default_pricing(state),
                "sla": {
                    "timeoutSeconds": args.task_timeout_seconds,
                },
            },
            {
                "id": "tasks/get",
                "name": "tasks/get",
                "description": "Poll a previously submitted task for its result.",
            },
            {
                "id": "tasks/cancel",
                "name": "tasks/cancel",
                "description": "Cancel a still-pending task.",
            },
        ],
        "authentication": {
            "schemes": ["bearer", "did", "free-tier"],
            "required": args.require_auth,
        },
        "metadata": {
            "updatedAt": chrono::Utc::now().to_rfc3339(),
        },
    });

    if state.config.escrow_configured {
        doc["payment"] = json!({
            "escrowAddress": args.escrow_address,
            "escrowRpcUrl": args.escrow_rpc_url,
            "providerDid": args.escrow_provider_did,
            "defaultPricing": default_pricing(state),
        });
    } else if args.payment_enabled {
        doc["payment"] = json!({
            "usdcAddress": args.usdc_address,
            "payTo": args.pay_to,
            "validityPeriodSeconds": args.validity_period_seconds,
            "defaultPricing": default_pricing(state),
        });
    } else {
        doc["payment"] = json!({
            "defaultPricing": default_pricing(state),
        });
    }

    if let Some(url) = &args.documentation_url {
        doc["documentationUrl"] = json!(url);
    }
    if let Some(url) = &args.terms_of_service_url {
        doc["termsOfServiceUrl"] = json!(url);
    }
    if let Some(url) = &args.privacy_policy_url {
        doc["privacyPolicyUrl"] = json!(url);
    }

    doc
}

fn default_pricing(state: &SharedState) -> Value {
    json!({
        "amount": state.config.args.price_per_task,
        "currency": "USDC",
        "unit": "task",
    })
}

/// `GET /llms.txt` (§6.4): a short plain-text capability summary for
/// text-oriented crawlers, generated from the same fields as the JSON card.
pub fn llms_txt(state: &SharedState) -> String {
    let args = &state.config.args;
    let mut out = format!(
        "# {}\n\n{}\n\nProtocols: REST, JSON-RPC 2.0 (POST /, POST /a2a), WebSocket (GET /, upgrade)\n",
        args.agent_name, args.agent_description
    );
    out.push_str(&format!(
        "Capability document: /.well-known/agent.json\nDefault price per task: {} USDC\n",
        args.price_per_task
    ));
    if let Some(url) = &args.documentation_url {
        out.push_str(&format!("Documentation: {url}\n"));
    }
    out
}
