//! Transforms between the node's wire-level ABCI event shapes and
//! [`chainindex_core::CosmosEvent`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use chainindex_core::{CosmosEvent, CosmosEventAttribute};

use crate::wire::{AbciEventWire, AbciMsgLog};

fn from_wire(event: AbciEventWire) -> CosmosEvent {
    CosmosEvent {
        kind: event.kind,
        attributes: event
            .attributes
            .into_iter()
            .map(|a| CosmosEventAttribute {
                key: a.key,
                value: a.value,
            })
            .collect(),
    }
}

pub fn to_core_events(events: Vec<AbciEventWire>) -> Vec<CosmosEvent> {
    events.into_iter().map(from_wire).collect()
}

/// Parses `TxResult.log` (a JSON array of `{msg_index, events}`),
/// appending a synthetic `msg_index` attribute to every event and
/// flattening all messages' events into one ordered list.
pub fn parse_events_from_tx_log(log: &str) -> Result<Vec<CosmosEvent>, serde_json::Error> {
    let msg_logs: Vec<AbciMsgLog> = serde_json::from_str(log)?;
    let mut result = Vec::new();
    for msg_log in msg_logs {
        for event in msg_log.events {
            let mut core_event = from_wire(event);
            core_event.attributes.push(CosmosEventAttribute {
                key: "msg_index".to_string(),
                value: msg_log.msg_index.to_string(),
            });
            result.push(core_event);
        }
    }
    Ok(result)
}

/// Base64-decodes every event attribute's `value` in place.
pub fn decode_events(events: Vec<CosmosEvent>) -> Result<Vec<CosmosEvent>, base64::DecodeError> {
    events
        .into_iter()
        .map(|event| {
            let attributes = event
                .attributes
                .into_iter()
                .map(|attr| {
                    let decoded = BASE64.decode(&attr.value)?;
                    Ok(CosmosEventAttribute {
                        key: attr.key,
                        value: String::from_utf8_lossy(&decoded).into_owned(),
                    })
                })
                .collect::<Result<Vec<_>, base64::DecodeError>>()?;
            Ok(CosmosEvent {
                kind: event.kind,
                attributes,
            })
        })
        .collect()
}

/// Splits a `finalize_block_events` set into begin/end buckets by the
/// `mode=BeginBlock`/`mode=EndBlock` attribute, for post-ABCI++ chains
/// that report a single combined event list instead of separate
/// begin/end sets.
pub fn split_finalize_block_events(events: &[CosmosEvent]) -> (Vec<CosmosEvent>, Vec<CosmosEvent>) {
    let mut begin = Vec::new();
    let mut end = Vec::new();
    for event in events {
        match event.find_attribute("mode") {
            Some("BeginBlock") => begin.push(event.clone()),
            Some("EndBlock") => end.push(event.clone()),
            _ => {}
        }
    }
    (begin, end)
}
