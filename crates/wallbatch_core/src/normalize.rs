use serde_json::Value;

use crate::request::CounterFields;
use crate::shape::{
    count, first_text, flag, number, text, Envelope, Object, RawItem, ResultShape,
};
use crate::{ActionTotals, BatchRequest, BatchSummary, DetailRecord, ItemResult};

pub const UNKNOWN_SENDER: &str = "unknown sender";

/// Converts a raw service reply into the canonical [`BatchSummary`].
///
/// The reply layout is recognised structurally. Missing or malformed fields
/// fall back to zero or a placeholder; only a reply with no result data at
/// all yields an error summary.
pub fn normalize(raw: &Value, request: &BatchRequest) -> BatchSummary {
    let fields = request.operation().counter_fields();
    match ResultShape::decode(raw, fields) {
        ResultShape::Multi { envelope, items } => {
            let rows = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| multi_item(index, item, request, fields))
                .collect();
            BatchSummary::from_items(
                request,
                request.item_count(),
                rows,
                envelope.message,
                envelope.error,
            )
        }
        ResultShape::Single { envelope, summary } => {
            let row = single_item(summary, &envelope, request, fields);
            BatchSummary::from_items(request, 1, vec![row], envelope.message, envelope.error)
        }
        ResultShape::Flat { envelope, body } => {
            let row = single_item(body, &envelope, request, fields);
            BatchSummary::from_items(request, 1, vec![row], envelope.message, envelope.error)
        }
        ResultShape::Missing { envelope } => {
            BatchSummary::no_result_data(request, envelope.message, envelope.error)
        }
    }
}

fn multi_item(
    index: usize,
    item: RawItem<'_>,
    request: &BatchRequest,
    fields: CounterFields,
) -> ItemResult {
    let target = item
        .target
        .or_else(|| request.targets().get(index).map(|t| t.as_str().to_string()))
        .unwrap_or_else(|| format!("item #{}", index + 1));
    let (actions, details) = item
        .summary
        .map(|summary| (totals(summary, fields), detail_rows(summary)))
        .unwrap_or_default();

    ItemResult {
        target,
        success: item.success.unwrap_or_else(|| actions.all_succeeded()),
        message: item.message,
        error: item.error,
        actions,
        details,
    }
}

fn single_item(
    summary: &Object,
    envelope: &Envelope,
    request: &BatchRequest,
    fields: CounterFields,
) -> ItemResult {
    let target = first_text(summary, &["postUrl", "publicUrl"])
        .or_else(|| request.targets().first().map(|t| t.as_str().to_string()))
        .unwrap_or_else(|| "item #1".to_string());

    let actions = totals(summary, fields);
    ItemResult {
        target,
        success: envelope.success.unwrap_or_else(|| actions.all_succeeded()),
        message: text(summary, "message"),
        error: text(summary, "error"),
        actions,
        details: detail_rows(summary),
    }
}

fn totals(summary: &Object, fields: CounterFields) -> ActionTotals {
    ActionTotals {
        attempted: count(summary, fields.total),
        succeeded: count(summary, fields.succeeded),
        failed: count(summary, fields.failed),
        senders: fields
            .senders
            .and_then(|key| summary.get(key))
            .and_then(number)
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX)),
    }
}

fn detail_rows(summary: &Object) -> Vec<DetailRecord> {
    ["results", "details"]
        .iter()
        .find_map(|key| summary.get(*key).and_then(Value::as_array))
        .map(|rows| rows.iter().map(detail_record).collect())
        .unwrap_or_default()
}

fn detail_record(row: &Value) -> DetailRecord {
    let Some(obj) = row.as_object() else {
        return DetailRecord {
            label: UNKNOWN_SENDER.to_string(),
            counterpart: None,
            success: false,
            message: None,
            error: Some("malformed result row".to_string()),
        };
    };

    let label = first_text(obj, &["sender", "senderName", "tokenPreview"])
        .or_else(|| {
            obj.get("accountNumber")
                .and_then(number)
                .map(|n| format!("account #{n}"))
        })
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

    DetailRecord {
        label,
        counterpart: first_text(obj, &["receiver", "receiverName"]),
        success: flag(obj, "success").unwrap_or(false),
        message: text(obj, "message"),
        error: text(obj, "error"),
    }
}

