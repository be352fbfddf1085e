//! Message template renderer.
//!
//! Substitutes the fixed `{{token}}` set with fields from an [`Order`]
//! snapshot. Pure and deterministic: no I/O, missing fields become empty
//! strings, and timestamps that fail to parse render as the raw stored value.
//! All date formatting targets America/Sao_Paulo.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::America::Sao_Paulo;
use chrono_tz::Tz;

use crate::models::Order;

const TRACKING_LINK_BASE: &str = "https://rastreamento.correios.com.br/app/index.php?objetos=";

const STATUS_UNAVAILABLE: &str = "Status não disponível";

/// Renders `template` against `order`. Returns `None` for a missing or
/// empty template.
pub fn render(template: Option<&str>, order: &Order) -> Option<String> {
    let template = template?;
    if template.is_empty() {
        return None;
    }

    let status = order
        .internal_status
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(STATUS_UNAVAILABLE);

    let (update_raw, update_formatted) = order
        .last_update
        .as_deref()
        .map(format_timestamp)
        .unwrap_or_default();

    let posted_formatted = order
        .posted_at
        .as_deref()
        .map(format_date)
        .unwrap_or_default();

    let tracking_link = order
        .tracking_code
        .as_deref()
        .filter(|code| !code.is_empty())
        .map(|code| format!("{}{}", TRACKING_LINK_BASE, code))
        .unwrap_or_default();

    let substitutions: [(&str, &str); 13] = [
        ("{{nome_cliente}}", &order.name),
        ("{{primeiro_nome}}", order.first_name()),
        ("{{produto_nome}}", order.product.as_deref().unwrap_or("")),
        (
            "{{codigo_rastreio}}",
            order.tracking_code.as_deref().unwrap_or(""),
        ),
        ("{{status_rastreio}}", status),
        ("{{status_atual}}", status),
        ("{{data_postagem_formatada}}", &posted_formatted),
        ("{{data_atualizacao_formatada}}", &update_formatted),
        ("{{data_atualizacao}}", &update_raw),
        (
            "{{cidade_etapa_origem}}",
            order.origin_location.as_deref().unwrap_or(""),
        ),
        (
            "{{cidade_etapa_destino}}",
            order.destination_location.as_deref().unwrap_or(""),
        ),
        ("{{link_rastreio}}", &tracking_link),
        ("{{telefone}}", &order.phone),
    ];

    let mut rendered = template.to_string();
    for (token, value) in substitutions {
        rendered = rendered.replace(token, value);
    }
    Some(rendered)
}

/// Returns the (machine, display) forms of a stored timestamp. Unparseable
/// values pass through unchanged in both positions.
fn format_timestamp(raw: &str) -> (String, String) {
    match parse_timestamp(raw) {
        Some(local) => (local.to_rfc3339(), local.format("%d/%m/%Y %H:%M:%S").to_string()),
        None => (raw.to_string(), raw.to_string()),
    }
}

/// Display form of a stored date, falling back to the raw value.
fn format_date(raw: &str) -> String {
    if let Some(date) = parse_date(raw) {
        return date.format("%d/%m/%Y").to_string();
    }
    if let Some(local) = parse_timestamp(raw) {
        return local.format("%d/%m/%Y").to_string();
    }
    raw.to_string()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Tz>> {
    if let Ok(fixed) = DateTime::parse_from_rfc3339(raw) {
        return Some(fixed.with_timezone(&Sao_Paulo));
    }
    // Naive timestamps from the tracking API are already local time.
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Sao_Paulo.from_local_datetime(&naive).single();
        }
    }
    None
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }
    None
}
