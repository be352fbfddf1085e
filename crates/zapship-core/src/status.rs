//! Status normalization and the trigger-key vocabulary.
//!
//! Automation triggers are keyed by strings: either a fixed lifecycle key
//! (`boas_vindas`, `envio_rastreio`) or a normalized internal status. The
//! normalization rule is a fixed contract: lowercase, every whitespace
//! character becomes an underscore.

/// Welcome automation for brand-new contacts.
pub const TRIGGER_WELCOME: &str = "boas_vindas";

/// Automation announcing the tracking code.
pub const TRIGGER_TRACKING_SENT: &str = "envio_rastreio";

/// Dispatch markers that mean the tracking code was already announced.
/// An order whose marker is one of these is past the "shipped" automation.
pub const TRACKING_LIFECYCLE_KEYS: [&str; 6] = [
    "envio_rastreio",
    "pedido_a_caminho",
    "pedido_atrasado",
    "pedido_devolvido",
    "pedido_a_espera",
    "pedido_cancelado",
];

/// Sentinel status recorded when the tracking API fails.
pub const STATUS_API_ERROR: &str = "erro_api";

/// Statuses after which an order is never polled again.
pub const TERMINAL_STATUSES: [&str; 2] = ["entregue", "devolvido"];

/// Status that polls on a tight 30-minute cadence.
pub const STATUS_OUT_FOR_DELIVERY: &str = "saiu para entrega";

/// Status with the posted-day/8-hour poll cadence.
pub const STATUS_POSTED: &str = "postado";

/// Maps an internal status to its automation trigger key.
///
/// Lowercases and replaces each whitespace character with `_`. Non-whitespace
/// punctuation is preserved; the vocabulary of authored statuses is plain
/// words separated by spaces.
pub fn trigger_key(status: &str) -> String {
    status
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Whether the order reached a state that ends polling for good.
pub fn is_terminal(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status.to_lowercase().as_str())
}
