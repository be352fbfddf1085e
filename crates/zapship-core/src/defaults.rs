//! Compiled-in default automation messages.
//!
//! Used whenever a tenant has no row for a known trigger key. Tenants can
//! override or deactivate each trigger individually.

use crate::models::AutomationSettings;
use std::collections::HashMap;

pub const DEFAULT_MESSAGES: [(&str, &str); 7] = [
    (
        "boas_vindas",
        "Olá {{primeiro_nome}}! Bem-vindo(a). Agradecemos o seu contato!",
    ),
    (
        "envio_rastreio",
        "Olá {{primeiro_nome}}, o seu pedido foi enviado! O seu código de rastreio é: {{codigo_rastreio}}",
    ),
    (
        "pedido_a_caminho",
        "Boas notícias, {{primeiro_nome}}! O seu pedido está a caminho. Pode acompanhar com o código: {{codigo_rastreio}}",
    ),
    (
        "pedido_atrasado",
        "Olá {{primeiro_nome}}, notamos um possível atraso na entrega do seu pedido. Já estamos a verificar o que aconteceu. Código: {{codigo_rastreio}}",
    ),
    (
        "pedido_devolvido",
        "Atenção {{primeiro_nome}}, o seu pedido foi devolvido ao remetente. Por favor, entre em contato connosco para resolvermos a situação. Código: {{codigo_rastreio}}",
    ),
    (
        "pedido_a_espera",
        "Olá {{primeiro_nome}}! O seu pedido está a espera. Agradecemos o seu contato!",
    ),
    (
        "pedido_cancelado",
        "Olá {{primeiro_nome}}! seu pedido foi cancelado. Agradecemos o seu contato!",
    ),
];

/// Default message for one trigger key, when it is a known key.
pub fn default_message(trigger: &str) -> Option<&'static str> {
    DEFAULT_MESSAGES
        .iter()
        .find(|(key, _)| *key == trigger)
        .map(|(_, message)| *message)
}

/// Seeds a settings map with the defaults for every known trigger key.
/// Tenant rows are merged on top by the automation store.
pub fn default_settings() -> HashMap<String, AutomationSettings> {
    DEFAULT_MESSAGES
        .iter()
        .map(|(key, message)| {
            (
                key.to_string(),
                AutomationSettings::with_default_message(message),
            )
        })
        .collect()
}
