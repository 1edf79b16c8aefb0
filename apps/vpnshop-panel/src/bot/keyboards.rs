use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

pub const BUY_VPN: &str = "buy_vpn";
pub const HELP: &str = "help";
pub const STATUS: &str = "status";
pub const CHECK_PREFIX: &str = "check_";
pub const ADMIN_STATS: &str = "admin_stats";
pub const ADMIN_USERS: &str = "admin_users";
pub const ADMIN_PAYMENTS: &str = "admin_payments";

pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("🛒 Купить VPN доступ", BUY_VPN)],
        vec![
            InlineKeyboardButton::callback("ℹ️ Помощь", HELP),
            InlineKeyboardButton::callback("📊 Статус", STATUS),
        ],
    ])
}

pub fn check_data(order_id: &str) -> String {
    format!("{}{}", CHECK_PREFIX, order_id)
}

/// Pay button plus the manual status check. Falls back to the check button
/// alone if the gateway handed out something that is not a URL.
pub fn payment_keyboard(payment_url: &str, order_id: &str) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Ok(parsed) = url::Url::parse(payment_url) {
        rows.push(vec![InlineKeyboardButton::url("💳 Оплатить через СБП QR", parsed)]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        "🔄 Проверить статус",
        check_data(order_id),
    )]);
    InlineKeyboardMarkup::new(rows)
}

pub fn deliverable_keyboard(deliverable_url: &str) -> Option<InlineKeyboardMarkup> {
    let parsed = url::Url::parse(deliverable_url).ok()?;
    Some(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        "🚀 Получить VPN доступ",
        parsed,
    )]]))
}

pub fn admin_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("📊 Статистика", ADMIN_STATS)],
        vec![InlineKeyboardButton::callback("👥 Пользователи", ADMIN_USERS)],
        vec![InlineKeyboardButton::callback("💳 Платежи", ADMIN_PAYMENTS)],
    ])
}
