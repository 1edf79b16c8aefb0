use teloxide::utils::html::escape;
use vpnshop_db::models::order::{Order, OrderStatus, OrderTotals, OwnerSummary};
use vpnshop_db::models::user::User;

use crate::settings::Settings;

pub fn welcome(first_name: Option<&str>, settings: &Settings) -> String {
    let name = first_name.filter(|n| !n.is_empty()).map(escape).unwrap_or_else(|| "пользователь".to_string());
    format!(
        "🔐 <b>VPN Бот</b>\n\n\
         Привет, {}!\n\n\
         Я предоставляю доступ к <b>быстрому и защищенному VPN</b> сервису.\n\n\
         <b>Что вы получаете:</b>\n\
         ✅ Неограниченный трафик\n\
         ✅ Высокая скорость\n\
         ✅ Защита от блокировок\n\n\
         <b>Стоимость:</b> {} {} за {} дней\n\n\
         <b>Как это работает:</b>\n\
         1. Нажимаете кнопку \"Купить VPN\"\n\
         2. Оплачиваете через СБП QR-код\n\
         3. Получаете доступ к VPN\n\n\
         Выберите действие ниже 👇",
        name,
        settings.price,
        currency_label(&settings.currency),
        settings.vpn_duration_days
    )
}

/// Reply to the `?start=success|fail` deep link the gateway redirects to.
pub fn return_from_gateway(param: &str) -> Option<&'static str> {
    match param {
        "success" => Some(
            "✅ <b>Спасибо за оплату!</b>\n\nКак только платеж подтвердится, \
             бот пришлет ссылку на VPN. Можно также нажать «Проверить статус» в счете.",
        ),
        "fail" => Some("❌ <b>Оплата не прошла.</b>\n\nПопробуйте создать новый счет."),
        _ => None,
    }
}

pub fn help(settings: &Settings) -> String {
    format!(
        "<b>📞 Помощь и поддержка</b>\n\n\
         <b>Как купить VPN:</b>\n\
         1. Нажмите кнопку \"Купить VPN доступ\"\n\
         2. Оплатите {price} {cur} через СБП QR-код\n\
         3. Получите ссылку на VPN конфигурацию\n\n\
         <b>Что делать после оплаты:</b>\n\
         1. Нажмите кнопку \"Получить VPN доступ\"\n\
         2. Нажмите «Подключить» на открывшейся странице\n\n\
         <b>Техническая информация:</b>\n\
         • Цена: {price} {cur} за {days} дней\n\
         • Сайт: {web}",
        price = settings.price,
        cur = currency_label(&settings.currency),
        days = settings.vpn_duration_days,
        web = escape(&settings.web_url),
    )
}

pub fn invoice(order: &Order) -> String {
    format!(
        "✅ <b>Счет на {} {} создан!</b>\n\n\
         <b>ID заказа:</b> <code>{}</code>\n\
         <b>Метод оплаты:</b> СБП QR-код\n\n\
         Нажмите кнопку ниже для оплаты. После успешной оплаты вы автоматически получите доступ к VPN.",
        order.amount,
        currency_label(&order.currency),
        escape(&order.order_id)
    )
}

pub const PAYMENT_UNAVAILABLE: &str = "❌ <b>Не удалось создать платеж</b>\n\nПопробуйте позже.";
pub const CREATING_PAYMENT: &str = "🔄 <b>Создаю ссылку для оплаты...</b>";
pub const ORDER_NOT_FOUND: &str = "❌ Платеж не найден";
pub const ORDER_PENDING: &str = "⏳ Платеж еще не получен. Если вы уже оплатили, подождите 1-2 минуты.";
pub const ORDER_FAILED: &str = "❌ Платеж отменен или не прошел. Создайте новый счет.";
pub const ACCESS_DENIED: &str = "⛔ У вас нет доступа к админ панели.";
pub const INTERNAL_ERROR: &str = "⚠️ Произошла ошибка. Попробуйте позже.";

pub fn payment_confirmed(duration_days: i64) -> String {
    format!(
        "✅ <b>Оплата подтверждена!</b>\n\n\
         Ваш VPN доступ активирован на <b>{} дней</b>.\n\n\
         Нажмите кнопку ниже, чтобы получить доступ:",
        duration_days
    )
}

pub fn owner_status(user_id: i64, first_name: Option<&str>, summary: &OwnerSummary, recent: &[Order]) -> String {
    let mut text = format!(
        "<b>📊 Ваш статус</b>\n\n\
         👤 Пользователь: {}\n\
         🆔 ID: {}\n\
         📅 Оплаченных заказов: {}\n\
         💰 Всего платежей: {}",
        first_name.filter(|n| !n.is_empty()).map(escape).unwrap_or_else(|| "N/A".to_string()),
        user_id,
        summary.successful,
        summary.total
    );

    if !recent.is_empty() {
        text.push_str("\n\n<b>🧾 Последние заказы</b>\n");
        for order in recent {
            text.push_str(&format!(
                "{} <code>{}</code> · {} {}\n",
                status_icon(order),
                escape(&order.order_id),
                order.amount,
                currency_label(&order.currency)
            ));
        }
    }
    text
}

pub fn admin_panel(users: i64, totals: &OrderTotals, currency: &str) -> String {
    format!(
        "<b>👑 Админ панель</b>\n\n\
         📊 Статистика:\n\
         • Всего пользователей: {}\n\
         • Всего платежей: {}\n\
         • Оплачено: {}\n\
         • Общий доход: {} {}",
        users,
        totals.orders,
        totals.successful,
        totals.income,
        currency_label(currency)
    )
}

pub fn admin_payments(orders: &[Order]) -> String {
    if orders.is_empty() {
        return "💳 Платежей пока нет.".to_string();
    }

    let mut text = String::from("<b>💳 Последние платежи</b>\n\n");
    for order in orders {
        text.push_str(&format!(
            "{} <code>{}</code>\n   {} {} · {} · {}\n",
            status_icon(order),
            escape(&order.order_id),
            order.amount,
            escape(&order.currency),
            order.owner_id,
            order.created_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    text
}

pub fn admin_users(users: &[User]) -> String {
    if users.is_empty() {
        return "👥 Пользователей пока нет.".to_string();
    }

    let mut text = String::from("<b>👥 Последние пользователи</b>\n\n");
    for user in users {
        let handle = user
            .username
            .as_deref()
            .map(|u| format!(" @{}", escape(u)))
            .unwrap_or_default();
        text.push_str(&format!(
            "• <code>{}</code>{} {}\n",
            user.telegram_id,
            handle,
            escape(user.first_name.as_deref().unwrap_or(""))
        ));
    }
    text
}

fn status_icon(order: &Order) -> &'static str {
    match order.status {
        OrderStatus::Success => "✅",
        OrderStatus::Pending => "⏳",
        OrderStatus::Failed => "❌",
    }
}

fn currency_label(currency: &str) -> &str {
    match currency {
        "RUB" => "руб.",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: 1,
            order_id: "vpn_42_1000".into(),
            owner_id: 42,
            amount: 100,
            currency: "RUB".into(),
            description: None,
            status,
            fulfillment_token: "token".into(),
            external_transaction_id: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn welcome_escapes_user_name() {
        let text = welcome(Some("<b>Eve</b>"), &Settings::default());
        assert!(text.contains("&lt;b&gt;Eve&lt;/b&gt;"));
        assert!(text.contains("100 руб. за 30 дней"));
    }

    #[test]
    fn invoice_mentions_order_id() {
        let text = invoice(&order(OrderStatus::Pending));
        assert!(text.contains("<code>vpn_42_1000</code>"));
        assert!(text.contains("100 руб."));
    }

    #[test]
    fn payments_list_marks_status() {
        let text = admin_payments(&[order(OrderStatus::Success), order(OrderStatus::Failed)]);
        assert!(text.contains("✅ <code>vpn_42_1000</code>"));
        assert!(text.contains("❌ <code>vpn_42_1000</code>"));
        assert_eq!(admin_payments(&[]), "💳 Платежей пока нет.");
    }

    #[test]
    fn owner_status_lists_recent_orders() {
        let summary = OwnerSummary { total: 2, successful: 1 };
        let text = owner_status(42, Some("Ann"), &summary, &[order(OrderStatus::Success), order(OrderStatus::Pending)]);
        assert!(text.contains("Оплаченных заказов: 1"));
        assert!(text.contains("✅ <code>vpn_42_1000</code> · 100 руб."));
        assert!(text.contains("⏳ <code>vpn_42_1000</code>"));

        let empty = owner_status(42, None, &OwnerSummary { total: 0, successful: 0 }, &[]);
        assert!(!empty.contains("Последние заказы"));
        assert!(empty.contains("N/A"));
    }

    #[test]
    fn only_known_start_params_get_a_reply() {
        assert!(return_from_gateway("success").is_some());
        assert!(return_from_gateway("fail").is_some());
        assert!(return_from_gateway("ref123").is_none());
    }
}
