use teloxide::{dptree, prelude::*, types::Update};
use tracing::info;

pub mod handlers;
pub mod keyboards;
pub mod messages;

/// Runs the long-polling dispatcher until it exits or a shutdown signal arrives.
pub async fn run_bot(
    bot: Bot,
    mut shutdown_signal: tokio::sync::broadcast::Receiver<()>,
    state: crate::AppState,
) {
    let handler = Update::filter_message().endpoint(handlers::command::message_handler);
    let callback_handler =
        Update::filter_callback_query().endpoint(handlers::callback::callback_handler);

    let mut dispatcher = Dispatcher::builder(bot, dptree::entry().branch(handler).branch(callback_handler))
        .dependencies(dptree::deps![state])
        .default_handler(|upd: std::sync::Arc<Update>| async move {
            info!("Unhandled update: {:?}", upd.id);
        })
        .build();

    tokio::select! {
        _ = dispatcher.dispatch() => {
            info!("Bot dispatcher exited naturally");
        }
        _ = shutdown_signal.recv() => {
            info!("Bot received shutdown signal, stopping...");
        }
    }
}
