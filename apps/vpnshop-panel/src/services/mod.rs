pub mod callback_service;
pub mod order_service;
pub mod platega;

pub use callback_service::{CallbackService, PaymentNotifier};
pub use order_service::OrderService;
pub use platega::{PaymentGateway, PlategaClient};
