pub mod order_repo;
pub mod user_repo;

pub use order_repo::OrderRepository;
pub use user_repo::UserRepository;
