pub mod account_repo;
pub mod trade_repo;
pub mod user_repo;

pub use account_repo::AccountRepository;
pub use trade_repo::TradeRepository;
pub use user_repo::UserRepository;
