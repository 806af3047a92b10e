pub mod account;
pub mod trade;
pub mod user;

pub use account::{Account, AccountInsert};
pub use trade::{Direction, ParseEnumError, Trade, TradeInsert, TradeStatus};
pub use user::User;
