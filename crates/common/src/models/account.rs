use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub broker: Option<String>,
    pub currency: String,
    pub starting_balance: Decimal,
    pub current_balance: Decimal,
    pub is_active: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct AccountInsert {
    pub user_id: i64,
    pub name: String,
    pub broker: Option<String>,
    pub currency: String,
    pub starting_balance: Decimal,
    pub current_balance: Decimal,
}
