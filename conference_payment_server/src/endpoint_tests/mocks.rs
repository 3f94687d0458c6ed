use conference_payment_engine::{
    db_types::{NewUserAccount, Order, PaymentOption, TradeNo, UserAccount},
    traits::{AccountApiError, AccountManagement, PaymentOptionError, PaymentOptions},
};
use mockall::mock;

mock! {
    pub AccountManager {}
    impl AccountManagement for AccountManager {
        async fn fetch_user(&self, user_id: &str) -> Result<Option<UserAccount>, AccountApiError>;
        async fn upsert_user(&self, user: NewUserAccount) -> Result<UserAccount, AccountApiError>;
        async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, AccountApiError>;
        async fn fetch_order_by_trade_no(&self, trade_no: &TradeNo) -> Result<Option<Order>, AccountApiError>;
        async fn fetch_trade_nos_for_user(&self, user_id: &str) -> Result<Vec<TradeNo>, AccountApiError>;
    }
}

mock! {
    pub PaymentOptionsManager {}
    impl PaymentOptions for PaymentOptionsManager {
        async fn fetch_payment_option(&self, option_id: &str) -> Result<Option<PaymentOption>, PaymentOptionError>;
        async fn fetch_payment_options(&self) -> Result<Vec<PaymentOption>, PaymentOptionError>;
        async fn upsert_payment_option(&self, option: PaymentOption) -> Result<PaymentOption, PaymentOptionError>;
    }
}
