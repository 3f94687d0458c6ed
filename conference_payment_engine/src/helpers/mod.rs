mod trade_no;

pub use trade_no::{new_trade_no, TRADE_NO_LENGTH};
