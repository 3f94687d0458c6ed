use uuid::Uuid;

use crate::db_types::TradeNo;

/// The gateway accepts at most 20 alphanumeric characters in `MerchantTradeNo`.
pub const TRADE_NO_LENGTH: usize = 20;

/// Mints a fresh trade number from a random UUID with the hyphens removed, cut down to [`TRADE_NO_LENGTH`].
pub fn new_trade_no() -> TradeNo {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(TRADE_NO_LENGTH);
    TradeNo(id)
}

#[cfg(test)]
mod test {
    use std::{collections::HashSet, str::FromStr};

    use super::*;

    #[test]
    fn trade_numbers_are_gateway_safe() {
        let ids = (0..500).map(|_| new_trade_no()).collect::<HashSet<TradeNo>>();
        assert_eq!(ids.len(), 500);
        for id in ids {
            assert_eq!(id.as_str().len(), TRADE_NO_LENGTH);
            assert!(TradeNo::from_str(id.as_str()).is_ok());
        }
    }
}
