//! Seller earnings
//!
//! Derives realized and pending revenue from delivered orders. The
//! marketplace keeps a fixed 5% commission; the seller receives the
//! remaining 95% of their subtotal on each delivered order.

use chrono::{DateTime, Datelike, TimeZone};

use crate::domain::{Order, OrderStatus};
use crate::money::Amount;
use crate::UserId;

pub const COMMISSION_PERCENT: i64 = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EarningsReport {
    pub total_earned: Amount,
    pub this_month_earned: Amount,
    pub delivered_order_count: u32,
    /// Recovered from the net figure as `total_earned × 5 / 95`, not summed
    /// per order. The two agree only while the commission rate is constant
    /// across all orders; if the rate ever varies per order or over time,
    /// switch to tracking gross commission per order instead of deriving it
    /// here.
    pub total_commission: Amount,
}

/// Walks the seller's order list and accumulates delivered earnings. Only
/// the seller's own line items count; a multi-seller order contributes its
/// seller-subtotal, not its grand total. `this_month_earned` covers orders
/// created in the calendar month of `now`; pass local time so the month
/// boundary matches what the viewer expects.
pub fn seller_earnings<Tz: TimeZone>(
    orders: &[Order],
    seller_id: UserId,
    now: DateTime<Tz>,
) -> EarningsReport {
    let mut total: i64 = 0;
    let mut this_month: i64 = 0;
    let mut count: u32 = 0;

    for order in orders.iter().filter(|o| o.status == OrderStatus::Delivered) {
        let subtotal = order.seller_subtotal(seller_id).minor_units();
        let earning = subtotal * (100 - COMMISSION_PERCENT) / 100;
        total += earning;
        count += 1;

        let created = order.created_at.with_timezone(&now.timezone());
        if created.year() == now.year() && created.month() == now.month() {
            this_month += earning;
        }
    }

    let commission = total * COMMISSION_PERCENT / (100 - COMMISSION_PERCENT);

    EarningsReport {
        total_earned: Amount::new(total),
        this_month_earned: Amount::new(this_month),
        delivered_order_count: count,
        total_commission: Amount::new(commission),
    }
}
