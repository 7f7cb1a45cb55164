//! Bazaar Client - Marketplace Transactional Core Demo
//!
//! Drives the whole core against the in-process backend: moderation, cart,
//! wallet checkout, fulfillment, pre-orders, refunds, earnings.

use anyhow::{Context, Result};
use chrono::{Days, Utc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bazaar_client::api::MarketApi;
use bazaar_client::cart::{CartItem, CartStore, JsonFileStorage};
use bazaar_client::checkout::{Checkout, CheckoutForm, PaymentMethod};
use bazaar_client::domain::ProductStatus;
use bazaar_client::earnings::seller_earnings;
use bazaar_client::money::Amount;
use bazaar_client::session::{Role, Session};
use bazaar_client::testing::InMemoryMarket;
use bazaar_client::workflow::fulfillment::FulfillmentBoard;
use bazaar_client::workflow::moderation::ModerationQueue;
use bazaar_client::workflow::refund::{RefundRequestBook, RefundRequestDesk};
use bazaar_client::workflow::stock::{StockRequestBook, StockRequestDesk};

const BUYER: u64 = 1;
const SELLER: u64 = 10;
const ADMIN: u64 = 99;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let market = InMemoryMarket::new();
    let slippers = market.seed_pending_product(SELLER, "Felt slippers", 2_500_000, 3);
    let sold_out = market.seed_product(SELLER, "Carved chess set", 9_000_000, 0);

    let admin_api = market.as_user(ADMIN);
    let buyer_api = market.as_user(BUYER);
    let seller_api = market.as_user(SELLER);
    let admin = Session::new(ADMIN, Role::Admin);
    let buyer = Session::new(BUYER, Role::Buyer);
    let seller = Session::new(SELLER, Role::Seller);

    let wallet = buyer_api.top_up(Amount::new(10_000_000)).await?;
    tracing::info!(balance = %wallet.balance, "wallet funded");

    // the new product waits for moderation before it is listable
    let awaiting = admin_api.pending_products().await?;
    tracing::info!(awaiting = awaiting.len(), "moderation queue");
    let mut queue = ModerationQueue::new();
    queue.refresh(&admin_api).await?;
    queue.request(&admin, slippers, ProductStatus::Approved)?;
    let product = queue.confirm(&admin_api, &admin).await?;
    tracing::info!(product = %product.name, status = %product.status, "product listed");

    // buyer fills the cart and pays from the wallet
    let cart_path = std::env::var("CART_PATH").unwrap_or_else(|_| "bazaar-cart.json".into());
    let mut cart = CartStore::open(JsonFileStorage::new(&cart_path))?;
    cart.clear()?;
    let snapshot = buyer_api.product(slippers).await?;
    cart.add(CartItem {
        product_id: snapshot.id,
        name: snapshot.name.clone(),
        unit_price: snapshot.price,
        quantity: 2,
        stock: snapshot.stock,
        image_url: None,
    })?;
    tracing::info!(total = %cart.total(), items = cart.item_count(), "cart ready");

    let wallet = buyer_api.my_wallet().await?;
    let mut checkout = Checkout::new();
    let form = CheckoutForm {
        shipping_address: "Ulaanbaatar, SBD, 1st khoroo, bldg 12".into(),
        phone: "99112233".into(),
        notes: String::new(),
    };
    let receipt = checkout
        .submit(&buyer_api, &mut cart, &form, PaymentMethod::Wallet, wallet.balance)
        .await?;
    let order_id = receipt.order.id;
    let balance = receipt.wallet.map(|w| w.balance).unwrap_or(Amount::ZERO);
    tracing::info!(order_id, balance = %balance, "paid from wallet");

    // seller walks the order down the chain
    let mut board = FulfillmentBoard::new();
    board.refresh(&seller_api).await?;
    for _ in 0..3 {
        board.request_advance(&seller, order_id)?;
        let order = board.confirm(&seller_api, &seller).await?;
        tracing::info!(order_id, status = %order.status, "fulfillment step");
    }

    let report = seller_earnings(board.orders(), SELLER, chrono::Local::now());
    tracing::info!(
        total = %report.total_earned,
        this_month = %report.this_month_earned,
        commission = %report.total_commission,
        orders = report.delivered_order_count,
        "seller earnings"
    );

    // buyer pre-orders the sold-out chess set
    let mut preorders = StockRequestBook::new();
    let chess = buyer_api.product(sold_out).await?;
    let preorder = preorders.submit(&buyer_api, &buyer, &chess, 1).await?;
    let mut stock_desk = StockRequestDesk::new();
    stock_desk.refresh(&seller_api).await?;
    let restock = Utc::now()
        .date_naive()
        .checked_add_days(Days::new(14))
        .context("restock date out of range")?;
    stock_desk.request_approve(&seller, preorder.id, Some(restock))?;
    let approved = stock_desk.confirm(&seller_api, &seller).await?;
    tracing::info!(request_id = approved.id, date = ?approved.expected_completion_date, "pre-order approved");

    // one pair arrived scuffed; the service credits the wallet on approval
    let mut refunds = RefundRequestBook::new();
    let order = buyer_api
        .my_orders()
        .await?
        .into_iter()
        .find(|o| o.id == order_id)
        .context("order disappeared")?;
    let request = refunds
        .submit(&buyer_api, &buyer, &order, Amount::new(1_000_000), Some("one pair arrived scuffed".into()))
        .await?;
    let mut refund_desk = RefundRequestDesk::new();
    refund_desk.refresh(&seller_api).await?;
    refund_desk.approve(&seller_api, &seller, request.id).await?;
    let wallet = buyer_api.my_wallet().await?;
    tracing::info!(balance = %wallet.balance, "wallet after refund");

    let stats = admin_api.admin_stats().await?;
    tracing::info!(
        orders = stats.total_orders,
        pending_products = stats.pending_products,
        revenue = %stats.total_revenue,
        commission = %stats.total_commission_earned,
        "marketplace stats"
    );

    std::fs::remove_file(&cart_path).ok();
    Ok(())
}
