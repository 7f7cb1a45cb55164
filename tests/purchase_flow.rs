//! End-to-end flows over the in-process backend: the buyer's checkout
//! paths, the seller's fulfillment and refund handling, and the money
//! movements between them.

use bazaar_client::api::MarketApi;
use bazaar_client::cart::{CartItem, CartStore, MemoryStorage};
use bazaar_client::checkout::{Checkout, CheckoutForm, PaymentMethod};
use bazaar_client::domain::{Approval, OrderStatus};
use bazaar_client::earnings::seller_earnings;
use bazaar_client::money::Amount;
use bazaar_client::session::{Role, Session};
use bazaar_client::testing::InMemoryMarket;
use bazaar_client::workflow::fulfillment::FulfillmentBoard;
use bazaar_client::workflow::refund::{RefundRequestBook, RefundRequestDesk};
use bazaar_client::MarketError;

const BUYER: u64 = 1;
const SELLER: u64 = 10;

fn form() -> CheckoutForm {
    CheckoutForm {
        shipping_address: "Ulaanbaatar, SBD, 1st khoroo".into(),
        phone: "99112233".into(),
        notes: String::new(),
    }
}

async fn cart_for(market: &InMemoryMarket, product_id: u64, qty: u32) -> CartStore<MemoryStorage> {
    let api = market.as_user(BUYER);
    let product = api.product(product_id).await.unwrap();
    let mut cart = CartStore::open(MemoryStorage::default()).unwrap();
    cart.add(CartItem {
        product_id: product.id,
        name: product.name,
        unit_price: product.price,
        quantity: qty,
        stock: product.stock,
        image_url: None,
    })
    .unwrap();
    cart
}

#[tokio::test]
async fn test_wallet_purchase_settles_and_clears_cart() {
    let market = InMemoryMarket::new();
    let pid = market.seed_product(SELLER, "Felt slippers", 25_000, 3);
    market.open_wallet(BUYER, 100_000);
    let api = market.as_user(BUYER);

    let mut cart = cart_for(&market, pid, 2).await;
    assert_eq!(cart.total(), Amount::new(50_000));

    let wallet = api.my_wallet().await.unwrap();
    let mut checkout = Checkout::new();
    let receipt = checkout
        .submit(&api, &mut cart, &form(), PaymentMethod::Wallet, wallet.balance)
        .await
        .unwrap();

    assert!(cart.is_empty());
    assert_eq!(receipt.order.total_amount, Amount::new(50_000));
    assert_eq!(receipt.order.status, OrderStatus::Pending);
    // the receipt's wallet is the re-fetched authoritative balance
    assert_eq!(receipt.wallet.unwrap().balance, Amount::new(50_000));
    assert_eq!(api.my_wallet().await.unwrap().balance, Amount::new(50_000));
}

#[tokio::test]
async fn test_bank_transfer_clears_cart_without_wallet() {
    let market = InMemoryMarket::new();
    let pid = market.seed_product(SELLER, "Felt slippers", 25_000, 3);
    market.open_wallet(BUYER, 1_000);
    let api = market.as_user(BUYER);

    let mut cart = cart_for(&market, pid, 2).await;
    let mut checkout = Checkout::new();
    // the balance would never cover this; the bank path does not care
    let receipt = checkout
        .submit(&api, &mut cart, &form(), PaymentMethod::BankTransfer, Amount::new(1_000))
        .await
        .unwrap();

    assert!(cart.is_empty());
    assert!(receipt.wallet.is_none());
    assert_eq!(receipt.order.status, OrderStatus::Pending);
    // no wallet interaction happened
    assert_eq!(api.my_wallet().await.unwrap().balance, Amount::new(1_000));
}

#[tokio::test]
async fn test_delivery_then_refund_roundtrip() {
    let market = InMemoryMarket::new();
    let pid = market.seed_product(SELLER, "Felt slippers", 25_000, 3);
    market.open_wallet(BUYER, 100_000);
    let buyer_api = market.as_user(BUYER);
    let seller_api = market.as_user(SELLER);
    let buyer = Session::new(BUYER, Role::Buyer);
    let seller = Session::new(SELLER, Role::Seller);

    let mut cart = cart_for(&market, pid, 2).await;
    let mut checkout = Checkout::new();
    let receipt = checkout
        .submit(&buyer_api, &mut cart, &form(), PaymentMethod::Wallet, Amount::new(100_000))
        .await
        .unwrap();
    let order_id = receipt.order.id;

    // seller walks the chain one legal step at a time
    let mut board = FulfillmentBoard::new();
    board.refresh(&seller_api).await.unwrap();
    for expected in [OrderStatus::Confirmed, OrderStatus::Shipped, OrderStatus::Delivered] {
        let change = board.request_advance(&seller, order_id).unwrap();
        assert_eq!(change.status, expected);
        board.confirm(&seller_api, &seller).await.unwrap();
    }

    let report = seller_earnings(board.orders(), SELLER, chrono::Utc::now());
    assert_eq!(report.total_earned, Amount::new(47_500));
    assert_eq!(report.total_commission, Amount::new(2_500));
    assert_eq!(report.delivered_order_count, 1);

    // refund after delivery is the primary scenario
    let order = buyer_api
        .my_orders()
        .await
        .unwrap()
        .into_iter()
        .find(|o| o.id == order_id)
        .unwrap();
    let mut book = RefundRequestBook::new();
    let request = book
        .submit(&buyer_api, &buyer, &order, Amount::new(25_000), Some("wrong size".into()))
        .await
        .unwrap();
    assert_eq!(request.status, Approval::Pending);

    // a second request for the same order is stopped before any request is sent
    let err = book
        .submit(&buyer_api, &buyer, &order, Amount::new(25_000), None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::RefundAlreadyPending(_)));

    let mut desk = RefundRequestDesk::new();
    desk.refresh(&seller_api).await.unwrap();
    desk.approve(&seller_api, &seller, request.id).await.unwrap();

    // balance after purchase (50,000) plus the credited refund
    assert_eq!(buyer_api.my_wallet().await.unwrap().balance, Amount::new(75_000));
}

#[tokio::test]
async fn test_stale_balance_is_a_business_rejection_not_a_sale() {
    let market = InMemoryMarket::new();
    let pid = market.seed_product(SELLER, "Felt slippers", 25_000, 3);
    market.open_wallet(BUYER, 100_000);
    let api = market.as_user(BUYER);

    let mut cart = cart_for(&market, pid, 2).await;
    // the balance changes concurrently after the client read it
    market.drain_wallet(BUYER);

    let mut checkout = Checkout::new();
    let err = checkout
        .submit(&api, &mut cart, &form(), PaymentMethod::Wallet, Amount::new(100_000))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Rejected(_)));
    // nothing moved: cart intact, stock intact, balance untouched
    assert_eq!(cart.item_count(), 1);
    assert_eq!(api.product(pid).await.unwrap().stock, 3);
    assert_eq!(api.my_wallet().await.unwrap().balance, Amount::ZERO);
    // and the guard is free for the retry
    assert!(!checkout.in_progress());
}
