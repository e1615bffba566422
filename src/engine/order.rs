use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};

use crate::errors::{Error, InvalidOrder, Result};
use crate::utils::random_id;

/// Represents the direction of an order.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Open a long position.
    Buy,
    /// Sell a held position.
    Sell,
    /// Close long positions.
    Short,
    /// Cover a short position.
    Cover,
}

impl Direction {
    /// Returns the lowercase tag of the direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Short => "short",
            Self::Cover => "cover",
        }
    }
}

impl FromStr for Direction {
    type Err = InvalidOrder;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            "short" => Ok(Self::Short),
            "cover" => Ok(Self::Cover),
            other => Err(InvalidOrder::InvalidDirection(other.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the type of an order. Only market orders are filled; limit and stop
/// orders are valid but have no fill logic.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    /// Execute at the quoted price.
    Market,
    /// Execute at the price or better.
    Limit,
    /// Execute once the price is reached.
    Stop,
}

impl OrderType {
    /// Returns the lowercase tag of the order type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Limit => "limit",
            Self::Stop => "stop",
        }
    }
}

impl FromStr for OrderType {
    type Err = InvalidOrder;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "market" => Ok(Self::Market),
            "limit" => Ok(Self::Limit),
            "stop" => Ok(Self::Stop),
            other => Err(InvalidOrder::InvalidOrderType(other.to_string())),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trade request for a single asset.
///
/// Everything is fixed at construction except the submission and processing
/// timestamps, which can each be written once.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Order {
    id: u32,
    direction: Direction,
    order_type: OrderType,
    shares: u64,
    price: f64,
    ticker: String,
    submitted_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

type O1 = (Direction, OrderType, i64, f64);
impl TryFrom<O1> for Order {
    type Error = Error;

    fn try_from((direction, order_type, shares, price): O1) -> Result<Self> {
        Self::new(direction, order_type, shares, price, "")
    }
}

type O2<'a> = (&'a str, &'a str, i64, f64, &'a str);
impl TryFrom<O2<'_>> for Order {
    type Error = Error;

    fn try_from((direction, order_type, shares, price, ticker): O2<'_>) -> Result<Self> {
        Self::new(direction.parse()?, order_type.parse()?, shares, price, ticker)
    }
}

impl Order {
    /// Creates a validated order.
    ///
    /// ### Errors
    /// `InvalidShares` if `shares <= 0`, `InvalidPrice` if `price` is not a positive finite number.
    pub fn new(
        direction: Direction,
        order_type: OrderType,
        shares: i64,
        price: f64,
        ticker: impl Into<String>,
    ) -> Result<Self> {
        if shares <= 0 {
            return Err(InvalidOrder::InvalidShares(shares).into());
        }
        if price <= 0.0 || !price.is_finite() {
            return Err(InvalidOrder::InvalidPrice(price).into());
        }

        Ok(Self {
            id: random_id(),
            direction,
            order_type,
            shares: shares as u64,
            price,
            ticker: ticker.into(),
            submitted_at: None,
            processed_at: None,
        })
    }

    /// Starts a BUY order with the default market type, one share at 1.00.
    pub fn buy() -> OrderBuilder {
        OrderBuilder::builder(Direction::Buy)
    }

    /// Starts a SELL order with the default market type, one share at 1.00.
    pub fn sell() -> OrderBuilder {
        OrderBuilder::builder(Direction::Sell)
    }

    /// Starts a SHORT order with the default market type, one share at 1.00.
    pub fn short() -> OrderBuilder {
        OrderBuilder::builder(Direction::Short)
    }

    /// Starts a COVER order with the default market type, one share at 1.00.
    pub fn cover() -> OrderBuilder {
        OrderBuilder::builder(Direction::Cover)
    }

    /// Returns the order id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the order type.
    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// Returns the number of shares.
    pub fn shares(&self) -> u64 {
        self.shares
    }

    /// Returns the quoted price per share.
    pub fn price(&self) -> f64 {
        self.price
    }

    /// Returns the ticker, possibly empty.
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Returns when the order was queued, if it was.
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    /// Returns when the order was executed, if it was.
    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    /// Returns `true` if the order executes at the quoted price.
    pub fn is_market_type(&self) -> bool {
        matches!(self.order_type, OrderType::Market)
    }

    /// Returns `true` if `other` has the same id and asks for the same trade.
    ///
    /// Ids are random `u32`s, so two unrelated orders can share one.
    pub(crate) fn same_request(&self, other: &Order) -> bool {
        self.id == other.id
            && self.direction == other.direction
            && self.order_type == other.order_type
            && self.shares == other.shares
            && self.price == other.price
            && self.ticker == other.ticker
    }

    /// Returns the total amount of the order (price * shares).
    pub(crate) fn total(&self) -> f64 {
        self.price * self.shares as f64
    }

    /// Stamps the submission time. Fails with `InvalidState` if already set.
    pub fn set_submitted_at(&mut self, time: DateTime<Utc>) -> Result<()> {
        if let Some(previous) = self.submitted_at {
            return Err(Error::InvalidState(format!(
                "order #{} already submitted at {previous}",
                self.id
            )));
        }
        self.submitted_at = Some(time);
        Ok(())
    }

    /// Stamps the processing time. Fails with `InvalidState` if already set.
    pub fn set_processed_at(&mut self, time: DateTime<Utc>) -> Result<()> {
        if let Some(previous) = self.processed_at {
            return Err(Error::InvalidState(format!(
                "order #{} already processed at {previous}",
                self.id
            )));
        }
        self.processed_at = Some(time);
        Ok(())
    }

    /// Returns a plain snapshot of the order, suitable for logging or persistence.
    pub fn to_record(&self) -> OrderRecord {
        OrderRecord {
            ticker: self.ticker.clone(),
            order_type: self.order_type,
            direction: self.direction,
            shares: self.shares,
            price: self.price,
            submission_time: self.submitted_at,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Order #{}", self.id)?;
        writeln!(f, "\tTicker: {}", self.ticker)?;
        writeln!(f, "\tDirection: {}", self.direction)?;
        writeln!(f, "\tType: {}", self.order_type)?;
        writeln!(f, "\tShares: {}", self.shares)?;
        writeln!(f, "\tPrice: {:.2}", self.price)?;
        if let Some(time) = self.submitted_at {
            writeln!(f, "\tSubmitted: {}", time.format("%Y-%m-%d %H:%M:%S"))?;
        }
        if let Some(time) = self.processed_at {
            writeln!(f, "\tProcessed: {}", time.format("%Y-%m-%d %H:%M:%S"))?;
        }
        Ok(())
    }
}

/// Key-value snapshot of an order.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    /// Traded symbol.
    pub ticker: String,
    /// Order type.
    pub order_type: OrderType,
    /// Order direction.
    pub direction: Direction,
    /// Number of shares.
    pub shares: u64,
    /// Quoted price per share.
    pub price: f64,
    /// Time the order was queued.
    pub submission_time: Option<DateTime<Utc>>,
}

/// Builder behind the `Order::buy`/`sell`/`short`/`cover` helpers.
#[derive(Debug, Clone)]
pub struct OrderBuilder {
    direction: Direction,
    order_type: OrderType,
    shares: i64,
    price: f64,
    ticker: String,
}

impl OrderBuilder {
    /// Starts a market order for one share at 1.00.
    pub fn builder(direction: Direction) -> Self {
        Self {
            direction,
            order_type: OrderType::Market,
            shares: 1,
            price: 1.0,
            ticker: String::new(),
        }
    }

    /// Sets the order type.
    pub fn order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    /// Sets the number of shares.
    pub fn shares(mut self, shares: i64) -> Self {
        self.shares = shares;
        self
    }

    /// Sets the price per share.
    pub fn price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    /// Sets the ticker.
    pub fn ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = ticker.into();
        self
    }

    /// Validates and creates the order. Fails like [`Order::new`].
    pub fn build(self) -> Result<Order> {
        Order::new(self.direction, self.order_type, self.shares, self.price, self.ticker)
    }
}

#[cfg(test)]
fn spy_buy() -> Order {
    Order::new(Direction::Buy, OrderType::Market, 1, 10.0, "SPY").unwrap()
}

#[cfg(test)]
#[test]
fn create_simple_order() {
    let order = spy_buy();
    assert_eq!(order.ticker(), "SPY");
    assert_eq!(order.direction(), Direction::Buy);
    assert_eq!(order.order_type(), OrderType::Market);
    assert_eq!(order.shares(), 1);
    assert_eq!(order.price(), 10.0);
    assert_eq!(order.total(), 10.0);
    assert!(order.submitted_at().is_none());
    assert!(order.processed_at().is_none());
}

#[cfg(test)]
#[test]
fn reject_non_positive_shares() {
    let result = Order::new(Direction::Buy, OrderType::Market, -1, 10.0, "");
    assert!(matches!(result, Err(Error::InvalidOrder(InvalidOrder::InvalidShares(-1)))));

    let result = Order::new(Direction::Buy, OrderType::Market, 0, 10.0, "");
    assert!(matches!(result, Err(Error::InvalidOrder(InvalidOrder::InvalidShares(0)))));
}

#[cfg(test)]
#[test]
fn reject_bad_price() {
    for price in [0.0, -3.5, f64::NAN, f64::INFINITY] {
        let result = Order::new(Direction::Sell, OrderType::Market, 1, price, "");
        assert!(matches!(result, Err(Error::InvalidOrder(InvalidOrder::InvalidPrice(_)))));
    }
}

#[cfg(test)]
#[test]
fn reject_unknown_tags() {
    let result = Order::try_from(("BuY", "market", 10_i64, 10.0, ""));
    assert!(matches!(
        result,
        Err(Error::InvalidOrder(InvalidOrder::InvalidDirection(tag))) if tag == "BuY"
    ));

    let result = Order::try_from(("buy", "marrket", 10_i64, 54.93, "SPY"));
    assert!(matches!(
        result,
        Err(Error::InvalidOrder(InvalidOrder::InvalidOrderType(tag))) if tag == "marrket"
    ));
}

#[cfg(test)]
#[test]
fn parse_tags() {
    let order = Order::try_from(("cover", "stop", 3_i64, 8.45, "SPY")).unwrap();
    assert_eq!(order.direction(), Direction::Cover);
    assert_eq!(order.order_type(), OrderType::Stop);
    assert_eq!(order.direction().to_string(), "cover");
    assert_eq!(order.order_type().to_string(), "stop");
}

#[cfg(test)]
#[test]
fn order_equality() {
    let order1: Order = (Direction::Buy, OrderType::Market, 1_i64, 100.0).try_into().unwrap();
    let order2: Order = (Direction::Buy, OrderType::Market, 1_i64, 100.0).try_into().unwrap();
    assert_ne!(order1, order2);
    assert_eq!(order1, order1.clone());
}

#[cfg(test)]
#[test]
fn timestamps_are_write_once() {
    let mut order = spy_buy();
    let submitted = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    order.set_submitted_at(submitted).unwrap();
    assert_eq!(order.submitted_at(), Some(submitted));
    assert!(order.processed_at().is_none());

    let result = order.set_submitted_at(submitted);
    assert!(matches!(result, Err(Error::InvalidState(_))));
    assert_eq!(order.submitted_at(), Some(submitted));

    let processed = DateTime::from_timestamp(1_700_000_060, 0).unwrap();
    order.set_processed_at(processed).unwrap();
    assert_eq!(order.processed_at(), Some(processed));
    assert!(matches!(order.set_processed_at(processed), Err(Error::InvalidState(_))));
}

#[cfg(test)]
#[test]
fn order_record() {
    let mut order = spy_buy();
    let record = order.to_record();
    assert_eq!(record.ticker, "SPY");
    assert_eq!(record.order_type, OrderType::Market);
    assert_eq!(record.direction, Direction::Buy);
    assert_eq!(record.shares, 1);
    assert_eq!(record.price, 10.0);
    assert!(record.submission_time.is_none());

    let submitted = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    order.set_submitted_at(submitted).unwrap();
    assert_eq!(order.to_record().submission_time, Some(submitted));
}

#[cfg(test)]
#[test]
fn display_summary() {
    let mut order = Order::buy().shares(2).price(7.5).ticker("SPY").build().unwrap();
    let text = order.to_string();
    assert!(text.contains("Ticker: SPY"));
    assert!(text.contains("Direction: buy"));
    assert!(text.contains("Type: market"));
    assert!(text.contains("Shares: 2"));
    assert!(text.contains("Price: 7.50"));
    assert!(!text.contains("Submitted"));

    order
        .set_submitted_at(DateTime::from_timestamp(1_700_000_000, 0).unwrap())
        .unwrap();
    assert!(order.to_string().contains("Submitted: 2023-11-14 22:13:20"));
}

#[cfg(test)]
#[test]
fn factory_defaults() {
    let order = Order::buy().build().unwrap();
    assert_eq!(order.direction(), Direction::Buy);
    assert_eq!(order.order_type(), OrderType::Market);
    assert_eq!(order.shares(), 1);
    assert_eq!(order.price(), 1.0);
    assert_eq!(order.ticker(), "");

    assert_eq!(Order::sell().build().unwrap().direction(), Direction::Sell);
    assert_eq!(Order::short().build().unwrap().direction(), Direction::Short);
    assert_eq!(Order::cover().build().unwrap().direction(), Direction::Cover);
}

#[cfg(test)]
#[test]
fn factory_overrides() {
    let order = Order::short()
        .order_type(OrderType::Limit)
        .shares(10)
        .price(8.45)
        .ticker("SPY")
        .build()
        .unwrap();
    assert_eq!(order.direction(), Direction::Short);
    assert_eq!(order.order_type(), OrderType::Limit);
    assert_eq!(order.shares(), 10);
    assert_eq!(order.price(), 8.45);
    assert!(!order.is_market_type());

    let result = Order::sell().shares(0).build();
    assert!(matches!(result, Err(Error::InvalidOrder(InvalidOrder::InvalidShares(0)))));
}

#[cfg(test)]
#[test]
fn colliding_ids_do_not_match_the_queue_head() {
    use crate::engine::Account;

    let head = Order::buy().shares(2).price(10.0).build().unwrap();
    let mut other = Order::short().shares(2).price(10.0).build().unwrap();
    other.id = head.id;
    assert!(head == other);
    assert!(!head.same_request(&other));
    assert!(head.same_request(&head.clone()));

    let mut account = Account::new(1000.0);
    account.submit_order(head.clone(), None).unwrap();
    let result = account.execute_order(Some(&other));
    assert!(matches!(result, Err(Error::OrderMismatch(a, b)) if a == b));
    assert_eq!(account.submission_queue().count(), 1);

    assert!(account.execute_order(Some(&head)).unwrap().is_some());
}
