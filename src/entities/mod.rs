pub mod stock;
pub mod stock_adjustment;
pub mod stock_alert;
pub mod stock_transfer;

pub use stock::Entity as Stock;
pub use stock_adjustment::Entity as StockAdjustment;
pub use stock_alert::Entity as StockAlert;
pub use stock_transfer::Entity as StockTransfer;
