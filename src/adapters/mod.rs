pub mod binance_futures;
pub mod paper;

pub use binance_futures::BinanceFuturesClient;
pub use paper::PaperGateway;
