pub mod connectivity;
pub mod factory;
mod traits;

pub use connectivity::{check_connectivity, ConnectivityReport};
pub use factory::build_gateway;
#[cfg(test)]
pub use traits::MockExchangeGateway;
pub use traits::{ExchangeGateway, ExchangeKind};
