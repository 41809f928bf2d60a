pub mod delhivery;
pub mod nimbuspost;
pub mod shiprocket;
pub mod token;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use shipdesk_core::carrier::CarrierClient;
use shipdesk_core::order::CarrierKind;

pub use delhivery::{DelhiveryClient, DelhiveryConfig};
pub use nimbuspost::{NimbusClient, NimbusConfig};
pub use shiprocket::{ShiprocketClient, ShiprocketConfig};
pub use token::{TokenCache, TokenProvider};

/// Build the adapter registry for all integrated carriers.
pub fn carrier_registry(
    shiprocket: ShiprocketConfig,
    delhivery: DelhiveryConfig,
    nimbuspost: NimbusConfig,
    token_ttl: Duration,
) -> HashMap<CarrierKind, Arc<dyn CarrierClient>> {
    let mut registry: HashMap<CarrierKind, Arc<dyn CarrierClient>> = HashMap::new();
    registry.insert(
        CarrierKind::Shiprocket,
        Arc::new(ShiprocketClient::new(shiprocket, token_ttl)),
    );
    registry.insert(
        CarrierKind::Delhivery,
        Arc::new(DelhiveryClient::new(delhivery)),
    );
    registry.insert(
        CarrierKind::Nimbuspost,
        Arc::new(NimbusClient::new(nimbuspost, token_ttl)),
    );
    registry
}
