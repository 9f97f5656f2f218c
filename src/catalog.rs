//! Instrument catalog - static contract metadata
//!
//! Immutable after construction; reads are plain map lookups on frozen
//! maps, so resolution is lock-free. Missing mappings yield absent key
//! components, never errors.

use crate::dimension::DimensionKey;
use rustc_hash::FxHashMap;

/// Frozen contract -> product and contract -> exchange maps.
#[derive(Debug, Clone, Default)]
pub struct InstrumentCatalog {
    product_by_contract: FxHashMap<String, String>,
    exchange_by_contract: FxHashMap<String, String>,
}

impl InstrumentCatalog {
    pub fn new(
        products: impl IntoIterator<Item = (String, String)>,
        exchanges: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            product_by_contract: products.into_iter().collect(),
            exchange_by_contract: exchanges.into_iter().collect(),
        }
    }

    #[inline]
    pub fn product_of(&self, contract_id: &str) -> Option<&str> {
        self.product_by_contract.get(contract_id).map(String::as_str)
    }

    #[inline]
    pub fn exchange_of(&self, contract_id: &str) -> Option<&str> {
        self.exchange_by_contract.get(contract_id).map(String::as_str)
    }

    /// Build the full dimension key for an event's (enriched) raw fields.
    ///
    /// Product and exchange are looked up from the contract; an exchange id
    /// carried by the event itself wins over the catalog mapping.
    pub fn resolve(
        &self,
        account_id: Option<&str>,
        contract_id: Option<&str>,
        exchange_id: Option<&str>,
        account_group_id: Option<&str>,
    ) -> DimensionKey {
        let product_id = contract_id.and_then(|c| self.product_of(c));
        let exchange_id = exchange_id.or_else(|| contract_id.and_then(|c| self.exchange_of(c)));
        DimensionKey {
            account_id: account_id.map(str::to_owned),
            contract_id: contract_id.map(str::to_owned),
            product_id: product_id.map(str::to_owned),
            exchange_id: exchange_id.map(str::to_owned),
            account_group_id: account_group_id.map(str::to_owned),
        }
    }

    /// Export both maps as sorted entry lists (snapshot payload).
    pub fn export(&self) -> (Vec<(String, String)>, Vec<(String, String)>) {
        let mut products: Vec<_> = self
            .product_by_contract
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut exchanges: Vec<_> = self
            .exchange_by_contract
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        products.sort();
        exchanges.sort();
        (products, exchanges)
    }

    pub fn len(&self) -> usize {
        self.product_by_contract.len()
    }

    pub fn is_empty(&self) -> bool {
        self.product_by_contract.is_empty() && self.exchange_by_contract.is_empty()
    }
}
