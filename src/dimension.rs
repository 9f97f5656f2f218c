//! Dimension keys - the partitioning tuple for all statistics
//!
//! A key is a tuple of up to five optional components. A rule declares which
//! components are "live" via a [`DimensionMask`]; collapsing a key to a mask
//! fixes non-live components to absent, so two keys differing only in
//! non-live components land on the same aggregate.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================
// DIMENSION KEY
// ============================================================

/// Composite statistics key. Equality and hash are structural over the
/// full tuple; `None` is the absent sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionKey {
    pub account_id: Option<String>,
    pub contract_id: Option<String>,
    pub product_id: Option<String>,
    pub exchange_id: Option<String>,
    pub account_group_id: Option<String>,
}

impl DimensionKey {
    /// Collapse to the given mask: non-live components become absent.
    pub fn masked(&self, mask: DimensionMask) -> DimensionKey {
        DimensionKey {
            account_id: if mask.account { self.account_id.clone() } else { None },
            contract_id: if mask.contract { self.contract_id.clone() } else { None },
            product_id: if mask.product { self.product_id.clone() } else { None },
            exchange_id: if mask.exchange { self.exchange_id.clone() } else { None },
            account_group_id: if mask.account_group {
                self.account_group_id.clone()
            } else {
                None
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.account_id.is_none()
            && self.contract_id.is_none()
            && self.product_id.is_none()
            && self.exchange_id.is_none()
            && self.account_group_id.is_none()
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            ("account", &self.account_id),
            ("contract", &self.contract_id),
            ("product", &self.product_id),
            ("exchange", &self.exchange_id),
            ("group", &self.account_group_id),
        ];
        write!(f, "[")?;
        let mut first = true;
        for (name, value) in parts {
            if let Some(value) = value {
                if !first {
                    write!(f, ",")?;
                }
                first = false;
                write!(f, "{}={}", name, value)?;
            }
        }
        write!(f, "]")
    }
}

// ============================================================
// LIVE-DIMENSION MASK
// ============================================================

/// Which components of a key a rule keeps live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionMask {
    #[serde(default)]
    pub account: bool,
    #[serde(default)]
    pub contract: bool,
    #[serde(default)]
    pub product: bool,
    #[serde(default)]
    pub exchange: bool,
    #[serde(default)]
    pub account_group: bool,
}

impl DimensionMask {
    pub const ACCOUNT: DimensionMask = DimensionMask {
        account: true,
        contract: false,
        product: false,
        exchange: false,
        account_group: false,
    };

    pub fn account() -> Self {
        Self::ACCOUNT
    }

    pub fn account_product() -> Self {
        DimensionMask {
            account: true,
            product: true,
            ..Default::default()
        }
    }

    pub fn account_contract() -> Self {
        DimensionMask {
            account: true,
            contract: true,
            ..Default::default()
        }
    }
}
