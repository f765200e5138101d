//! Table Capability Descriptor
//!
//! Static knowledge of which generic filter columns each campaign table
//! physically carries. Drives whether a filter becomes a direct predicate
//! or a correlated subquery.

use std::collections::HashMap;

pub const USERS_TABLE: &str = "mc_users";
pub const LOGINS_TABLE: &str = "mc_logins";
pub const REDEMPTIONS_TABLE: &str = "mc_redemptions";
pub const AWARDS_TABLE: &str = "mc_awards_logs";
pub const TWO_STEP_AUTHS_TABLE: &str = "mc_two_step_auths";
pub const TRACINGS_TABLE: &str = "mc_tracings";

pub const IDMASK_COLUMN: &str = "idmask";
pub const IP_COLUMN: &str = "ip";
pub const LOGIN_TYPE_COLUMN: &str = "type";
pub const SEGMENT_COLUMN: &str = "segment";
pub const USER_TYPE_COLUMN: &str = "user_type";
pub const LOGIN_DATE_COLUMN: &str = "date";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCapabilities {
    pub idmask: bool,
    pub ip: bool,
    pub login_type: bool,
    /// `segment` and `user_type`.
    pub user_attributes: bool,
}

impl TableCapabilities {
    pub const fn idmask_only() -> Self {
        Self {
            idmask: true,
            ip: false,
            login_type: false,
            user_attributes: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapabilityMap {
    tables: HashMap<String, TableCapabilities>,
}

impl CapabilityMap {
    pub fn empty() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    /// Descriptor for the fixed campaign schema.
    pub fn standard() -> Self {
        Self::empty()
            .with_table(
                LOGINS_TABLE,
                TableCapabilities {
                    idmask: true,
                    ip: true,
                    login_type: true,
                    user_attributes: false,
                },
            )
            .with_table(
                USERS_TABLE,
                TableCapabilities {
                    idmask: true,
                    ip: false,
                    login_type: false,
                    user_attributes: true,
                },
            )
            .with_table(REDEMPTIONS_TABLE, TableCapabilities::idmask_only())
            .with_table(AWARDS_TABLE, TableCapabilities::idmask_only())
            .with_table(TWO_STEP_AUTHS_TABLE, TableCapabilities::idmask_only())
            .with_table(TRACINGS_TABLE, TableCapabilities::idmask_only())
    }

    pub fn with_table(mut self, table: &str, capabilities: TableCapabilities) -> Self {
        self.tables.insert(table.to_string(), capabilities);
        self
    }

    pub fn get(&self, table: &str) -> Option<TableCapabilities> {
        self.tables.get(table).copied()
    }
}

impl Default for CapabilityMap {
    fn default() -> Self {
        Self::standard()
    }
}
