// SPDX-License-Identifier: MIT OR Apache-2.0

//! Check whether users connect from an allowed source address.
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use tracing::warn;
use vouch_core::UserId;
use vouch_store::{GrantStore, IpRule};

/// Networks a user is allowed to connect from.
///
/// Computed independently of the permission calculation, callers combine both results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IpAccess {
    ranges: Vec<IpNetwork>,
}

impl IpAccess {
    /// Load the IP rules of a user, together with the ones of the default user when
    /// `inherit_from_default` is set.
    pub async fn load<S: GrantStore>(
        store: &S,
        user: UserId,
        inherit_from_default: bool,
    ) -> Result<Self, S::Error> {
        let mut rules = Vec::new();
        if inherit_from_default {
            let default_user = store.default_user().await?;
            rules.extend(store.ip_rules(default_user.id).await?);
        }
        rules.extend(store.ip_rules(user).await?);

        Ok(Self::from_rules(&rules))
    }

    /// Parse stored rules into networks.
    ///
    /// Without any rule all IPv4 and IPv6 addresses are allowed. Malformed ranges are skipped, a
    /// list of nothing but malformed ranges allows nobody.
    pub fn from_rules(rules: &[IpRule]) -> Self {
        if rules.is_empty() {
            return Self::parse(&[IpRule::new("0.0.0.0/0"), IpRule::new("::/0")]);
        }

        Self::parse(rules)
    }

    fn parse(rules: &[IpRule]) -> Self {
        let ranges = rules
            .iter()
            .filter_map(|rule| match rule.range.trim().parse::<IpNetwork>() {
                Ok(network) => Some(network),
                Err(err) => {
                    warn!("skipping malformed IP range {:?}: {}", rule.range, err);
                    None
                }
            })
            .collect();

        Self { ranges }
    }

    pub fn allowed_ranges(&self) -> &[IpNetwork] {
        &self.ranges
    }

    /// Returns `true` if the source address parses and lies within at least one allowed network.
    pub fn is_allowed(&self, source: &str) -> bool {
        let address = match source.trim().parse::<IpAddr>() {
            Ok(address) => address,
            Err(err) => {
                warn!("can't check access of malformed source address {:?}: {}", source, err);
                return false;
            }
        };

        self.ranges.iter().any(|network| network.contains(address))
    }
}
