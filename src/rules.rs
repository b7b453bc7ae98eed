use std::collections::BTreeSet;

use regex::RegexSet;

use crate::{auth::Role, config::GateConfig, error::ConfigError};

/// RouteClass
///
/// Result of classifying a path against the route tables, in priority order:
/// asset, then exempt, then public, then protected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteClass {
    Asset,
    Exempt,
    Public,
    /// Roles entitled to the path. Empty means nobody: either no role pattern matched
    /// (unclassified paths are protected by default) or the matching patterns disagree.
    Protected { entitled: BTreeSet<Role> },
}

/// An ordered list of patterns compiled into a single anchored `RegexSet`.
#[derive(Debug, Clone)]
pub struct PatternTable {
    set: RegexSet,
}

fn anchored(pattern: &str) -> String {
    format!("^(?:{pattern})$")
}

impl PatternTable {
    pub fn compile(table: &'static str, patterns: &[String]) -> Result<Self, ConfigError> {
        let set = RegexSet::new(patterns.iter().map(|p| anchored(p)))
            .map_err(|source| ConfigError::InvalidPattern { table, source })?;
        Ok(Self { set })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.set.is_match(path)
    }
}

/// RoleTable
///
/// The role-protected table keyed by pattern rather than by role: a pattern listed under
/// several roles is stored once with all of its owners.
#[derive(Debug, Clone)]
pub struct RoleTable {
    set: RegexSet,
    owners: Vec<BTreeSet<Role>>,
}

impl RoleTable {
    pub fn compile(config: &GateConfig) -> Result<Self, ConfigError> {
        let mut patterns: Vec<&str> = Vec::new();
        let mut owners: Vec<BTreeSet<Role>> = Vec::new();

        for (role, role_patterns) in &config.roles {
            for pattern in role_patterns {
                match patterns.iter().position(|p| *p == pattern.as_str()) {
                    Some(index) => {
                        owners[index].insert(*role);
                    }
                    None => {
                        patterns.push(pattern);
                        owners.push(BTreeSet::from([*role]));
                    }
                }
            }
        }

        let set = RegexSet::new(patterns.iter().map(|p| anchored(p))).map_err(|source| {
            ConfigError::InvalidPattern {
                table: "roles",
                source,
            }
        })?;

        Ok(Self { set, owners })
    }

    /// Roles allowed on `path`: the intersection of the owners of every matching pattern.
    /// A pattern owned by another role therefore denies even when a broader shared pattern
    /// also matches.
    pub fn entitled(&self, path: &str) -> BTreeSet<Role> {
        let mut matches = self.set.matches(path).into_iter();

        let Some(first) = matches.next() else {
            return BTreeSet::new();
        };

        matches.fold(self.owners[first].clone(), |acc, index| {
            acc.intersection(&self.owners[index]).copied().collect()
        })
    }
}

/// RouteTables
///
/// Every table the gate consults, compiled once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct RouteTables {
    pub asset: PatternTable,
    pub exempt: PatternTable,
    pub public: PatternTable,
    pub auth_pages: PatternTable,
    pub admin_area: PatternTable,
    pub roles: RoleTable,
}

impl RouteTables {
    pub fn compile(config: &GateConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            asset: PatternTable::compile("asset", &config.asset)?,
            exempt: PatternTable::compile("exempt", &config.exempt)?,
            public: PatternTable::compile("public", &config.public)?,
            auth_pages: PatternTable::compile("auth_pages", &config.auth_pages)?,
            admin_area: PatternTable::compile("admin_area", &config.admin_area)?,
            roles: RoleTable::compile(config)?,
        })
    }
}

/// classify
///
/// Pure classification of a path. A path may match several tables; the first one in
/// priority order wins, so a public page is never role-protected.
pub fn classify(path: &str, tables: &RouteTables) -> RouteClass {
    if tables.asset.is_match(path) {
        RouteClass::Asset
    } else if tables.exempt.is_match(path) {
        RouteClass::Exempt
    } else if tables.public.is_match(path) {
        RouteClass::Public
    } else {
        RouteClass::Protected {
            entitled: tables.roles.entitled(path),
        }
    }
}
