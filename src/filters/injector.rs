//! Filter Injector
//!
//! Applies a [`FilterSet`] to a composed fragment at the grain of its base
//! table. Columns the base table carries become direct predicates; login and
//! user attributes living elsewhere are applied through an `idmask IN (...)`
//! subquery against `mc_logins` or `mc_users`.

use crate::error::Result;
use crate::filters::capability::{
    CapabilityMap, IDMASK_COLUMN, IP_COLUMN, LOGINS_TABLE, LOGIN_DATE_COLUMN, LOGIN_TYPE_COLUMN,
    SEGMENT_COLUMN, USERS_TABLE, USER_TYPE_COLUMN,
};
use crate::filters::filter_set::FilterSet;
use crate::query::composer::{
    column_ref, detect_table_alias, push_date_predicate, substitute_database, FragmentSpec,
    DB_PLACEHOLDER,
};
use crate::query::fragment::QueryFragment;
use crate::query::params::{ComposedQuery, DateRange, SqlParam, PARAM_MARKER};
use tracing::debug;

pub struct FilterInjector {
    capabilities: CapabilityMap,
}

impl FilterInjector {
    pub fn new(capabilities: CapabilityMap) -> Self {
        Self { capabilities }
    }

    /// Parse the template, add the date range and filters. `{db}` stays unresolved.
    pub fn build(
        &self,
        spec: &FragmentSpec<'_>,
        filters: &FilterSet,
        range: Option<&DateRange>,
    ) -> QueryFragment {
        let mut fragment = QueryFragment::parse(spec.template);
        if let (Some(column), Some(range)) = (spec.date_column, range) {
            push_date_predicate(&mut fragment, column, range);
        }
        let base_table = spec.resolved_base_table();
        self.apply(&mut fragment, spec.template, base_table.as_deref(), filters, range);
        fragment
    }

    /// Complete statement for one campaign schema.
    pub fn compose(
        &self,
        spec: &FragmentSpec<'_>,
        database: &str,
        filters: &FilterSet,
        range: Option<&DateRange>,
    ) -> Result<ComposedQuery> {
        // fail on a broken template before doing any work on it
        substitute_database(spec.template, database)?;
        let statement = self.build(spec, filters, range).to_statement();
        Ok(ComposedQuery::new(
            substitute_database(&statement.sql, database)?,
            statement.params,
        ))
    }

    /// Append filter predicates for `base_table` to the fragment.
    ///
    /// Fragments over a table missing from the capability map are left as is.
    pub fn apply(
        &self,
        fragment: &mut QueryFragment,
        template: &str,
        base_table: Option<&str>,
        filters: &FilterSet,
        range: Option<&DateRange>,
    ) {
        let filters = filters.normalized();
        let Some(table) = base_table else {
            debug!("No base table for fragment, filters not applied");
            return;
        };
        let Some(caps) = self.capabilities.get(table) else {
            debug!("No capability descriptor for table {}, filters not applied", table);
            return;
        };

        let alias = detect_table_alias(template, table);
        let column = |name: &str| column_ref(alias.as_deref(), name);

        if let Some(user_id) = &filters.user_id {
            if caps.idmask {
                fragment.push_predicate(
                    format!("{} = {}", column(IDMASK_COLUMN), PARAM_MARKER),
                    vec![SqlParam::from(user_id.as_str())],
                );
            }
        }

        let mut login_conditions: Vec<(&str, &String)> = Vec::new();
        if let Some(login_type) = &filters.login_type {
            if caps.login_type {
                fragment.push_predicate(
                    format!("{} = {}", column(LOGIN_TYPE_COLUMN), PARAM_MARKER),
                    vec![SqlParam::from(login_type.as_str())],
                );
            } else {
                login_conditions.push((LOGIN_TYPE_COLUMN, login_type));
            }
        }
        if let Some(user_ip) = &filters.user_ip {
            if caps.ip {
                fragment.push_predicate(
                    format!("{} = {}", column(IP_COLUMN), PARAM_MARKER),
                    vec![SqlParam::from(user_ip.as_str())],
                );
            } else {
                login_conditions.push((IP_COLUMN, user_ip));
            }
        }

        let mut user_conditions: Vec<(&str, &String)> = Vec::new();
        for (name, value) in [
            (SEGMENT_COLUMN, &filters.segment),
            (USER_TYPE_COLUMN, &filters.user_type),
        ] {
            if let Some(value) = value {
                if caps.user_attributes {
                    fragment.push_predicate(
                        format!("{} = {}", column(name), PARAM_MARKER),
                        vec![SqlParam::from(value.as_str())],
                    );
                } else {
                    user_conditions.push((name, value));
                }
            }
        }

        if !caps.idmask {
            if !login_conditions.is_empty() || !user_conditions.is_empty() {
                debug!("Table {} has no idmask column, subquery filters skipped", table);
            }
            return;
        }

        if !login_conditions.is_empty() {
            let (sql, params) =
                idmask_subquery(LOGINS_TABLE, &login_conditions, range.map(|r| (LOGIN_DATE_COLUMN, r)));
            fragment.push_predicate(format!("{} IN ({})", column(IDMASK_COLUMN), sql), params);
        }
        if !user_conditions.is_empty() {
            let (sql, params) = idmask_subquery(USERS_TABLE, &user_conditions, None);
            fragment.push_predicate(format!("{} IN ({})", column(IDMASK_COLUMN), sql), params);
        }
    }
}

impl Default for FilterInjector {
    fn default() -> Self {
        Self::new(CapabilityMap::standard())
    }
}

fn idmask_subquery(
    table: &str,
    conditions: &[(&str, &String)],
    date_bound: Option<(&str, &DateRange)>,
) -> (String, Vec<SqlParam>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    for (column, value) in conditions {
        clauses.push(format!("{} = {}", column, PARAM_MARKER));
        params.push(SqlParam::from(value.as_str()));
    }
    if let Some((column, range)) = date_bound {
        clauses.push(format!("{} BETWEEN {} AND {}", column, PARAM_MARKER, PARAM_MARKER));
        params.extend(range.bounds());
    }
    let sql = format!(
        "SELECT DISTINCT {} FROM {}.{} WHERE {}",
        IDMASK_COLUMN,
        DB_PLACEHOLDER,
        table,
        clauses.join(" AND ")
    );
    (sql, params)
}
