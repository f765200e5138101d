//! Insights service
//!
//! Owns the catalog, the gateway fan-out, the filter injector and the column
//! cache. Every view is an `impl InsightsService` block in its own module.

use crate::aggregate::{PeriodAccumulator, PeriodGrain};
use crate::catalog::fragments::{period_stream, StreamKind};
use crate::catalog::{Campaign, CampaignCatalog};
use crate::config::AnalysisSettings;
use crate::error::Result;
use crate::execution::{ColumnSupportCache, QueryExecutor, QueryGateway};
use crate::filters::{FilterInjector, FilterSet};
use crate::query::{ComposedQuery, DateRange, FragmentSpec};
use crate::rows::Row;
use std::sync::Arc;

/// Date range and filters of one view request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewRequest {
    pub range: Option<DateRange>,
    pub filters: FilterSet,
}

impl ViewRequest {
    /// Malformed, partial or inverted dates mean no range.
    pub fn new(from: Option<&str>, to: Option<&str>, filters: FilterSet) -> Self {
        Self {
            range: DateRange::parse(from, to),
            filters: filters.normalized(),
        }
    }

    pub fn range(&self) -> Option<&DateRange> {
        self.range.as_ref()
    }

    /// Filters of views that only accept login-level filters.
    pub fn login_scoped(&self) -> Self {
        Self {
            range: self.range,
            filters: self.filters.login_scoped(),
        }
    }
}

pub struct InsightsService {
    pub(crate) catalog: Arc<CampaignCatalog>,
    pub(crate) executor: QueryExecutor,
    pub(crate) injector: FilterInjector,
    pub(crate) column_cache: Arc<ColumnSupportCache>,
    pub(crate) settings: AnalysisSettings,
}

impl InsightsService {
    pub fn new(
        catalog: Arc<CampaignCatalog>,
        gateway: Arc<dyn QueryGateway>,
        column_cache: Arc<ColumnSupportCache>,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            catalog,
            executor: QueryExecutor::new(gateway),
            injector: FilterInjector::default(),
            column_cache,
            settings,
        }
    }

    pub(crate) fn compose(
        &self,
        campaign: &Campaign,
        spec: &FragmentSpec<'_>,
        request: &ViewRequest,
    ) -> Result<ComposedQuery> {
        self.injector
            .compose(spec, &campaign.database, &request.filters, request.range())
    }

    pub(crate) async fn run(&self, campaign: &Campaign, query: ComposedQuery) -> Result<Vec<Row>> {
        self.executor.run(&campaign.database, query).await
    }

    /// Compose and run one fragment.
    pub(crate) async fn fetch(
        &self,
        campaign: &Campaign,
        spec: &FragmentSpec<'_>,
        request: &ViewRequest,
    ) -> Result<Vec<Row>> {
        let query = self.compose(campaign, spec, request)?;
        self.run(campaign, query).await
    }

    /// Fetch one event stream into a fresh accumulator of `grain`.
    pub(crate) async fn fetch_stream(
        &self,
        campaign: &Campaign,
        kind: StreamKind,
        grain: PeriodGrain,
        request: &ViewRequest,
    ) -> Result<PeriodAccumulator> {
        let stream = period_stream(kind, grain);
        let rows = self.fetch(campaign, &stream.fragment.spec(), request).await?;
        let mut accumulator = PeriodAccumulator::new(grain);
        accumulator.merge_rows(&rows, stream.measures);
        Ok(accumulator)
    }
}
