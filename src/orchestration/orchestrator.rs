use crate::config::{Config, Secrets};
use crate::datasource::{
    BuffMarketSource, CsFloatSource, CsMoneySource, DMarketSource, MarketSource, RateProvider,
    TimeWindow, YoupinSource,
};
use crate::domain::CompletedPair;
use crate::engine::{ReconcileSummary, Reconciler};
use crate::error::AppError;
use crate::orchestration::collector::collect;
use crate::report::{report_name, write_reports, ReportFormat};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Outcome of one reconciliation run.
#[derive(Debug)]
pub struct RunReport {
    pub pairs: Vec<CompletedPair>,
    pub summary: ReconcileSummary,
    pub files: Vec<PathBuf>,
}

/// Instantiate every marketplace enabled in `config`.
pub fn build_sources(config: &Config, secrets: &Secrets) -> Vec<Arc<dyn MarketSource>> {
    let mut sources: Vec<Arc<dyn MarketSource>> = Vec::new();

    if config.sources.dmarket {
        sources.push(Arc::new(DMarketSource::default_url(
            secrets.dmarket_key.clone(),
            config.dmarket_cs_only,
        )));
    }
    if config.sources.csfloat {
        sources.push(Arc::new(CsFloatSource::default_url(secrets.csfloat_key.clone())));
    }
    if config.sources.buffmarket {
        sources.push(Arc::new(BuffMarketSource::default_url(
            secrets.buffmarket_headers.clone(),
            secrets.buffmarket_cookies.clone(),
        )));
    }
    if config.sources.csmoney {
        sources.push(Arc::new(CsMoneySource::default_url(secrets.csmoney_cookies.clone())));
    }
    if config.sources.youpin {
        let rates = Arc::new(RateProvider::new(config.currency_api_url.clone()));
        sources.push(Arc::new(YoupinSource::default_url(
            secrets.youpin_headers.clone(),
            secrets.youpin_steam_id.clone(),
            rates,
        )));
    }

    sources
}

/// Report formats requested by `config`. JSON is always written.
pub fn report_formats(config: &Config) -> Vec<ReportFormat> {
    let mut formats = vec![ReportFormat::Json];
    if config.create_csv {
        formats.push(ReportFormat::Csv);
    }
    if config.create_xlsx {
        formats.push(ReportFormat::Xlsx);
    }
    formats
}

/// Collect, reconcile and write reports.
pub async fn run(config: &Config, sources: &[Arc<dyn MarketSource>]) -> Result<RunReport, AppError> {
    info!(
        sales_from = %config.sales_start_date,
        sales_until = %config.sales_end_date,
        buys_from = %config.buys_start.format_minutes(),
        policy = ?config.match_policy,
        "Starting reconciliation run"
    );

    let collected = collect(
        sources,
        TimeWindow::new(config.sales_start, config.sales_end),
        TimeWindow::new(config.buys_start, config.buys_end),
    )
    .await;

    let pairs = Reconciler::new(config.match_policy).reconcile(&collected.sales, &collected.buys);
    let summary = ReconcileSummary::from_pairs(&pairs);
    info!(
        sales = summary.sales,
        matched = summary.matched,
        unmatched = summary.unmatched,
        total_profit = %summary.total_profit,
        "Reconciliation complete"
    );

    let name = report_name(config.sales_start_date, config.sales_end_date);
    let files = write_reports(&pairs, &config.report_dir, &name, &report_formats(config))?;

    Ok(RunReport {
        pairs,
        summary,
        files,
    })
}
