//! Engine orchestration: load, resolve, smooth, then hand out dispatchers.

use crate::catalog::{load_catalog, BinCatalog, BinId, BinRecord, CatalogError};
use crate::config::ConfigError;
use crate::evaluate::{DispatchOptions, EvaluationDispatcher};
use crate::exit_codes::ExitCode;
use crate::logging::{event_names, LogContext, Stage};
use crate::optimize::SensitivityOptimizer;
use crate::rates::{RateModel, RateModelError, TabulatedRateModel};
use crate::resolve::{ResolveError, ThresholdResolver};
use crate::smooth::{SmoothingReport, Smoother};
use gc_config::{EngineConfig, ThresholdPolicy};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    RateModel(#[from] RateModelError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl EngineError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            EngineError::Config(ConfigError::IoError { .. }) => ExitCode::IoError,
            EngineError::Config(_) | EngineError::Resolve(ResolveError::MissingRateModel(_)) => {
                ExitCode::ConfigError
            }
            EngineError::RateModel(RateModelError::Io { .. }) => ExitCode::IoError,
            EngineError::RateModel(_) => ExitCode::ConfigError,
            EngineError::Catalog(CatalogError::NoRoot) => ExitCode::ConfigError,
            EngineError::Catalog(_) => ExitCode::CatalogError,
            EngineError::Resolve(_) => ExitCode::InternalError,
        }
    }
}

/// Summary of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionReport {
    pub bins: usize,
    pub explicit: usize,
    pub optimized: usize,
    pub optimum_found: usize,
    pub capped: Vec<BinId>,
    pub smoothing: SmoothingReport,
    /// Bins that will reject every event.
    pub unresolved: Vec<BinId>,
    /// Edge bins skipped while loading.
    pub skipped: Vec<BinId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_hash: Option<String>,
}

/// Resolve every bin in parallel, then smooth.
pub fn resolve_catalog(
    catalog: &mut BinCatalog,
    config: &EngineConfig,
    rates: Option<&dyn RateModel>,
) -> Result<ResolutionReport, EngineError> {
    info!(
        target: event_names::RESOLVE_STARTED,
        stage = "resolve",
        bins = catalog.len(),
        rate_model = rates.is_some(),
        "resolving thresholds"
    );
    let optimizer = rates.map(|r| SensitivityOptimizer::new(r, &config.optimizer));
    let resolver = ThresholdResolver::new(&config.policy, optimizer);

    let results: Vec<Result<(), ResolveError>> = catalog
        .bins_mut()
        .par_iter_mut()
        .map(|bin| {
            let (policy, resolved) = resolver.resolve(bin)?;
            bin.policy = policy;
            bin.apply(&resolved);
            Ok(())
        })
        .collect();

    let mut report = ResolutionReport {
        bins: catalog.len(),
        ..ResolutionReport::default()
    };
    for (bin, result) in catalog.iter().zip(results) {
        result?;
        if bin.capped {
            report.capped.push(bin.id);
        }
        if bin.policy == ThresholdPolicy::OptimizeSensitivity {
            report.optimized += 1;
            if bin.optimum_found {
                report.optimum_found += 1;
            }
        } else {
            report.explicit += 1;
        }
    }

    report.smoothing = Smoother::new(&config.smoothing).apply(catalog);
    report.unresolved = catalog.unresolved();

    info!(
        target: event_names::RESOLVE_FINISHED,
        stage = "resolve",
        bins = report.bins,
        optimum_found = report.optimum_found,
        unresolved = report.unresolved.len(),
        "thresholds resolved"
    );
    Ok(report)
}

/// A resolved catalog ready for evaluation.
#[derive(Debug)]
pub struct CutEngine {
    config: EngineConfig,
    catalog: Arc<BinCatalog>,
    report: ResolutionReport,
}

impl CutEngine {
    /// Resolve an already-built catalog.
    pub fn initialize(
        config: EngineConfig,
        mut catalog: BinCatalog,
        rates: Option<&dyn RateModel>,
    ) -> Result<Self, EngineError> {
        let report = resolve_catalog(&mut catalog, &config, rates)?;
        Ok(Self {
            config,
            catalog: Arc::new(catalog),
            report,
        })
    }

    /// Load artifacts and the optional rate table named by the config.
    pub fn load(config: EngineConfig, ctx: &LogContext) -> Result<Self, EngineError> {
        let load = load_catalog(&config.artifacts, config.spectrum.index)?;

        let rates = match &config.artifacts.rate_model {
            Some(path) => {
                let model = TabulatedRateModel::load(path)?;
                crate::log_event!(
                    ctx,
                    INFO,
                    event_names::RATES_LOADED,
                    Stage::Load,
                    "rate table loaded",
                    path = %path.display()
                );
                Some(model)
            }
            None => None,
        };

        let mut engine = Self::initialize(
            config,
            load.catalog,
            rates.as_ref().map(|r| r as &dyn RateModel),
        )?;
        engine.report.skipped = load.skipped;
        engine.report.catalog_hash = Some(load.content_hash);
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<BinCatalog> {
        &self.catalog
    }

    pub fn report(&self) -> &ResolutionReport {
        &self.report
    }

    pub fn records(&self) -> Vec<BinRecord> {
        self.catalog.records()
    }

    /// New dispatcher sharing this engine's catalog.
    pub fn dispatcher(&self) -> EvaluationDispatcher {
        EvaluationDispatcher::new(
            Arc::clone(&self.catalog),
            DispatchOptions::from(&self.config.evaluation),
        )
    }
}
