use crate::config::Config;
use crate::error::PredictionError;
use crate::guard::SlidingWindowLimiter;
use crate::request::{validate, RawPredictionInput, Season};
use crate::worker::{create_worker, InvokeOptions, Worker};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::assembler::{assemble, PlanSet};

/// Validation, admission, invocation and assembly for one request at a time.
/// Shared between requests; holds no per-request state.
pub struct Predictor {
    workers: HashMap<Season, Arc<dyn Worker>>,
    limiter: Option<Arc<SlidingWindowLimiter>>,
    timeout: Duration,
    strict: bool,
}

impl Predictor {
    pub fn new(
        workers: HashMap<Season, Arc<dyn Worker>>,
        limiter: Option<Arc<SlidingWindowLimiter>>,
        timeout: Duration,
        strict: bool,
    ) -> Self {
        Self {
            workers,
            limiter,
            timeout,
            strict,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let workers = Season::ALL
            .into_iter()
            .map(|season| (season, create_worker(&config.worker, season)))
            .collect();
        Self::new(
            workers,
            SlidingWindowLimiter::from_config(&config.rate_limit),
            config.worker.timeout(),
            config.parser.strict,
        )
    }

    pub fn limiter(&self) -> Option<&Arc<SlidingWindowLimiter>> {
        self.limiter.as_ref()
    }

    pub async fn predict(
        &self,
        client_key: &str,
        season: Season,
        raw: &RawPredictionInput,
        cancel: Option<CancellationToken>,
    ) -> Result<PlanSet, PredictionError> {
        let span = info_span!("predict", request_id = %Uuid::new_v4(), %season);
        self.predict_inner(client_key, season, raw, cancel)
            .instrument(span)
            .await
    }

    async fn predict_inner(
        &self,
        client_key: &str,
        season: Season,
        raw: &RawPredictionInput,
        cancel: Option<CancellationToken>,
    ) -> Result<PlanSet, PredictionError> {
        let start = std::time::Instant::now();
        let request = validate(raw).map_err(|violations| {
            info!("Rejected invalid input: {} violations", violations.len());
            PredictionError::InvalidInput(violations)
        })?;

        if let Some(limiter) = &self.limiter {
            if !limiter.admit(client_key) {
                warn!("Rate limit exceeded for {}", client_key);
                return Err(PredictionError::RateLimited);
            }
        }

        let worker = self
            .workers
            .get(&season)
            .ok_or_else(|| PredictionError::WorkerUnavailable {
                reason: format!("no worker configured for season {}", season),
                not_found: true,
            })?;

        info!(
            "Invoking {} worker for {} ({} ha)",
            worker.name(),
            request.region,
            request.area
        );
        let options = InvokeOptions {
            cancel,
            ..InvokeOptions::with_timeout(self.timeout)
        };
        let invocation = worker.invoke(&request, &options).await;

        match assemble(invocation, self.strict) {
            Ok(set) => {
                info!(
                    "Prediction succeeded: {} plans, {} skipped records ({:?})",
                    set.plans.len(),
                    set.skipped.len(),
                    start.elapsed()
                );
                Ok(set)
            }
            Err(e) => {
                warn!("Prediction failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::assembler::ErrorKind;
    use crate::worker::testing::StaticWorker;
    use crate::worker::InvocationResult;
    use serde_json::json;

    const SCENARIO: &str = "Plan 1 (Start: Rice)\n{'Year': 1, 'Crop': 'Rice', 'NPK Before': [80.0, 40.0, 60.0], 'Fertilizer Added': [0.0, 0.0, 0.0], 'Predicted Yield (q/ha)': 45.2, 'Area (ha)': 2.5, 'Revenue (INR)': 95000.0}";

    fn predictor(
        kharif: Arc<StaticWorker>,
        rabi: Arc<StaticWorker>,
        limiter: Option<Arc<SlidingWindowLimiter>>,
    ) -> Predictor {
        let mut workers: HashMap<Season, Arc<dyn Worker>> = HashMap::new();
        workers.insert(Season::Kharif, kharif);
        workers.insert(Season::Rabi, rabi);
        Predictor::new(workers, limiter, Duration::from_secs(5), false)
    }

    fn bangalore() -> RawPredictionInput {
        serde_json::from_value(json!({
            "n_value": 80, "p_value": 40, "k_value": 60,
            "region": "Bangalore", "area": 2.5
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_kharif_scenario_routes_and_parses() {
        let kharif = StaticWorker::succeeding("kharif", SCENARIO);
        let rabi = StaticWorker::succeeding("rabi", "");
        let predictor = predictor(kharif.clone(), rabi.clone(), None);

        let set = predictor
            .predict("127.0.0.1", Season::Kharif, &bangalore(), None)
            .await
            .unwrap();

        assert_eq!(set.plans.len(), 1);
        assert_eq!(set.plans[0].start_crop, "Rice");
        assert_eq!(set.plans[0].entries[0].revenue, 95000.0);
        assert_eq!(kharif.call_count(), 1);
        assert_eq!(rabi.call_count(), 0);
        assert_eq!(
            kharif.calls.lock().unwrap()[0].protocol_lines(),
            ["80", "40", "60", "Bangalore", "2.5"].map(String::from)
        );
    }

    #[tokio::test]
    async fn test_worker_exit_code_maps_to_worker_failed() {
        let failing = InvocationResult::ProcessError {
            exit_code: 1,
            stderr_text: "model file not found".to_string(),
        };
        let predictor = predictor(
            StaticWorker::succeeding("kharif", SCENARIO),
            StaticWorker::new("rabi", failing),
            None,
        );

        let err = predictor
            .predict("127.0.0.1", Season::Rabi, &bangalore(), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::WorkerFailed);
        assert_eq!(err.status_code(), 500);
        match err {
            PredictionError::WorkerFailed { stderr, .. } => {
                assert_eq!(stderr, "model file not found")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_region_never_reaches_worker() {
        let kharif = StaticWorker::succeeding("kharif", SCENARIO);
        let predictor = predictor(kharif.clone(), StaticWorker::succeeding("rabi", ""), None);
        let mut raw = bangalore();
        raw.region = Some(json!("Delhi"));

        let err = predictor
            .predict("127.0.0.1", Season::Kharif, &raw, None)
            .await
            .unwrap_err();

        let PredictionError::InvalidInput(violations) = err else {
            panic!("expected invalid input");
        };
        assert_eq!(violations[0].field, "region");
        assert_eq!(kharif.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_without_invoking() {
        let kharif = StaticWorker::succeeding("kharif", SCENARIO);
        let limiter = Arc::new(SlidingWindowLimiter::new(2, Duration::from_secs(60)));
        let predictor = predictor(
            kharif.clone(),
            StaticWorker::succeeding("rabi", ""),
            Some(limiter),
        );

        for _ in 0..2 {
            assert!(predictor
                .predict("10.1.1.1", Season::Kharif, &bangalore(), None)
                .await
                .is_ok());
        }
        let err = predictor
            .predict("10.1.1.1", Season::Kharif, &bangalore(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.status_code(), 429);
        assert_eq!(kharif.call_count(), 2);

        // a different client is unaffected
        assert!(predictor
            .predict("10.1.1.2", Season::Kharif, &bangalore(), None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_missing_season_worker_is_unavailable() {
        let predictor = Predictor::new(HashMap::new(), None, Duration::from_secs(1), false);
        let err = predictor
            .predict("127.0.0.1", Season::Kharif, &bangalore(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WorkerUnavailable);
    }
}
