use crate::cli::{load_config, PredictArgs};
use crate::request::RawPredictionInput;
use crate::runner::Predictor;
use serde_json::json;
use tracing::info;

pub async fn execute(args: PredictArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(timeout) = args.timeout {
        config.worker.timeout_sec = timeout;
    }
    // A single local run is never rate limited
    config.rate_limit.enabled = false;
    config.validate()?;

    let raw = RawPredictionInput {
        n_value: Some(json!(args.n_value)),
        p_value: Some(json!(args.p_value)),
        k_value: Some(json!(args.k_value)),
        region: Some(json!(args.region)),
        area: Some(json!(args.area)),
    };

    let predictor = Predictor::from_config(&config);
    let hardened = config.environment.is_hardened();
    match predictor.predict("local", args.season, &raw, None).await {
        Ok(set) => {
            for plan in &set.plans {
                info!(
                    "Plan {} ({}): {} years, total revenue {:.2}",
                    plan.plan_number,
                    plan.start_crop,
                    plan.entries.len(),
                    plan.total_revenue()
                );
            }
            println!("{}", serde_json::to_string_pretty(&set.to_response(hardened))?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_response(hardened))?);
            Err(e.into())
        }
    }
}
