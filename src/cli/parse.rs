use crate::cli::ParseArgs;
use crate::runner::assemble;
use crate::worker::InvocationResult;
use anyhow::Context;
use std::io::Read;
use tracing::info;

pub fn execute(args: ParseArgs) -> anyhow::Result<()> {
    let raw_text = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let invocation = InvocationResult::Success { raw_text };
    match assemble(invocation, args.strict) {
        Ok(set) => {
            for plan in &set.plans {
                info!(
                    "Plan {} ({}): total revenue {:.2}",
                    plan.plan_number,
                    plan.start_crop,
                    plan.total_revenue()
                );
            }
            println!("{}", serde_json::to_string_pretty(&set.to_response(false))?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_response(false))?);
            Err(e.into())
        }
    }
}
