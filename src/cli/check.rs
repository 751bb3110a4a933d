use crate::cli::{load_config, CheckArgs};
use crate::worker::check_setup;

pub async fn execute(args: CheckArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let report = check_setup(&config.worker).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.all_ready() {
        anyhow::bail!("worker setup is incomplete");
    }
    Ok(())
}
