use crate::output::{print_json, print_table};
use hoist_core::requirements::{self, CheckStatus};
use hoist_core::runner::{CommandRunner, SystemRunner};
use std::sync::Arc;

pub fn run(json: bool) -> anyhow::Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let reports = requirements::check_all(&runner);

    if json {
        print_json(&reports)?;
    } else {
        let rows = reports
            .iter()
            .map(|r| {
                let status = match r.status {
                    CheckStatus::Ok => "ok",
                    CheckStatus::Outdated => "outdated",
                    CheckStatus::Missing => "missing",
                    CheckStatus::Unknown => "unknown",
                };
                vec![r.name.clone(), status.to_string(), r.detail.clone()]
            })
            .collect();
        print_table(&["TOOL", "STATUS", "DETAIL"], rows);
    }

    let unusable = reports
        .iter()
        .any(|r| matches!(r.status, CheckStatus::Missing | CheckStatus::Outdated));
    if unusable {
        anyhow::bail!("missing or outdated tools found");
    }

    Ok(())
}
