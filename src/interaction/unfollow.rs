// Unfollow job — undo our own follows once they are old enough.
//
// Candidates come from the store: accounts we followed (or requested)
// longer ago than the unfollow delay, oldest first, whitelist excluded.

use anyhow::Context;
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use super::{BotContext, JobError, StopReason};
use crate::device::{Device, DeviceError};
use crate::session::LimitKind;
use crate::storage::models::InteractionOutcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnfollowReport {
    pub candidates: usize,
    pub unfollowed: u32,
    pub failed: u32,
    pub limit_reached: bool,
    pub stopped: Option<StopReason>,
}

pub async fn run_unfollow_job(
    ctx: &mut BotContext,
    device: &mut dyn Device,
) -> Result<UnfollowReport, JobError> {
    let candidates = ctx
        .storage
        .unfollow_candidates(ctx.settings.unfollow_delay, Local::now());
    let mut report = UnfollowReport {
        candidates: candidates.len(),
        ..Default::default()
    };

    if candidates.is_empty() {
        info!("No accounts due for unfollow");
        return Ok(report);
    }
    info!(count = candidates.len(), "Starting unfollow job");

    let pb = ProgressBar::new(candidates.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  Unfollowing [{bar:30}] {pos}/{len} ({eta})")
            .context("Invalid progress bar template")?,
    );

    for handle in &candidates {
        if let Some(reason) = ctx.stop_reason() {
            info!(done = report.unfollowed, reason = reason.as_str(), "Stopping unfollow job");
            report.stopped = Some(reason);
            break;
        }
        if ctx.limits.check(LimitKind::Unfollows, &ctx.session) {
            info!(done = report.unfollowed, "Unfollow limit reached");
            report.limit_reached = true;
            break;
        }
        if ctx.storage.is_in_whitelist(handle) {
            pb.inc(1);
            continue;
        }

        match device.unfollow(handle).await {
            Ok(true) => {
                let outcome = InteractionOutcome {
                    session_id: ctx.session.id().to_string(),
                    job_name: "unfollow".to_string(),
                    unfollowed: true,
                    ..Default::default()
                };
                ctx.storage.record(handle, &outcome)?;
                ctx.session.add_unfollowed();
                report.unfollowed += 1;
                info!(handle = handle.as_str(), "Unfollowed");
            }
            Ok(false) => {
                report.failed += 1;
                warn!(handle = handle.as_str(), "Unfollow did not go through");
            }
            Err(DeviceError::Transient(msg)) => {
                report.failed += 1;
                warn!(handle = handle.as_str(), error = %msg, "Unfollow failed, next account");
            }
            Err(e) => {
                pb.finish_and_clear();
                return Err(e.into());
            }
        }
        pb.inc(1);
        ctx.pacing.between_accounts().await;
    }
    pb.finish_and_clear();

    info!(
        unfollowed = report.unfollowed,
        failed = report.failed,
        "Unfollow job finished"
    );
    Ok(report)
}
