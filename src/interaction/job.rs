// Source job — walk one account list page by page.
//
// For every visible handle the orchestrator decides what to do. Between
// pages the end detector tells us whether the list stopped moving, and
// the skip counters escalate from scrolling to flinging (and finally to
// giving up) when whole pages consist of accounts we already know.
//
// Shutdown and working hours are checked before every account, never in
// the middle of one.

use tracing::info;

use super::orchestrator::{interact_with_user, CandidateOutcome};
use super::{BotContext, JobError, StopReason};
use crate::device::{Device, Source};
use crate::session::LimitKind;

/// Why a job stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The list stopped changing.
    EndOfList,
    /// A session limit ended the job.
    LimitReached,
    /// The per-source interaction budget is used up.
    SourceExhausted,
    /// Too many pages in a row had nothing to do.
    SkipLimitReached,
    /// Shutdown was requested or the working window closed.
    Stopped(StopReason),
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::EndOfList => "end of list",
            JobOutcome::LimitReached => "limit reached",
            JobOutcome::SourceExhausted => "source exhausted",
            JobOutcome::SkipLimitReached => "too many skipped pages",
            JobOutcome::Stopped(reason) => reason.as_str(),
        }
    }
}

/// Whether session limits leave anything for this kind of job to do.
pub(crate) fn job_limits_reached(ctx: &BotContext) -> bool {
    let all = ctx.limits.check_all(&ctx.session);
    if all.terminal {
        return true;
    }
    if ctx.settings.scrape_only {
        ctx.limits.check(LimitKind::Scraped, &ctx.session)
    } else {
        all.active_jobs
    }
}

/// Run an interaction (or scrape) job over `source`.
pub async fn run_source_job(
    ctx: &mut BotContext,
    device: &mut dyn Device,
    source: &Source,
) -> Result<JobOutcome, JobError> {
    let label = source.label();
    let mut detector = ctx.settings.end_detector();
    info!(source = %source, "Starting job");

    loop {
        if let Some(reason) = ctx.stop_reason() {
            info!(source = %source, reason = reason.as_str(), "Stopping job");
            return Ok(JobOutcome::Stopped(reason));
        }
        if job_limits_reached(ctx) {
            info!(source = %source, "Session limits reached, stopping job");
            return Ok(JobOutcome::LimitReached);
        }

        detector.new_page();
        let page = device.visible_accounts(source).await?;
        let mut all_skipped = true;

        for handle in &page {
            detector.observe(handle);

            if ctx.limits.source_exhausted(&label, &ctx.session) {
                info!(
                    source = %source,
                    successful = ctx.session.successful_interactions_for(&label),
                    "Interaction budget for this source used up"
                );
                return Ok(JobOutcome::SourceExhausted);
            }
            if job_limits_reached(ctx) {
                info!(source = %source, "Session limits reached, stopping job");
                return Ok(JobOutcome::LimitReached);
            }
            if let Some(reason) = ctx.stop_reason() {
                info!(source = %source, reason = reason.as_str(), "Stopping job");
                return Ok(JobOutcome::Stopped(reason));
            }

            match interact_with_user(ctx, device, source, handle).await {
                Ok(outcome) => {
                    if !outcome.is_skipped() {
                        all_skipped = false;
                    }
                    if let CandidateOutcome::Interacted(summary) = &outcome {
                        if !summary.succeeded() {
                            info!(handle = handle.as_str(), "Nothing succeeded on this profile");
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }

        if detector.is_end() {
            info!(source = %source, pages = detector.page_count(), "Reached the end of the list");
            return Ok(JobOutcome::EndOfList);
        }

        if all_skipped {
            detector.notify_all_skipped();
            if detector.skip_limit_reached() {
                info!(source = %source, "Too many pages without new accounts, stopping job");
                return Ok(JobOutcome::SkipLimitReached);
            }
            if detector.fling_limit_reached() {
                info!(source = %source, "Only known accounts here, flinging");
                device.scroll(source, true).await?;
                continue;
            }
        } else {
            detector.reset_skipped_all();
        }

        device.scroll(source, false).await?;
        ctx.pacing.short().await;
    }
}
