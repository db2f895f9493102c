// Per-candidate decision — what to do with one account from a list.
//
// Order of checks:
// 1. own account / blacklist / earlier interaction (with cooldown) / earlier
//    filter rejection: skip without opening the profile
// 2. open the profile and apply the Filter
// 3. gated by the session limits, in order: watch stories, like posts,
//    comment, send a PM, follow. Private or empty profiles only get the
//    PM and follow steps.
// 4. report the outcome to the session and the store in one update
//
// Session counters are only touched in that final report, so the session
// and the store never disagree about a profile. Limits checked between
// steps add what this profile has already done.
//
// A transient device error fails only the step it happened in, and a
// profile that cannot be opened is skipped. Any other device error stops
// the interaction: what was done so far is still recorded, then the error
// goes up to the job.

use tracing::{debug, info, warn};

use super::{roll, BotContext, JobError, MAX_LIKES_PER_ACCOUNT};
use crate::device::{Device, DeviceError, FollowResult, ProfileInfo, Source};
use crate::filter::SkipReason;
use crate::session::LimitKind;
use crate::storage::can_reinteract;
use crate::storage::models::InteractionOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCause {
    OwnAccount,
    Blacklisted,
    AlreadyInteracted,
    PreviouslyFiltered,
    Filtered(SkipReason),
    /// The profile could not be opened.
    Unavailable,
}

/// What was actually done on one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSummary {
    pub watched: u32,
    pub liked: u32,
    pub commented: u32,
    pub pm_sent: bool,
    pub follow: Option<FollowResult>,
}

impl ActionSummary {
    pub fn followed(&self) -> bool {
        self.follow == Some(FollowResult::Followed)
    }

    pub fn requested(&self) -> bool {
        self.follow == Some(FollowResult::Requested)
    }

    /// Whether anything at all succeeded.
    pub fn succeeded(&self) -> bool {
        self.watched > 0
            || self.liked > 0
            || self.commented > 0
            || self.pm_sent
            || self.followed()
            || self.requested()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    Skipped(SkipCause),
    Interacted(ActionSummary),
    Scraped,
}

impl CandidateOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, CandidateOutcome::Skipped(_))
    }
}

/// Checks that need no device access.
fn pre_check(ctx: &BotContext, handle: &str) -> Option<SkipCause> {
    if handle.eq_ignore_ascii_case(ctx.storage.username()) {
        return Some(SkipCause::OwnAccount);
    }
    if ctx.storage.is_in_blacklist(handle) {
        return Some(SkipCause::Blacklisted);
    }
    let (interacted, last) = ctx.storage.was_interacted(handle);
    if interacted {
        let allowed = last.is_some_and(|t| can_reinteract(t, ctx.settings.reinteract_after));
        if !allowed {
            return Some(SkipCause::AlreadyInteracted);
        }
    }
    if ctx.storage.was_filtered(handle) {
        return Some(SkipCause::PreviouslyFiltered);
    }
    None
}

/// Turn a transient failure into "this step did nothing".
fn attempt<T>(result: Result<T, DeviceError>, handle: &str, step: &str) -> Result<Option<T>, DeviceError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_transient() => {
            warn!(handle, step, error = %e, "Step failed, moving on");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Whether `kind` leaves room for another action after the `pending`
/// ones this profile has not reported yet.
fn has_room(ctx: &BotContext, kind: LimitKind, pending: u32) -> bool {
    ctx.limits
        .remaining(kind, &ctx.session)
        .map_or(true, |left| left > pending)
}

/// Leave the profile screen. A transient failure here is only logged.
async fn leave_profile(device: &mut dyn Device, handle: &str) -> Result<(), DeviceError> {
    attempt(device.back().await, handle, "back")?;
    Ok(())
}

/// Decide about and interact with one candidate account.
pub async fn interact_with_user(
    ctx: &mut BotContext,
    device: &mut dyn Device,
    source: &Source,
    handle: &str,
) -> Result<CandidateOutcome, JobError> {
    if let Some(cause) = pre_check(ctx, handle) {
        debug!(handle, ?cause, "Skipping account");
        return Ok(CandidateOutcome::Skipped(cause));
    }

    let profile = match attempt(device.open_profile(handle).await, handle, "open")? {
        Some(profile) => profile,
        None => return Ok(CandidateOutcome::Skipped(SkipCause::Unavailable)),
    };
    ctx.pacing.short().await;

    if let Err(reason) = ctx.filter.check(&profile.metrics()) {
        info!(handle, reason = %reason, "Skipped by filter");
        ctx.storage
            .record_filtered(handle, reason.as_str(), &source.job, &source.target)?;
        leave_profile(device, handle).await?;
        return Ok(CandidateOutcome::Skipped(SkipCause::Filtered(reason)));
    }

    if ctx.settings.scrape_only {
        scrape(ctx, source, handle)?;
        leave_profile(device, handle).await?;
        return Ok(CandidateOutcome::Scraped);
    }

    let mut summary = ActionSummary::default();
    let result = perform_actions(ctx, device, handle, &profile, &mut summary).await;
    report(ctx, source, handle, &summary)?;
    result?;

    leave_profile(device, handle).await?;
    ctx.pacing.between_accounts().await;
    Ok(CandidateOutcome::Interacted(summary))
}

async fn perform_actions(
    ctx: &mut BotContext,
    device: &mut dyn Device,
    handle: &str,
    profile: &ProfileInfo,
    summary: &mut ActionSummary,
) -> Result<(), DeviceError> {
    if profile.metrics().is_private_or_empty() {
        debug!(handle, "Private or empty profile, only PM and follow apply");
    } else {
        watch_stories(ctx, device, handle, profile, summary).await?;
        like_posts(ctx, device, handle, profile, summary).await?;
        comment_posts(ctx, device, handle, profile, summary).await?;
    }
    send_pm(ctx, device, handle, summary).await?;
    follow(ctx, device, handle, summary).await?;
    Ok(())
}

async fn watch_stories(
    ctx: &mut BotContext,
    device: &mut dyn Device,
    handle: &str,
    profile: &ProfileInfo,
    summary: &mut ActionSummary,
) -> Result<(), DeviceError> {
    if !profile.has_stories || !roll(ctx.settings.stories_percentage) {
        return Ok(());
    }
    if !has_room(ctx, LimitKind::Watches, summary.watched) {
        debug!(handle, "Watch limit reached, not watching stories");
        return Ok(());
    }

    let mut count = ctx.settings.stories_count.resolve(&mut rand::rng());
    if let Some(left) = ctx.limits.remaining(LimitKind::Watches, &ctx.session) {
        count = count.min(left.saturating_sub(summary.watched));
    }
    if count == 0 {
        return Ok(());
    }

    if let Some(watched) = attempt(device.watch_stories(handle, count).await, handle, "stories")? {
        summary.watched += watched;
    }
    ctx.pacing.short().await;
    Ok(())
}

async fn like_posts(
    ctx: &mut BotContext,
    device: &mut dyn Device,
    handle: &str,
    profile: &ProfileInfo,
    summary: &mut ActionSummary,
) -> Result<(), DeviceError> {
    let wanted = ctx
        .settings
        .likes_count
        .resolve(&mut rand::rng())
        .min(MAX_LIKES_PER_ACCOUNT);
    let count = u64::from(wanted).min(profile.posts) as u32;

    for index in 0..count {
        if !has_room(ctx, LimitKind::Likes, summary.liked) {
            info!(handle, "Likes limit reached");
            break;
        }
        if attempt(device.like_post(handle, index).await, handle, "like")? == Some(true) {
            summary.liked += 1;
        }
        ctx.pacing.short().await;
    }
    Ok(())
}

async fn comment_posts(
    ctx: &mut BotContext,
    device: &mut dyn Device,
    handle: &str,
    profile: &ProfileInfo,
    summary: &mut ActionSummary,
) -> Result<(), DeviceError> {
    let count = u64::from(ctx.settings.max_comments_per_account).min(profile.posts) as u32;

    for index in 0..count {
        if !roll(ctx.settings.comment_percentage) {
            continue;
        }
        if !has_room(ctx, LimitKind::Comments, summary.commented) {
            info!(handle, "Comments limit reached");
            break;
        }
        if attempt(device.comment_post(handle, index).await, handle, "comment")? == Some(true) {
            summary.commented += 1;
        }
        ctx.pacing.short().await;
    }
    Ok(())
}

async fn send_pm(
    ctx: &mut BotContext,
    device: &mut dyn Device,
    handle: &str,
    summary: &mut ActionSummary,
) -> Result<(), DeviceError> {
    if !roll(ctx.settings.pm_percentage) {
        return Ok(());
    }
    if ctx.limits.check(LimitKind::Pm, &ctx.session) {
        info!(handle, "PM limit reached");
        return Ok(());
    }
    if attempt(device.send_pm(handle).await, handle, "pm")? == Some(true) {
        summary.pm_sent = true;
    }
    ctx.pacing.short().await;
    Ok(())
}

async fn follow(
    ctx: &mut BotContext,
    device: &mut dyn Device,
    handle: &str,
    summary: &mut ActionSummary,
) -> Result<(), DeviceError> {
    if !roll(ctx.settings.follow_percentage) {
        return Ok(());
    }
    if ctx.limits.check(LimitKind::Follows, &ctx.session) {
        info!(handle, "Follow limit reached");
        return Ok(());
    }
    if ctx.storage.following_status(handle).is_followed_by_script() {
        debug!(handle, "Already followed by us");
        return Ok(());
    }
    if let Some(result) = attempt(device.follow(handle).await, handle, "follow")? {
        if result != FollowResult::Failed {
            summary.follow = Some(result);
        }
    }
    ctx.pacing.short().await;
    Ok(())
}

/// Report one interaction to the session counters and the store.
fn report(
    ctx: &mut BotContext,
    source: &Source,
    handle: &str,
    summary: &ActionSummary,
) -> anyhow::Result<()> {
    let followed = summary.followed() || summary.requested();
    ctx.session
        .add_interaction(&source.label(), summary.succeeded(), followed, false);
    ctx.session.add_watched(summary.watched);
    ctx.session.add_likes(summary.liked);
    for _ in 0..summary.commented {
        ctx.session.add_comment();
    }
    if summary.pm_sent {
        ctx.session.add_pm();
    }

    let outcome = InteractionOutcome {
        session_id: ctx.session.id().to_string(),
        job_name: source.job.clone(),
        target: source.target.clone(),
        liked: summary.liked,
        watched: summary.watched,
        commented: summary.commented,
        followed: summary.followed(),
        requested: summary.requested(),
        pm_sent: summary.pm_sent,
        ..Default::default()
    };
    ctx.storage.record(handle, &outcome)?;

    info!(
        handle,
        source = %source,
        liked = summary.liked,
        watched = summary.watched,
        commented = summary.commented,
        pm = summary.pm_sent,
        follow = ?summary.follow,
        "Interaction finished"
    );
    Ok(())
}

fn scrape(ctx: &mut BotContext, source: &Source, handle: &str) -> anyhow::Result<()> {
    ctx.session.add_interaction(&source.label(), true, false, true);
    let outcome = InteractionOutcome {
        session_id: ctx.session.id().to_string(),
        job_name: source.job.clone(),
        target: source.target.clone(),
        scraped: true,
        ..Default::default()
    };
    ctx.storage.record(handle, &outcome)?;
    info!(handle, source = %source, "Account scraped");
    Ok(())
}
