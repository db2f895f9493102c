// Session runner — sequences jobs, dispatches device failures to recovery,
// and loops sessions in repeat mode.
//
// Recovery dispatch:
//   ActionBlocked     -> return to a safe screen, abandon the job
//   LanguageMismatch  -> switch locale once and rerun the job, then give up
//   Transient         -> return to a safe screen, abandon the job
//
// A storage failure is fatal and ends the process. Every session, however
// it ends (limits, shutdown, working hours, error), is marked finished and
// written to the account's session history before anything else happens.

use std::fmt;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use super::job::{run_source_job, JobOutcome};
use super::mass_followers::run_remove_mass_followers;
use super::unfollow::run_unfollow_job;
use super::shutdown::Shutdown;
use super::{BotContext, JobError, StopReason};
use crate::device::{Device, DeviceError, Recovery, Source};
use crate::output::terminal;
use crate::session::{LimitValue, LimitsConfig, ProfileSnapshot, SessionState, WindowStatus};

/// One unit of work inside a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    RemoveMassFollowers,
    Source(Source),
    Unfollow,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::RemoveMassFollowers => write!(f, "remove-mass-followers"),
            Job::Source(source) => write!(f, "{source}"),
            Job::Unfollow => write!(f, "unfollow"),
        }
    }
}

/// Which jobs a session runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunPlan {
    pub sources: Vec<Source>,
    pub unfollow: bool,
    pub remove_mass_followers: bool,
}

impl RunPlan {
    /// Jobs in execution order: follower cleanup, sources, then unfollows.
    pub fn jobs(&self) -> Vec<Job> {
        let mut jobs = Vec::new();
        if self.remove_mass_followers {
            jobs.push(Job::RemoveMassFollowers);
        }
        jobs.extend(self.sources.iter().cloned().map(Job::Source));
        if self.unfollow {
            jobs.push(Job::Unfollow);
        }
        jobs
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }
}

/// How often sessions repeat. Working hours live on the context.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    /// Minutes to sleep between sessions. `None` runs a single session.
    pub repeat: Option<LimitValue>,
    /// Limits are rolled again from this for every new session.
    pub limits: LimitsConfig,
}

/// Run one job. Returns why it stopped early, if it did.
async fn run_job(
    ctx: &mut BotContext,
    device: &mut dyn Device,
    job: &Job,
) -> Result<Option<StopReason>, JobError> {
    let stopped = match job {
        Job::RemoveMassFollowers => {
            run_remove_mass_followers(ctx, device).await?;
            ctx.stop_reason()
        }
        Job::Source(source) => {
            let outcome = run_source_job(ctx, device, source).await?;
            info!(source = %source, outcome = outcome.as_str(), "Job finished");
            match outcome {
                JobOutcome::Stopped(reason) => Some(reason),
                _ => None,
            }
        }
        Job::Unfollow => run_unfollow_job(ctx, device).await?.stopped,
    };
    Ok(stopped)
}

async fn recover(device: &mut dyn Device, recovery: Recovery) {
    if let Err(e) = device.recover(recovery).await {
        warn!(?recovery, error = %e, "Recovery failed");
    }
}

/// Run one job, handling device failures. Only storage errors come back;
/// `Ok(Some(_))` means the job stopped for shutdown or working hours.
pub async fn run_with_recovery(
    ctx: &mut BotContext,
    device: &mut dyn Device,
    job: &Job,
) -> Result<Option<StopReason>> {
    let mut language_retried = false;
    loop {
        match run_job(ctx, device, job).await {
            Ok(stopped) => return Ok(stopped),
            Err(JobError::Storage(e)) => return Err(e.context(format!("Job {job} failed"))),
            Err(JobError::Device(DeviceError::ActionBlocked(msg))) => {
                error!(job = %job, reason = %msg, "Action blocked, abandoning job");
                recover(device, Recovery::SafeScreen).await;
                return Ok(None);
            }
            Err(JobError::Device(DeviceError::LanguageMismatch(msg))) if !language_retried => {
                error!(job = %job, reason = %msg, "Unexpected app language, switching");
                recover(device, Recovery::SwitchLanguage).await;
                language_retried = true;
            }
            Err(JobError::Device(DeviceError::LanguageMismatch(msg))) => {
                error!(job = %job, reason = %msg, "App language still wrong, abandoning job");
                recover(device, Recovery::SafeScreen).await;
                return Ok(None);
            }
            Err(JobError::Device(DeviceError::Transient(msg))) => {
                warn!(job = %job, reason = %msg, "Job interrupted by a device error");
                recover(device, Recovery::SafeScreen).await;
                return Ok(None);
            }
        }
    }
}

/// Run every job of `plan` in the current session.
///
/// Before each job the session checks for a shutdown request and for the
/// end of the working window, and returns the reason when it stops early.
/// Failing to read the driven account's own profile ends the session with
/// an error. Every other device failure is handled per job.
pub async fn run_session(
    ctx: &mut BotContext,
    device: &mut dyn Device,
    plan: &RunPlan,
) -> Result<Option<StopReason>> {
    let own = device
        .own_profile()
        .await
        .context("Could not read the driven account's profile")?;
    ctx.session.set_profile(ProfileSnapshot {
        followers: own.followers,
        following: own.following,
        posts: own.posts,
    });
    info!(
        session = ctx.session.id(),
        followers = own.followers,
        following = own.following,
        posts = own.posts,
        "Session started"
    );

    for job in plan.jobs() {
        if let Some(reason) = ctx.stop_reason() {
            info!(reason = reason.as_str(), "Ending session early");
            return Ok(Some(reason));
        }
        let all = ctx.limits.check_all(&ctx.session);
        if all.terminal {
            info!("Session limits reached, skipping remaining jobs");
            break;
        }
        if job == Job::Unfollow && all.unfollows {
            info!("Unfollow limit already reached");
            continue;
        }
        if let Some(reason) = run_with_recovery(ctx, device, &job).await? {
            info!(job = %job, reason = reason.as_str(), "Ending session early");
            return Ok(Some(reason));
        }
    }
    Ok(None)
}

/// Sleep for `wait`, returning true if shutdown was requested first.
async fn sleep_or_shutdown(wait: std::time::Duration, shutdown: &Shutdown) -> bool {
    if shutdown.is_requested() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(wait) => false,
        _ = shutdown.requested() => true,
    }
}

/// Drive sessions until the plan is done (or forever in repeat mode).
///
/// A session that leaves the working window ends early and the next one
/// starts when the window opens again. Shutdown lets the current account
/// finish, then the session is saved and the loop ends.
///
/// Returns every session this process ran, in order.
pub async fn run(
    ctx: &mut BotContext,
    device: &mut dyn Device,
    plan: &RunPlan,
    schedule: &Schedule,
) -> Result<Vec<SessionState>> {
    let history = ctx.storage.history();
    let shutdown = ctx.shutdown.clone();
    let mut sessions: Vec<SessionState> = Vec::new();

    loop {
        let mut waited = false;
        if let WindowStatus::Outside { wait } = ctx.window_status() {
            info!(minutes = wait.num_minutes(), "Outside working hours, waiting");
            if sleep_or_shutdown(wait.to_std().unwrap_or_default(), &shutdown).await {
                warn!("Interrupted while waiting for working hours");
                break;
            }
            waited = true;
        }
        if waited || !sessions.is_empty() {
            ctx.start_new_session(&schedule.limits);
        }

        let result = run_session(ctx, device, plan).await;

        ctx.session.finish();
        history.persist(&ctx.session)?;
        terminal::display_session_summary(&ctx.session);
        sessions.push(ctx.session.clone());

        match result? {
            Some(StopReason::Interrupted) => {
                warn!("Interrupted, session saved");
                break;
            }
            Some(StopReason::OutsideWorkingHours) => {
                info!("Working hours are over, waiting for the next window");
                continue;
            }
            None => {}
        }

        let Some(repeat) = &schedule.repeat else {
            break;
        };
        let minutes = repeat.resolve(&mut rand::rng());
        info!(minutes, "Next session scheduled");
        if sleep_or_shutdown(std::time::Duration::from_secs(u64::from(minutes) * 60), &shutdown).await {
            warn!("Interrupted between sessions");
            break;
        }
    }

    info!(sessions = sessions.len(), "Done");
    Ok(sessions)
}
