// Mass-follower removal — drop followers that follow too many accounts.
//
// Walks the driven account's own follower list with the same end detection
// as a source job. Accounts on the whitelist are left alone. Like a source
// job it stops between accounts on shutdown or when the working window
// closes.

use tracing::{debug, info, warn};

use super::{BotContext, JobError};
use crate::device::{Device, DeviceError, Source};

pub async fn run_remove_mass_followers(
    ctx: &mut BotContext,
    device: &mut dyn Device,
) -> Result<u32, JobError> {
    let source = Source::own_followers(ctx.storage.username());
    let threshold = ctx.settings.max_following_for_removal;
    let mut detector = ctx.settings.end_detector();
    let mut removed = 0u32;
    info!(threshold, "Looking for mass followers");

    'pages: loop {
        detector.new_page();
        let page = device.visible_accounts(&source).await?;

        for handle in &page {
            if let Some(reason) = ctx.stop_reason() {
                info!(reason = reason.as_str(), "Stopping mass-follower removal");
                break 'pages;
            }
            detector.observe(handle);
            if ctx.storage.is_in_whitelist(handle)
                || ctx.session.removed_mass_followers().contains(handle)
            {
                continue;
            }

            let profile = match device.open_profile(handle).await {
                Ok(p) => p,
                Err(DeviceError::Transient(msg)) => {
                    warn!(handle = handle.as_str(), error = %msg, "Could not open follower");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            ctx.pacing.short().await;

            if profile.following > threshold {
                match device.remove_follower(handle).await {
                    Ok(true) => {
                        ctx.session.add_removed_mass_follower(handle);
                        removed += 1;
                        info!(
                            handle = handle.as_str(),
                            following = profile.following,
                            "Removed mass follower"
                        );
                    }
                    Ok(false) => warn!(handle = handle.as_str(), "Removal did not go through"),
                    Err(DeviceError::Transient(msg)) => {
                        warn!(handle = handle.as_str(), error = %msg, "Removal failed")
                    }
                    Err(e) => return Err(e.into()),
                }
            } else {
                debug!(handle = handle.as_str(), following = profile.following, "Keeping follower");
            }
            device.back().await?;
            ctx.pacing.between_accounts().await;
        }

        if detector.is_end() {
            break;
        }
        device.scroll(&source, false).await?;
    }

    info!(removed, "Mass-follower removal finished");
    Ok(removed)
}
