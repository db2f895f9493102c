// Colored terminal output for sessions, history and account records.
//
// Everything user-facing that isn't a log line goes through here. The
// command handlers in main.rs and the session runner delegate to these.

use chrono::{DateTime, Local};
use colored::Colorize;

use crate::session::SessionState;
use crate::storage::models::{FilteredRecord, FollowingStatus, InteractionRecord};
use crate::storage::Storage;

use super::{format_duration, truncate_chars};

/// Display the counters of one session.
pub fn display_session_summary(session: &SessionState) {
    let state = if session.is_finished() {
        "finished".green()
    } else {
        "running".yellow()
    };
    println!(
        "\n{}",
        format!("=== Session {} ===", short_id(session.id())).bold()
    );
    println!(
        "  Started {} ({}), {}",
        session.start_time().format("%Y-%m-%d %H:%M"),
        format_duration(session.duration()),
        state
    );

    if let Some(profile) = session.profile() {
        println!(
            "  Profile: {} followers, {} following, {} posts",
            profile.followers, profile.following, profile.posts
        );
    }

    println!(
        "  Interactions: {} total, {} successful",
        session.sum_total_interactions(),
        session.sum_successful_interactions()
    );
    println!(
        "  Likes: {}  Follows: {}  Watched: {}  Comments: {}  PMs: {}",
        session.total_likes(),
        session.sum_followed(),
        session.total_watched(),
        session.total_comments(),
        session.total_pm()
    );
    if session.total_unfollowed() > 0 {
        println!("  Unfollowed: {}", session.total_unfollowed());
    }
    if session.sum_scraped() > 0 {
        println!("  Scraped: {}", session.sum_scraped());
    }
    if !session.removed_mass_followers().is_empty() {
        println!(
            "  Removed mass followers: {}",
            session.removed_mass_followers().len()
        );
    }

    let sources = session.sources();
    if !sources.is_empty() {
        println!("\n  {:<36} {:>7} {:>10}", "Source".dimmed(), "Total".dimmed(), "Successful".dimmed());
        for (source, total, successful) in sources {
            println!(
                "  {:<36} {:>7} {:>10}",
                truncate_chars(source, 33),
                total,
                successful
            );
        }
    }
    println!();
}

/// Display past sessions, most recent first.
pub fn display_history(sessions: &[SessionState]) {
    if sessions.is_empty() {
        println!("No sessions recorded yet. Run `gramkeeper run` first.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Session history ({} sessions) ===", sessions.len()).bold()
    );
    println!();
    println!(
        "  {:<10} {:<17} {:>9} {:>7} {:>7} {:>7} {:>9}",
        "Session".dimmed(),
        "Started".dimmed(),
        "Duration".dimmed(),
        "Total".dimmed(),
        "Likes".dimmed(),
        "Follows".dimmed(),
        "Unfollows".dimmed(),
    );
    println!("  {}", "-".repeat(72).dimmed());

    for session in sessions.iter().rev() {
        println!(
            "  {:<10} {:<17} {:>9} {:>7} {:>7} {:>7} {:>9}",
            short_id(session.id()),
            session.start_time().format("%Y-%m-%d %H:%M").to_string(),
            format_duration(session.duration()),
            session.sum_total_interactions(),
            session.total_likes(),
            session.sum_followed(),
            session.total_unfollowed(),
        );
    }
    println!();
}

/// Display everything stored about one account.
pub fn display_record(
    handle: &str,
    record: Option<&InteractionRecord>,
    filtered: Option<&FilteredRecord>,
    blacklisted: bool,
    whitelisted: bool,
) {
    println!("\n{}", format!("=== @{handle} ===").bold());

    if blacklisted {
        println!("  {}", "On the blacklist".red());
    }
    if whitelisted {
        println!("  {}", "On the whitelist".green());
    }

    match record {
        Some(r) => {
            println!("  Status: {}", colorize_status(r.following_status));
            if let Some(last) = r.last_interaction {
                println!("  Last interaction: {}", format_when(last));
            }
            println!(
                "  Liked: {}  Watched: {}  Commented: {}",
                r.liked, r.watched, r.commented
            );
            let flags: Vec<&str> = [
                (r.followed, "followed"),
                (r.unfollowed, "unfollowed"),
                (r.pm_sent, "pm sent"),
                (r.scraped, "scraped"),
            ]
            .into_iter()
            .filter_map(|(set, name)| set.then_some(name))
            .collect();
            if !flags.is_empty() {
                println!("  Flags: {}", flags.join(", "));
            }
            if let (Some(job), Some(target)) = (&r.job_name, &r.target) {
                println!("  First seen via: {job}:{target}");
            }
        }
        None => println!("  {}", "Never interacted with".dimmed()),
    }

    if let Some(f) = filtered {
        println!(
            "  Filtered {} ({})",
            format_when(f.filtered_at),
            f.reason.yellow()
        );
    }
    println!();
}

/// Display accounts due for an unfollow.
pub fn display_unfollow_candidates(storage: &Storage, candidates: &[String]) {
    if candidates.is_empty() {
        println!("No accounts are due for an unfollow.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Unfollow candidates ({}) ===", candidates.len()).bold()
    );
    println!();
    for handle in candidates {
        let record = storage.interaction(handle);
        let status = record
            .map(|r| r.following_status)
            .unwrap_or(FollowingStatus::NotInList);
        let when = record
            .and_then(|r| r.last_interaction)
            .map(format_when)
            .unwrap_or_else(|| "?".to_string());
        println!("  @{:<30} {:<10} {}", handle, colorize_status(status), when.dimmed());
    }
    println!();
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn format_when(at: DateTime<Local>) -> String {
    let age = Local::now().signed_duration_since(at);
    let ago = if age.num_days() > 0 {
        format!("{}d ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h ago", age.num_hours())
    } else {
        format!("{}m ago", age.num_minutes().max(0))
    };
    format!("{} ({ago})", at.format("%Y-%m-%d %H:%M"))
}

/// Colorize a following status.
fn colorize_status(status: FollowingStatus) -> colored::ColoredString {
    let s = status.as_str();
    match status {
        FollowingStatus::Followed => s.green(),
        FollowingStatus::Requested => s.cyan(),
        FollowingStatus::Unfollowed => s.yellow(),
        FollowingStatus::Scraped => s.blue(),
        FollowingStatus::None | FollowingStatus::NotInList => s.dimmed(),
    }
}
