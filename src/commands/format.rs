//! Plain-text rendering of console data for the terminal.

use uazdash_core::{
    delay::{DelayConfig, DelayPreset},
    instance::{InstanceStatus, UazInstance},
    job::SendingJob,
    message::HistoryMessage,
    notify::{Notification, NotificationLevel},
};
use uazdash_store::audit::AuditRecord;

/// Shortened job id for tables.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

pub fn format_instances(instances: &[UazInstance]) -> String {
    if instances.is_empty() {
        return "No instances.".to_string();
    }
    let mut out = format!(
        "{:<6} {:<20} {:<14} {:<16} {}\n",
        "ID", "NAME", "STATUS", "PHONE", "PROFILE"
    );
    for i in instances {
        out.push_str(&format!(
            "{:<6} {:<20} {:<14} {:<16} {}\n",
            i.id,
            i.name,
            i.status,
            i.normalized_phone().unwrap_or_else(|| "-".into()),
            i.profile_name.as_deref().unwrap_or("-"),
        ));
    }
    out
}

pub fn format_status(instance_id: i64, status: &InstanceStatus) -> String {
    let mut out = format!(
        "Instance {instance_id}: {}{}\n",
        status.status,
        if status.is_ready() { " (ready)" } else { "" }
    );
    out.push_str(&format!(
        "  connected: {}  logged in: {}\n",
        status.connected, status.logged_in
    ));
    if let Some(phone) = &status.phone_number {
        out.push_str(&format!("  phone: {phone}\n"));
    }
    if let Some(profile) = &status.profile_name {
        out.push_str(&format!("  profile: {profile}\n"));
    }
    out
}

pub fn format_jobs(jobs: &[SendingJob]) -> String {
    if jobs.is_empty() {
        return "No sending jobs.".to_string();
    }
    let mut out = String::new();
    for j in jobs {
        out.push_str(&format!(
            "{}  {:<9} {:>3}% ({}/{})  {} via {}  [{}{}]  {}\n",
            short_id(&j.id),
            j.status,
            j.progress,
            j.current_block,
            j.total_blocks,
            j.target_number,
            j.instance_id,
            match j.kind {
                uazdash_core::job::JobKind::Simple => "simple",
                uazdash_core::job::JobKind::Combined => "combined",
            },
            j.message_type
                .as_deref()
                .map(|t| format!(", {t}"))
                .unwrap_or_default(),
            j.started_at.format("%Y-%m-%d %H:%M:%S"),
        ));
        if let Some(err) = &j.error {
            out.push_str(&format!("          error: {err}\n"));
        }
    }
    out
}

/// The preset matching `config` exactly, if any.
pub fn matching_preset(config: &DelayConfig) -> Option<DelayPreset> {
    DelayPreset::ALL
        .into_iter()
        .find(|p| p.config() == *config)
}

pub fn format_delay(config: &DelayConfig) -> String {
    let on_off = |b: bool| if b { "on" } else { "off" };
    let preset = matching_preset(config).map_or("custom", |p| p.name());
    let rows = [
        ("before sending", format!("{}s", config.delay_before_sending)),
        ("between messages", format!("{}s", config.delay_between_messages)),
        ("between chars", format!("{}s", config.delay_between_chars)),
        ("safe mode", on_off(config.enable_safe_mode).to_string()),
        ("randomize", on_off(config.randomize_delays).to_string()),
        ("max variation", format!("{}s", config.max_random_variation)),
    ];
    let mut out = format!("Delay preset: {preset}\n");
    for (label, value) in rows {
        out.push_str(&format!("  {:<19} {value}\n", format!("{label}:")));
    }
    out
}

pub fn format_history(messages: &[HistoryMessage]) -> String {
    if messages.is_empty() {
        return "No messages in this range.".to_string();
    }
    let mut out = String::new();
    for m in messages {
        out.push_str(&format!(
            "[{}] #{} via {} -> {} {} {}",
            m.sent_at.format("%Y-%m-%d %H:%M"),
            m.id,
            m.instance_id,
            m.phone_number,
            m.message_type,
            m.status,
        ));
        if let Some(content) = &m.content {
            out.push_str(&format!(": {}", truncate(content, 60)));
        }
        if let Some(err) = &m.error {
            out.push_str(&format!(" (error: {err})"));
        }
        out.push('\n');
    }
    out
}

pub fn format_audit(records: &[AuditRecord]) -> String {
    if records.is_empty() {
        return "Audit log is empty.".to_string();
    }
    records
        .iter()
        .map(|r| {
            format!(
                "{} {:<10} {:<5} {} {}\n",
                r.timestamp,
                r.action,
                r.status,
                r.instance_id
                    .map(|id| format!("instance {id}:"))
                    .unwrap_or_default(),
                r.detail
            )
        })
        .collect()
}

pub fn format_notification(n: &Notification) -> String {
    let tag = match n.level {
        NotificationLevel::Success => "ok",
        NotificationLevel::Info => "info",
        NotificationLevel::Warning => "warn",
        NotificationLevel::Error => "error",
    };
    format!("[{tag}] {}: {}", n.title, n.message)
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
