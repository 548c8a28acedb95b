//! Farm health summaries computed from a farmer's scan history.

pub mod handlers;

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::db::models::{ScanRecord, ScanSeverity};

/// Scans at or below this confidence are not counted as issues.
pub const ISSUE_CONFIDENCE_THRESHOLD: f64 = 30.0;
pub const RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub overall_health: i64,
    pub weekly_change: String,
    pub active_issues: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub day: String,
    pub health: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiseaseCount {
    pub disease: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentDiagnosis {
    pub crop_name: String,
    pub disease_name: String,
    pub severity: ScanSeverity,
    pub confidence: i64,
    pub date: String,
}

/// Rounds half up, matching how clients round percentages.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn is_issue(scan: &ScanRecord) -> bool {
    scan.severity != ScanSeverity::Healthy && scan.confidence > ISSUE_CONFIDENCE_THRESHOLD
}

/// 100 minus a penalty per unhealthy scan, clamped to 0..=100.
pub fn health_score<'a>(scans: impl IntoIterator<Item = &'a ScanRecord>) -> i64 {
    let penalty: i64 = scans
        .into_iter()
        .map(|scan| match scan.severity {
            ScanSeverity::Healthy => 0,
            ScanSeverity::Mild => 5,
            ScanSeverity::Moderate => 10,
            ScanSeverity::Severe => 20,
        })
        .sum();
    (100 - penalty).clamp(0, 100)
}

pub fn weekly_change(current: i64, previous: i64) -> String {
    if previous > 0 {
        let change = (current - previous) as f64 / previous as f64 * 100.0;
        if change > 0.0 {
            format!("+{}%", round_half_up(change))
        } else {
            format!("{}%", round_half_up(change))
        }
    } else if current > 0 {
        "+100%".to_string()
    } else {
        "0%".to_string()
    }
}

pub fn active_issues(scans: &[ScanRecord]) -> usize {
    scans
        .iter()
        .filter(|scan| is_issue(scan))
        .map(|scan| scan.disease_name.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

pub fn summary(current_week: &[ScanRecord], previous_week: &[ScanRecord]) -> Summary {
    let current = health_score(current_week);
    let previous = health_score(previous_week);
    Summary {
        overall_health: current,
        weekly_change: weekly_change(current, previous),
        active_issues: active_issues(current_week),
    }
}

/// One point per calendar day, today and the six days before, oldest first.
pub fn health_trend(scans: &[ScanRecord], now: DateTime<Utc>) -> Vec<TrendPoint> {
    let today = now.date_naive();
    (0..7)
        .rev()
        .map(|days_back| {
            let day = today - Duration::days(days_back);
            let health = health_score(scans.iter().filter(|scan| scan.timestamp.date_naive() == day));
            TrendPoint {
                day: day.format("%a").to_string(),
                health,
            }
        })
        .collect()
}

pub fn disease_breakdown(scans: &[ScanRecord]) -> Vec<DiseaseCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for scan in scans.iter().filter(|scan| is_issue(scan)) {
        *counts.entry(scan.disease_name.as_str()).or_default() += 1;
    }

    let mut breakdown: Vec<DiseaseCount> = counts
        .into_iter()
        .map(|(disease, count)| DiseaseCount {
            disease: disease.to_string(),
            count,
        })
        .collect();
    breakdown.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.disease.cmp(&b.disease)));
    breakdown
}

/// "Today", "Yesterday", or the date for anything older.
pub fn date_label(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    match (now - timestamp).num_days().abs() {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        _ => timestamp.format("%Y-%m-%d").to_string(),
    }
}

pub fn recent_diagnoses(scans: &[ScanRecord], now: DateTime<Utc>) -> Vec<RecentDiagnosis> {
    scans
        .iter()
        .map(|scan| RecentDiagnosis {
            crop_name: scan.crop_name.clone(),
            disease_name: scan.disease_name.clone(),
            severity: scan.severity,
            confidence: round_half_up(scan.confidence),
            date: date_label(scan.timestamp, now),
        })
        .collect()
}

/// Midnight UTC on the first of the month containing `now`.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap_or_else(|| now.date_naive());
    Utc.from_utc_datetime(&first.and_time(chrono::NaiveTime::MIN))
}
