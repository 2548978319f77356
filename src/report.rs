use std::fmt::Write;

use crate::analytics::{Timeframe, WellnessAnalytics};
use crate::checkin::default_label;
use crate::models::Identity;

pub const NO_INSIGHTS: &str = "Keep tracking to generate personalized insights!";

pub fn build_report(
    identity: &Identity,
    timeframe: Timeframe,
    analytics: &WellnessAnalytics,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Wellness Report");
    let _ = writeln!(output, "Generated for {} (timeframe {})", identity, timeframe);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Mood");

    let mood = &analytics.mood;
    if mood.total_entries == 0 {
        let _ = writeln!(output, "No mood check-ins recorded for this window.");
    } else {
        let _ = writeln!(
            output,
            "- Average mood {:.1} across {} check-ins ({})",
            mood.average,
            mood.total_entries,
            mood.trend.as_str()
        );
        for (value, count) in mood.distribution.iter() {
            let _ = writeln!(output, "- {} ({}): {}", value, default_label(*value), count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Wellness");

    let wellness = &analytics.wellness;
    if wellness.total_assessments == 0 {
        let _ = writeln!(output, "No assessments recorded for this window.");
    } else {
        let _ = writeln!(
            output,
            "- Stress {:.1}, sleep {:.1}, social connection {:.1} across {} assessments",
            wellness.average_stress,
            wellness.average_sleep,
            wellness.average_social,
            wellness.total_assessments
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Insights");

    if analytics.insights.is_empty() {
        let _ = writeln!(output, "{NO_INSIGHTS}");
    } else {
        for insight in analytics.insights.iter() {
            let _ = writeln!(output, "- {}", insight);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Checked in on {}% of days in this window.",
        analytics.check_in_frequency
    );

    output
}
