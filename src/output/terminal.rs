// Colored terminal output for topic summaries and run reports.
//
// This module handles all terminal-specific formatting: colors, tables,
// sentiment coloring. The main.rs command handlers delegate here.

use colored::Colorize;

use crate::db::models::Item;
use crate::metrics::TopicMetric;
use crate::pipeline::{RunOutcome, TopicRun};

/// Display the ranked topic table (the dashboard's topic list).
pub fn display_topic_metrics(metrics: &[&TopicMetric], total_topics: usize) {
    if metrics.is_empty() {
        println!("No topics yet. Run `topicpulse import` and `topicpulse run` first.");
        return;
    }

    println!(
        "\n{}",
        format!(
            "=== Topics (top {} of {}) ===",
            metrics.len(),
            total_topics
        )
        .bold()
    );
    println!();

    println!(
        "  {:>4}  {:<28} {:>6}  {:>7}  {:>8}  {:>9}",
        "Rank".dimmed(),
        "Topic".dimmed(),
        "Items".dimmed(),
        "Score".dimmed(),
        "Replies".dimmed(),
        "Sentiment".dimmed(),
    );
    println!("  {}", "-".repeat(72).dimmed());

    for (i, metric) in metrics.iter().enumerate() {
        println!(
            "  {:>4}. {:<28} {:>6}  {:>7}  {:>8}  {:>9}",
            i + 1,
            super::truncate_chars(&metric.topic, 25),
            metric.total_items,
            metric.total_score,
            metric.total_comments,
            colorize_sentiment(metric.average_sentiment),
        );
    }
    println!();
}

/// Display one topic's summary and its member items.
pub fn display_topic_detail(metric: &TopicMetric, items: &[&Item]) {
    println!("\n{}", format!("=== Topic: {} ===", metric.topic).bold());
    println!("  Items: {}", metric.total_items);
    println!("  Total score: {}", metric.total_score);
    println!("  Total replies: {}", metric.total_comments);
    println!(
        "  Average sentiment: {}",
        colorize_sentiment(metric.average_sentiment)
    );
    println!("  Summary: {}", metric.excerpt.dimmed());

    if items.is_empty() {
        return;
    }

    println!("\n  {} items:", items.len());
    for item in items {
        println!(
            "    [{}] {} (score {}, {} replies)",
            item.id,
            super::truncate_chars(&item.title, 80),
            item.score.unwrap_or(0),
            item.reply_count.unwrap_or(0),
        );
    }
}

/// Display what a pipeline run did.
pub fn display_run_summary(run: &TopicRun) {
    println!("\n{}", "=== Topic modeling run ===".bold());
    println!(
        "  Items read: {}  |  Clustered: {}  |  Too short: {}",
        run.items_read,
        run.documents,
        run.excluded.len()
    );

    match run.outcome {
        RunOutcome::Clustered => {
            println!(
                "  Clusters: {}  |  Noise points: {}",
                run.cluster_count().to_string().green(),
                run.noise_points
            );
            for cluster in run.clusters.iter().filter(|c| c.cluster_id >= 0) {
                println!(
                    "    #{:<3} {:<40} {} items",
                    cluster.cluster_id,
                    cluster.label,
                    cluster.member_ids.len()
                );
            }
        }
        RunOutcome::Degenerate => {
            println!(
                "  {} no dense clusters found; every clustered item was labeled miscellaneous",
                "!".yellow()
            );
        }
    }
}

/// Green for positive, red for negative, plain near zero.
fn colorize_sentiment(value: f64) -> colored::ColoredString {
    let text = format!("{:+.2}", value);
    if value > 0.05 {
        text.green()
    } else if value < -0.05 {
        text.red()
    } else {
        text.normal()
    }
}
