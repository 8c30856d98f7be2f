use std::fmt::Display;

use ansi_term::{Colour, Style};
use anyhow::Result;
use chrono::Local;
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::{
    daemon::{
        engine::state::RunningState,
        store::state_store::{StateStore, StateStoreImpl},
    },
    utils::{dir::create_application_default_path, time::date_to_key},
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct StatsCommand {
    #[arg(
        long = "date",
        short,
        help = "Show the count for a single day instead of the overview. Examples are \"yesterday\", \"last friday\", \"15/03/2025\""
    )]
    date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

/// Command to process `stats` command. Renders the state the daemon persisted; the daemon itself
/// is never contacted and nothing here mutates the counter.
pub async fn process_stats_command(
    StatsCommand { date, date_style }: StatsCommand,
) -> Result<()> {
    let store = StateStoreImpl::new(create_application_default_path()?.join("state"))?;
    let entity = store.load().await?;

    // The daemon might not have run today yet, so the loaded document can still point at an
    // older day. Restoring against the current date gives the same view the engine would have.
    let today = Local::now().date_naive();
    let state = RunningState::restore(entity, today);

    let Some(raw_date) = date else {
        print_overview(&state);
        return Ok(());
    };

    let dialect: chrono_english::Dialect = date_style.into();
    let requested = match parse_date_string(&raw_date, Local::now(), dialect) {
        Ok(v) => v.date_naive(),
        Err(e) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate date {e}"),
                )
                .into());
        }
    };

    let count = if requested == state.today() {
        state.today_count()
    } else {
        state.history().get(&requested).copied().unwrap_or(0)
    };
    println!("{}\t{}", date_to_key(requested), count);
    Ok(())
}

const BAR_WIDTH: u64 = 40;

/// Bar length for the weekly chart, rounded up so days with a handful of keypresses still show.
fn bar_width(count: u64, max: u64) -> usize {
    if max == 0 {
        return 0;
    }
    (count * BAR_WIDTH).div_ceil(max) as usize
}

fn print_overview(state: &RunningState) {
    let bold = Style::new().bold();

    println!("{}\t\t{}", bold.paint("today"), state.today_count());
    println!("{}\t{}", bold.paint("yesterday"), state.yesterday_count());
    println!("{}\t\t{}", bold.paint("average"), state.average_count());
    println!("{}\t{}", bold.paint("all time"), state.total_all_time());
    if let Some(peak) = state.peak_day() {
        println!(
            "{}\t\t{}\ton {}",
            bold.paint("peak"),
            peak.count,
            date_to_key(peak.date)
        );
    }
    match state.trend_percentage() {
        Some(trend) if trend >= 0 => {
            println!(
                "{}\t\t{}",
                bold.paint("trend"),
                Colour::Green.paint(format!("+{trend}%"))
            )
        }
        Some(trend) => {
            println!(
                "{}\t\t{}",
                bold.paint("trend"),
                Colour::Red.paint(format!("{trend}%"))
            )
        }
        None => {}
    }

    println!();
    let week = state.last_7_days();
    let max = week.iter().map(|day| day.count).max().unwrap_or(0);
    for day in week {
        println!(
            "{}\t{:>7}\t{}",
            date_to_key(day.date),
            day.count,
            Colour::Cyan.paint("█".repeat(bar_width(day.count, max)))
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{bar_width, BAR_WIDTH};

    #[test]
    fn test_bar_width_bounds() {
        assert_eq!(bar_width(0, 0), 0);
        assert_eq!(bar_width(0, 100), 0);
        assert_eq!(bar_width(100, 100), BAR_WIDTH as usize);
    }

    #[test]
    fn test_bar_width_small_counts_stay_visible() {
        assert_eq!(bar_width(1, 10_000), 1);
    }

    #[test]
    fn test_bar_width_is_monotonic() {
        let widths: Vec<_> = (0..=50).map(|count| bar_width(count, 50)).collect();
        assert!(widths.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
