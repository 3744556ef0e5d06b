use std::time::Duration;

use colored::*;
use tracing::info;
use vigil_core::DetectionSummary;

pub const TOTAL_WIDTH: usize = 64;
pub const PRINT_TARGET: &str = "vigil::print";

const SEPARATOR: Color = Color::BrightBlack;
const PRIMARY: Color = Color::BrightGreen;
const ACCENT: Color = Color::Cyan;

/// Plain output line, routed through the log formatter so it never tears the
/// spinner.
pub fn print(msg: &str) {
    info!(target: "vigil::print", raw_msg = msg);
}

pub fn banner() {
    let text_content: String = format!("⟦ VIGIL v{} ⟧", env!("CARGO_PKG_VERSION"));
    let text_width: usize = console::measure_text_width(&text_content);
    let sep: ColoredString = "═"
        .repeat(TOTAL_WIDTH.saturating_sub(text_width) / 2)
        .color(SEPARATOR);
    print(&format!("{}{}{}", sep, text_content.bright_green().bold(), sep));
}

pub fn header(msg: &str) {
    let formatted: String = format!("⟦ {} ⟧", msg);
    let dash_count: usize = TOTAL_WIDTH.saturating_sub(console::measure_text_width(&formatted));
    let left: usize = dash_count / 2;
    let right: usize = dash_count - left;

    let line: String = format!(
        "{}{}{}",
        "─".repeat(left).color(SEPARATOR),
        formatted.to_uppercase().color(PRIMARY),
        "─".repeat(right).color(SEPARATOR)
    );
    print(&line);
}

pub fn fat_separator() {
    print(&"═".repeat(TOTAL_WIDTH).color(SEPARATOR).to_string());
}

pub fn centerln(msg: &str) {
    let space = " ".repeat(TOTAL_WIDTH.saturating_sub(console::measure_text_width(msg)) / 2);
    print(&format!("{}{}", space, msg));
}

pub fn as_tree_one_level(key_value_pair: &[(&str, String)]) {
    let key_width = key_value_pair
        .iter()
        .map(|(key, _)| key.len())
        .max()
        .unwrap_or(0);

    for (i, (key, value)) in key_value_pair.iter().enumerate() {
        let branch: ColoredString = if i + 1 == key_value_pair.len() {
            "└─".color(SEPARATOR)
        } else {
            "├─".color(SEPARATOR)
        };
        let dots: ColoredString = ".".repeat(key_width + 1 - key.len()).color(SEPARATOR);
        print(&format!(" {} {}{}{} {}", branch, key, dots, ":".color(SEPARATOR), value));
    }
}

pub fn alive_hosts(hosts: &[String]) {
    for (idx, host) in hosts.iter().enumerate() {
        let idx_str: String = format!("[{}]", idx.to_string().color(ACCENT));
        print(&format!("{} {}", idx_str.color(SEPARATOR), host.color(PRIMARY)));
    }
}

pub fn summary(summary: &DetectionSummary, total_time: Duration) {
    let published = summary.published.published.len();
    let alive: ColoredString = format!("{published} alive hosts").bold().green();
    let elapsed: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();

    fat_separator();
    centerln(&format!("Alive Detection Complete: {alive} in {elapsed}"));
    fat_separator();

    as_tree_one_level(&[
        ("Bursts", summary.sent.bursts.to_string()),
        ("Sent", summary.sent.packets_sent.to_string()),
        ("Failed", summary.sent.packets_failed.to_string()),
        ("Skipped", summary.sent.probes_skipped.to_string()),
        ("Replies", summary.capture.replies.to_string()),
        ("Withheld", summary.published.withheld.len().to_string()),
    ]);
}

const NO_RESULTS: &str = r#"
         _   _  ___    _    _     _____     _______
        | \ | |/ _ \  / \  | |   |_ _\ \   / / ____|
        |  \| | | | |/ _ \ | |    | | \ \ / /|  _|
        | |\  | |_| / ___ \| |___ | |  \ V / | |___
        |_| \_|\___/_/   \_\_____|___|  \_/  |_____|
"#;

pub fn no_results() {
    print(&NO_RESULTS.red().bold().to_string());
}
