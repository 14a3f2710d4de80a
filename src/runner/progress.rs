//! HandBrakeCLI `--json` progress feed.
//!
//! With `--json`, HandBrakeCLI writes labelled JSON blocks to stdout:
//!
//! ```text
//! Progress: {
//!     "State": "WORKING",
//!     "Working": {
//!         "ETASeconds": 41,
//!         "Pass": 1,
//!         "PassCount": 2,
//!         "Progress": 0.25,
//!         "Rate": 212.7
//!     }
//! }
//! ```
//!
//! [`ProgressParser`] reassembles `Progress` blocks, skips every other
//! label, and turns each block into a [`ProgressUpdate`] with an overall
//! percentage that never goes backwards.

use serde::Deserialize;

/// Phase reported by a progress update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressState {
    /// Encoding a pass
    Working,
    /// Writing the container after the last pass
    Muxing,
    /// Job finished
    Done,
}

/// One observation of encode progress.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    /// Overall completion across all passes, 0 to 100
    pub percent: f64,
    /// Current pass, starting at 1
    pub pass: u32,
    /// Total number of passes
    pub pass_count: u32,
    /// Encode rate in frames per second, when reported
    pub rate: Option<f64>,
    /// Remaining time estimate, when reported
    pub eta_seconds: Option<u64>,
    pub state: ProgressState,
}

/// Receives progress updates from a running job.
pub trait ProgressObserver: Send {
    /// Called for every parsed update, in order.
    fn on_progress(&mut self, update: &ProgressUpdate);

    /// Called once after the process has exited.
    fn on_finish(&mut self) {}
}

impl<F> ProgressObserver for F
where
    F: FnMut(&ProgressUpdate) + Send,
{
    fn on_progress(&mut self, update: &ProgressUpdate) {
        self(update)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProgressBlock {
    state: String,
    working: Option<WorkingBlock>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WorkingBlock {
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    pass: u32,
    #[serde(default)]
    pass_count: u32,
    rate: Option<f64>,
    #[serde(rename = "ETASeconds")]
    eta_seconds: Option<i64>,
}

/// Longest block body kept before the block is given up on.
const MAX_BLOCK_LEN: usize = 1 << 20;

/// A labelled block being reassembled.
struct Block {
    label: String,
    body: String,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Block {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            body: String::new(),
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }

    /// Feeds `text` into the body; returns true once braces balance.
    fn feed(&mut self, text: &str) -> bool {
        for c in text.chars() {
            self.body.push(c);
            if self.in_string {
                match c {
                    _ if self.escaped => self.escaped = false,
                    '\\' => self.escaped = true,
                    '"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => self.in_string = true,
                '{' => self.depth += 1,
                '}' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return true;
                    }
                }
                _ => {}
            }
        }
        self.body.push('\n');
        false
    }
}

/// Line-oriented parser for the `--json` progress feed.
#[derive(Default)]
pub struct ProgressParser {
    block: Option<Block>,
    last: Option<ProgressUpdate>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one line of output.
    ///
    /// Returns an update when the line completes a `Progress` block in a
    /// reportable state. Log text and other blocks yield `None`. A new
    /// `Label: {` line abandons any block that never closed.
    pub fn push_line(&mut self, line: &str) -> Option<ProgressUpdate> {
        if let Some((label, rest)) = block_start(line) {
            if let Some(open) = self.block.take() {
                log::warn!("Dropping unterminated '{}' block", open.label);
            }
            self.block = Some(Block::new(label));
            return self.feed(rest);
        }
        self.feed(line)
    }

    /// Most recent update handed out.
    pub fn last(&self) -> Option<&ProgressUpdate> {
        self.last.as_ref()
    }

    fn feed(&mut self, text: &str) -> Option<ProgressUpdate> {
        let block = self.block.as_mut()?;
        if !block.feed(text) {
            if block.body.len() > MAX_BLOCK_LEN {
                log::warn!("Dropping '{}' block longer than {} bytes", block.label, MAX_BLOCK_LEN);
                self.block = None;
            }
            return None;
        }
        let block = self.block.take()?;
        if block.label != "Progress" {
            return None;
        }

        let parsed: ProgressBlock = match serde_json::from_str(&block.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Skipping unparseable progress block: {}", e);
                return None;
            }
        };
        self.update(parsed)
    }

    fn update(&mut self, block: ProgressBlock) -> Option<ProgressUpdate> {
        let floor = self.last.as_ref().map_or(0.0, |last| last.percent);
        let (pass, pass_count) = self
            .last
            .as_ref()
            .map_or((1, 1), |last| (last.pass, last.pass_count));

        let update = match block.state.as_str() {
            "WORKING" => {
                let Some(working) = block.working else {
                    log::warn!("WORKING progress block without a Working section");
                    return None;
                };
                let pass_count = working.pass_count.max(1);
                let pass = working.pass.clamp(1, pass_count);
                let progress = working.progress.clamp(0.0, 1.0);
                let overall = (f64::from(pass - 1) + progress) / f64::from(pass_count) * 100.0;
                ProgressUpdate {
                    percent: overall.clamp(0.0, 100.0).max(floor),
                    pass,
                    pass_count,
                    rate: working.rate,
                    eta_seconds: working.eta_seconds.and_then(|eta| u64::try_from(eta).ok()),
                    state: ProgressState::Working,
                }
            }
            "MUXING" => ProgressUpdate {
                percent: floor,
                pass,
                pass_count,
                rate: None,
                eta_seconds: None,
                state: ProgressState::Muxing,
            },
            "WORKDONE" => ProgressUpdate {
                percent: 100.0,
                pass,
                pass_count,
                rate: None,
                eta_seconds: Some(0),
                state: ProgressState::Done,
            },
            _ => return None,
        };

        self.last = Some(update.clone());
        Some(update)
    }
}

/// Splits `Label: {...` into the label and the text from the opening brace.
fn block_start(line: &str) -> Option<(&str, &str)> {
    let (label, rest) = line.trim_start().split_once(':')?;
    let rest = rest.trim_start();
    let is_label =
        !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    (is_label && rest.starts_with('{')).then_some((label, rest))
}

/// Terminal progress bar.
#[cfg(feature = "progress")]
pub struct TerminalProgress {
    bar: indicatif::ProgressBar,
}

#[cfg(feature = "progress")]
impl TerminalProgress {
    const SCALE: u64 = 1000;

    pub fn new() -> Self {
        let bar = indicatif::ProgressBar::new(Self::SCALE);
        let style = indicatif::ProgressStyle::with_template(
            "Encoding {bar:40.cyan/blue} {percent:>3}% [{elapsed_precise}] {msg}",
        )
        .map(|style| style.progress_chars("##-"))
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }
}

#[cfg(feature = "progress")]
impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "progress")]
impl ProgressObserver for TerminalProgress {
    fn on_progress(&mut self, update: &ProgressUpdate) {
        self.bar
            .set_position((update.percent / 100.0 * Self::SCALE as f64).round() as u64);

        let mut message = match update.state {
            ProgressState::Working => format!("pass {}/{}", update.pass, update.pass_count),
            ProgressState::Muxing => "muxing".to_string(),
            ProgressState::Done => "done".to_string(),
        };
        if let Some(rate) = update.rate {
            message.push_str(&format!(", {:.1} fps", rate));
        }
        if let Some(eta) = update.eta_seconds.filter(|_| update.state == ProgressState::Working) {
            let (hours, minutes, seconds) = (eta / 3600, eta / 60 % 60, eta % 60);
            message.push_str(&format!(", ETA {:02}:{:02}:{:02}", hours, minutes, seconds));
        }
        self.bar.set_message(message);
    }

    fn on_finish(&mut self) {
        self.bar.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn working(pass: u32, pass_count: u32, progress: f64) -> String {
        format!(
            "Progress: {{\n    \"State\": \"WORKING\",\n    \"Working\": {{\n        \
             \"ETASeconds\": 12,\n        \"Pass\": {pass},\n        \
             \"PassCount\": {pass_count},\n        \"PassID\": -1,\n        \
             \"Progress\": {progress},\n        \"Rate\": 150.5\n    }}\n}}"
        )
    }

    fn feed(parser: &mut ProgressParser, text: &str) -> Vec<ProgressUpdate> {
        text.lines().filter_map(|line| parser.push_line(line)).collect()
    }

    #[test]
    fn parses_a_working_block() {
        let mut parser = ProgressParser::new();
        let updates = feed(&mut parser, &working(1, 1, 0.25));
        assert_eq!(updates.len(), 1);
        let update = &updates[0];
        assert!((update.percent - 25.0).abs() < 1e-9);
        assert_eq!(update.pass, 1);
        assert_eq!(update.pass_count, 1);
        assert_eq!(update.rate, Some(150.5));
        assert_eq!(update.eta_seconds, Some(12));
        assert_eq!(update.state, ProgressState::Working);
        assert_eq!(parser.last(), Some(update));
    }

    #[test]
    fn multi_pass_jobs_report_overall_completion() {
        let mut parser = ProgressParser::new();
        let first = feed(&mut parser, &working(1, 2, 0.5));
        let second = feed(&mut parser, &working(2, 2, 0.5));
        assert!((first[0].percent - 25.0).abs() < 1e-9);
        assert!((second[0].percent - 75.0).abs() < 1e-9);
    }

    #[test]
    fn percentages_never_decrease() {
        let mut parser = ProgressParser::new();
        let mut text = String::new();
        for progress in [0.1, 0.4, 0.3, 0.9, 0.2] {
            text.push_str(&working(1, 1, progress));
            text.push('\n');
        }
        let percents: Vec<f64> = feed(&mut parser, &text).iter().map(|u| u.percent).collect();
        assert_eq!(percents.len(), 5);
        assert!(percents.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!((percents[4] - 90.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut parser = ProgressParser::new();
        let updates = feed(&mut parser, &working(3, 2, 1.7));
        assert_eq!(updates[0].pass, 2);
        assert!((updates[0].percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn workdone_reaches_one_hundred() {
        let mut parser = ProgressParser::new();
        let text = format!(
            "{}\nProgress: {{\n    \"State\": \"MUXING\",\n    \
             \"Muxing\": {{ \"Progress\": 0.0 }}\n}}\n\
             Progress: {{\n    \"State\": \"WORKDONE\",\n    \"WorkDone\": {{ \"Error\": 0 }}\n}}",
            working(1, 1, 0.8)
        );
        let updates = feed(&mut parser, &text);
        let states: Vec<_> = updates.iter().map(|u| u.state).collect();
        assert_eq!(states, [ProgressState::Working, ProgressState::Muxing, ProgressState::Done]);
        assert!((updates[1].percent - 80.0).abs() < 1e-9);
        assert_eq!(updates[2].percent, 100.0);
    }

    #[test]
    fn skips_log_text_and_other_blocks() {
        let mut parser = ProgressParser::new();
        let text = format!(
            "[12:00:01] hb_init: starting libhb thread\n\
             Version: {{\n    \"Name\": \"HandBrake\",\n    \"Arch\": \"x86_64\",\n    \
             \"Note\": \"Progress: {{ not a block }}\"\n}}\n\
             Progress: {{\n    \"State\": \"SCANNING\",\n    \
             \"Scanning\": {{ \"Progress\": 0.5 }}\n}}\n\
             Encoding: task 1 of 1, 5.00 %\n{}",
            working(1, 1, 0.05)
        );
        let updates = feed(&mut parser, &text);
        assert_eq!(updates.len(), 1);
        assert!((updates[0].percent - 5.0).abs() < 1e-9);
    }

    #[test]
    fn single_line_blocks_are_parsed() {
        let mut parser = ProgressParser::new();
        let line = concat!(
            r#"Progress: {"State": "WORKING", "#,
            r#""Working": {"Progress": 0.5, "Pass": 1, "PassCount": 1}}"#
        );
        let update = parser.push_line(line).unwrap();
        assert!((update.percent - 50.0).abs() < 1e-9);
        assert_eq!(update.rate, None);
    }

    #[test]
    fn malformed_blocks_are_skipped() {
        let mut parser = ProgressParser::new();
        assert!(parser.push_line("Progress: { \"State\": WORKING }").is_none());
        assert!(feed(&mut parser, &working(1, 1, 0.5)).len() == 1);
    }

    #[test]
    fn unterminated_blocks_give_way_to_the_next_block() {
        let mut parser = ProgressParser::new();
        assert!(parser.push_line("Scan: {").is_none());
        assert!(parser.push_line("    \"x\": 1").is_none());
        let update = parser
            .push_line(r#"Progress: {"State": "WORKING", "Working": {"Progress": 0.4}}"#)
            .unwrap();
        assert!((update.percent - 40.0).abs() < 1e-9);
    }

    #[test]
    fn oversized_blocks_are_dropped() {
        let mut parser = ProgressParser::new();
        assert!(parser.push_line("Progress: {").is_none());
        let filler = format!("    \"Padding\": \"{}\",", "x".repeat(4096));
        for _ in 0..(MAX_BLOCK_LEN / filler.len() + 1) {
            assert!(parser.push_line(&filler).is_none());
        }
        // the abandoned block's closing lines are plain text now
        assert!(parser.push_line("    \"State\": \"WORKDONE\"").is_none());
        assert!(parser.push_line("}").is_none());
        assert!(parser.last().is_none());
        assert_eq!(feed(&mut parser, &working(1, 1, 0.5)).len(), 1);
    }

    #[test]
    fn closures_observe_updates() {
        let mut seen = Vec::new();
        {
            let mut observer = |update: &ProgressUpdate| seen.push(update.percent);
            let mut parser = ProgressParser::new();
            for update in feed(&mut parser, &working(1, 1, 0.5)) {
                observer.on_progress(&update);
            }
            observer.on_finish();
        }
        assert_eq!(seen, [50.0]);
    }
}
